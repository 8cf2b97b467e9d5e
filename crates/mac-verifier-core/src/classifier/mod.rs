use std::{
    collections::HashSet,
    ffi::OsString,
    fmt, io,
    path::{Path, PathBuf},
};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub mod batch;
pub mod csv_table;
pub mod default_classifier;

/// Column holding the network name in scan exports and checked output.
pub const SSID_COLUMN: &str = "SSID";
/// Column holding the access point hardware address.
pub const BSSID_COLUMN: &str = "BSSID";
/// Positional display column echoing the known-identifier list.
pub const KNOWN_COLUMN: &str = "Known MACs";
/// Column carrying the per-row verdict.
pub const CHECKED_COLUMN: &str = "Checked";

static MAC_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{2}([:-][0-9a-f]{2}){5}$").expect("MAC shape regex is valid")
});

/// Case-insensitive substring a network name must contain to be retained.
pub const NETWORK_MARKER: &str = "expedient";
/// Inserted between the input file stem and its extension.
pub const CHECKED_SUFFIX: &str = "_CHECKED";

/// User-tunable knobs for the verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifierSettings {
    /// Ask the opener to show outputs that contain at least one bad MAC.
    pub open_on_mismatch: bool,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            open_on_mismatch: true,
        }
    }
}

/// Verdict attached to every retained scan row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "Good MAC")]
    Match,
    #[serde(rename = "Bad MAC")]
    Mismatch,
}

impl Label {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Match => "Good MAC",
            Self::Mismatch => "Bad MAC",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two cells of a scan export row the verifier cares about.
///
/// Empty cells are treated as missing values.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanRecord {
    pub network_name: Option<String>,
    pub device_id: Option<String>,
}

impl ScanRecord {
    pub fn new(network_name: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            network_name: Some(network_name.into()).filter(|v| !v.is_empty()),
            device_id: Some(device_id.into()).filter(|v| !v.is_empty()),
        }
    }

    /// `marker` must already be lowercased.
    fn carries_marker(&self, marker: &str) -> bool {
        self.network_name
            .as_deref()
            .is_some_and(|name| name.to_lowercase().contains(marker))
    }
}

/// Ordered allow-list of device identifiers pasted by the user.
///
/// Entries keep their order, duplicates and blanks; membership ignores order.
#[derive(Debug, Clone, Default)]
pub struct KnownIdentifiers {
    entries: Vec<String>,
    members: HashSet<String>,
}

impl KnownIdentifiers {
    /// Lowercase the text and split it on `\n`.
    pub fn parse(text: &str) -> Self {
        let entries: Vec<String> = text.to_lowercase().split('\n').map(str::to_owned).collect();
        let members = entries.iter().cloned().collect();
        let known = Self { entries, members };
        known.report_suspicious_entries();
        known
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `device_id` must already be lowercased.
    pub fn contains(&self, device_id: &str) -> bool {
        self.members.contains(device_id)
    }

    /// Entries that are neither blank nor shaped like a 48-bit MAC.
    pub fn malformed(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .map(String::as_str)
            .filter(|entry| !entry.is_empty() && !MAC_SHAPE.is_match(entry))
    }

    pub fn blank_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_empty()).count()
    }

    fn report_suspicious_entries(&self) {
        let blanks = self.blank_count();
        if blanks > 0 {
            warn!(blanks, "known MAC list contains blank lines");
        }
        for entry in self.malformed() {
            warn!(entry, "known MAC does not look like a hardware address");
        }
    }
}

/// A retained scan row with its verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedRecord {
    pub network_name: String,
    /// Lowercased BSSID, `None` when the cell was empty.
    pub device_id: Option<String>,
    /// Known-identifier entry at the same position; display only.
    pub known_identifier: Option<String>,
    pub label: Label,
}

/// Filter records by `marker` and label each survivor by set membership.
///
/// The `known_identifier` cell pairs the n-th retained row with the n-th list
/// entry. It is a display aid and plays no part in the verdict.
pub fn annotate<I>(records: I, known: &KnownIdentifiers, marker: &str) -> Vec<AnnotatedRecord>
where
    I: IntoIterator<Item = ScanRecord>,
{
    let marker = marker.to_lowercase();
    records
        .into_iter()
        .filter(|record| record.carries_marker(&marker))
        .enumerate()
        .map(|(position, record)| {
            let device_id = record.device_id.map(|id| id.to_lowercase());
            let label = match device_id.as_deref() {
                Some(id) if known.contains(id) => Label::Match,
                _ => Label::Mismatch,
            };
            AnnotatedRecord {
                network_name: record.network_name.unwrap_or_default(),
                device_id,
                known_identifier: known.entries().get(position).cloned(),
                label,
            }
        })
        .collect()
}

/// `<dir>/<stem><suffix><.ext>` for the given input path.
///
/// Built from OS strings so non-UTF-8 names survive unchanged.
pub fn checked_output_path(input: &Path, suffix: &str) -> PathBuf {
    let mut file_name = OsString::new();
    if let Some(stem) = input.file_stem() {
        file_name.push(stem);
    }
    file_name.push(suffix);
    if let Some(ext) = input.extension() {
        file_name.push(".");
        file_name.push(ext);
    }
    input.with_file_name(file_name)
}

/// Outcome of classifying one scan export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub source: PathBuf,
    pub output: PathBuf,
    pub records: usize,
    pub mismatches: usize,
    pub any_mismatch: bool,
}

impl ClassificationResult {
    pub fn from_records(source: PathBuf, output: PathBuf, records: &[AnnotatedRecord]) -> Self {
        let mismatches = records
            .iter()
            .filter(|record| record.label == Label::Mismatch)
            .count();
        Self {
            source,
            output,
            records: records.len(),
            mismatches,
            any_mismatch: mismatches > 0,
        }
    }
}

/// Reasons a scan export could not be read into records.
#[derive(Debug, Error)]
pub enum SourceLoadError {
    #[error("cannot open file: {0}")]
    Open(#[source] io::Error),
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("file has no header row")]
    MissingHeader,
    #[error("required column `{column}` not found")]
    MissingColumn { column: &'static str },
    #[error("line {line} has {found} fields, header has {expected}")]
    RaggedRow {
        line: u64,
        expected: usize,
        found: usize,
    },
}

/// Per-source failure; never aborts the rest of a batch.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("failed to load {}: {source}", path.display())]
    SourceLoad {
        path: PathBuf,
        #[source]
        source: SourceLoadError,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ClassifyError {
    pub fn path(&self) -> &Path {
        match self {
            Self::SourceLoad { path, .. } | Self::Write { path, .. } => path,
        }
    }
}

/// Reads scan exports into records.
pub trait RecordSource {
    fn load_records(&self, path: &Path) -> Result<Vec<ScanRecord>, SourceLoadError>;
}

/// Persists annotated records.
pub trait RecordSink {
    /// Must not create `path` unless the whole table can be written.
    fn store_records(&self, path: &Path, records: &[AnnotatedRecord]) -> io::Result<()>;
}

/// Turns one scan export plus the known-identifier text into a checked file.
pub trait Classifier {
    fn classify(
        &self,
        source: &Path,
        known_text: &str,
    ) -> Result<ClassificationResult, ClassifyError>;
}
