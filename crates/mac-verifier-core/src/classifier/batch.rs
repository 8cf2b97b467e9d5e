use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info_span, warn};

use super::{
    default_classifier::DefaultClassifier, ClassificationResult, ClassifyError, KnownIdentifiers,
    RecordSink, RecordSource,
};
use crate::opener::ResultOpener;

/// What happened when a checked file with bad MACs was handed to the opener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum OpenStatus {
    /// No bad MAC, nothing to show.
    NotNeeded,
    /// Opening is disabled in the settings.
    Skipped,
    Opened,
    Failed(String),
}

/// Per-source entry of a batch run.
#[derive(Debug)]
pub enum SourceOutcome {
    Classified {
        result: ClassificationResult,
        open: OpenStatus,
    },
    Failed {
        source: PathBuf,
        error: ClassifyError,
    },
}

impl SourceOutcome {
    pub fn source(&self) -> &Path {
        match self {
            Self::Classified { result, .. } => &result.source,
            Self::Failed { source, .. } => source,
        }
    }
}

/// Outcomes for every requested source, in request order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<SourceOutcome>,
}

impl BatchReport {
    pub fn results(&self) -> impl Iterator<Item = (&ClassificationResult, &OpenStatus)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            SourceOutcome::Classified { result, open } => Some((result, open)),
            SourceOutcome::Failed { .. } => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &ClassifyError)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            SourceOutcome::Failed { source, error } => Some((source.as_path(), error)),
            SourceOutcome::Classified { .. } => None,
        })
    }

    pub fn any_mismatch(&self) -> bool {
        self.results().any(|(result, _)| result.any_mismatch)
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

impl<T> DefaultClassifier<T>
where
    T: RecordSource + RecordSink,
{
    /// Classify each source in turn; one failing source never stops the rest.
    pub fn classify_batch<P: AsRef<Path>>(
        &self,
        sources: &[P],
        known_text: &str,
        opener: &dyn ResultOpener,
    ) -> BatchReport {
        let known = KnownIdentifiers::parse(known_text);
        let mut report = BatchReport::default();
        for source in sources {
            let source = source.as_ref();
            let _span = info_span!("batch_source", source = %source.display()).entered();
            let outcome = match self.classify_with(source, &known) {
                Ok(result) => {
                    let open = self.open_if_needed(&result, opener);
                    SourceOutcome::Classified { result, open }
                }
                Err(error) => {
                    warn!(error = %error, "skipping source");
                    SourceOutcome::Failed {
                        source: source.to_path_buf(),
                        error,
                    }
                }
            };
            report.outcomes.push(outcome);
        }
        report
    }

    fn open_if_needed(&self, result: &ClassificationResult, opener: &dyn ResultOpener) -> OpenStatus {
        if !result.any_mismatch {
            return OpenStatus::NotNeeded;
        }
        if !self.settings().open_on_mismatch {
            return OpenStatus::Skipped;
        }
        match opener.open(&result.output) {
            Ok(()) => OpenStatus::Opened,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "could not open checked file");
                OpenStatus::Failed(format!("{err:#}"))
            }
        }
    }
}
