use std::{fmt::Write, path::Path};

use serde::Serialize;

use crate::classifier::{
    batch::{BatchReport, OpenStatus, SourceOutcome},
    ClassificationResult, ClassifyError,
};

/// Format styles supported by the summary renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Produce the end-of-run summary for a batch using the desired format.
pub fn render_summary(report: &BatchReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_human(report),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&JsonSummary::from(report))?),
    }
}

fn render_human(report: &BatchReport) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "Execution completed.")?;
    writeln!(out)?;

    for outcome in &report.outcomes {
        match outcome {
            SourceOutcome::Classified { result, open } => {
                writeln!(out, "File: {}", result.output.display())?;
                writeln!(out, "Status: {}", status_line(result, open))?;
            }
            SourceOutcome::Failed { source, error } => {
                writeln!(
                    out,
                    "Error: An error occurred while processing {}: {}",
                    source.display(),
                    failure_detail(error)
                )?;
            }
        }
        writeln!(out)?;
    }

    Ok(out)
}

/// The failing source is already named by the caller; only a write failure
/// mentions a second path, the output it could not create.
fn failure_detail(error: &ClassifyError) -> String {
    match error {
        ClassifyError::SourceLoad { source, .. } => source.to_string(),
        ClassifyError::Write { .. } => error.to_string(),
    }
}

fn status_line(result: &ClassificationResult, open: &OpenStatus) -> String {
    if !result.any_mismatch {
        return "No Bad MAC(s) found.".into();
    }
    match open {
        OpenStatus::Opened => "Bad MAC(s) found. File opened.".into(),
        OpenStatus::Failed(reason) => format!("Bad MAC(s) found. Failed to open file: {reason}"),
        OpenStatus::Skipped | OpenStatus::NotNeeded => "Bad MAC(s) found. File not opened.".into(),
    }
}

#[derive(Debug, Serialize)]
struct JsonSummary<'a> {
    classified: usize,
    failed: usize,
    any_mismatch: bool,
    sources: Vec<JsonOutcome<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum JsonOutcome<'a> {
    Classified {
        #[serde(flatten)]
        result: &'a ClassificationResult,
        open: &'a OpenStatus,
    },
    Failed {
        source: &'a Path,
        error: String,
    },
}

impl<'a> From<&'a BatchReport> for JsonSummary<'a> {
    fn from(report: &'a BatchReport) -> Self {
        let sources: Vec<_> = report
            .outcomes
            .iter()
            .map(|outcome| match outcome {
                SourceOutcome::Classified { result, open } => JsonOutcome::Classified { result, open },
                SourceOutcome::Failed { source, error } => JsonOutcome::Failed {
                    source,
                    error: failure_detail(error),
                },
            })
            .collect();
        let failed = report.failures().count();
        Self {
            classified: sources.len() - failed,
            failed,
            any_mismatch: report.any_mismatch(),
            sources,
        }
    }
}
