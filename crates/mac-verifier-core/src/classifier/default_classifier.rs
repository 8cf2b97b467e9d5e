use std::path::Path;

use tracing::{debug, info, instrument};

use super::{
    annotate, checked_output_path, csv_table::CsvTable, ClassificationResult, Classifier,
    ClassifyError, KnownIdentifiers, RecordSink, RecordSource, VerifierSettings, CHECKED_SUFFIX,
    NETWORK_MARKER,
};

/// Classifier reading and writing through a pluggable table backend (CSV by default).
pub struct DefaultClassifier<T = CsvTable> {
    table: T,
    settings: VerifierSettings,
}

impl DefaultClassifier<CsvTable> {
    pub fn new() -> Self {
        Self::with_settings(CsvTable::new(), VerifierSettings::default())
    }
}

impl Default for DefaultClassifier<CsvTable> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DefaultClassifier<T>
where
    T: RecordSource + RecordSink,
{
    pub fn with_settings(table: T, settings: VerifierSettings) -> Self {
        Self { table, settings }
    }

    pub fn settings(&self) -> &VerifierSettings {
        &self.settings
    }

    /// Classify one source against an already parsed allow-list.
    #[instrument(name = "classify_source", skip(self, source, known), fields(source = %source.display()))]
    pub fn classify_with(
        &self,
        source: &Path,
        known: &KnownIdentifiers,
    ) -> Result<ClassificationResult, ClassifyError> {
        let records =
            self.table
                .load_records(source)
                .map_err(|err| ClassifyError::SourceLoad {
                    path: source.to_path_buf(),
                    source: err,
                })?;
        let total = records.len();
        let annotated = annotate(records, known, NETWORK_MARKER);
        debug!(total, retained = annotated.len(), "filtered scan rows");

        let output = checked_output_path(source, CHECKED_SUFFIX);
        self.table
            .store_records(&output, &annotated)
            .map_err(|err| ClassifyError::Write {
                path: output.clone(),
                source: err,
            })?;

        let result = ClassificationResult::from_records(source.to_path_buf(), output, &annotated);
        info!(
            output = %result.output.display(),
            records = result.records,
            mismatches = result.mismatches,
            "wrote checked scan"
        );
        Ok(result)
    }
}

impl<T> Classifier for DefaultClassifier<T>
where
    T: RecordSource + RecordSink,
{
    fn classify(
        &self,
        source: &Path,
        known_text: &str,
    ) -> Result<ClassificationResult, ClassifyError> {
        let known = KnownIdentifiers::parse(known_text);
        self.classify_with(source, &known)
    }
}
