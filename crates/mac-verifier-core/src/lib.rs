pub mod classifier;
pub mod opener;
pub mod report;

pub use classifier::{
    annotate,
    batch::{BatchReport, OpenStatus, SourceOutcome},
    checked_output_path,
    csv_table::CsvTable,
    default_classifier::DefaultClassifier,
    AnnotatedRecord, ClassificationResult, Classifier, ClassifyError, KnownIdentifiers, Label,
    RecordSink, RecordSource, ScanRecord, SourceLoadError, VerifierSettings, CHECKED_SUFFIX,
    NETWORK_MARKER,
};
pub use opener::{NoopOpener, ResultOpener, SystemOpener};
pub use report::{render_summary, OutputFormat};
