use rowsmith_plan::ConfigError;
use thiserror::Error;

use crate::model::GenerationReport;

/// Template parsing and range errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("template '{0}' has no placeholders")]
    NoPlaceholders(String),
    #[error("template '{template}': slot {slot} range [{min}, {max}] is inverted")]
    InvertedSlotRange {
        template: String,
        slot: usize,
        min: i64,
        max: i64,
    },
    #[error("template '{0}' has an unbalanced brace")]
    UnbalancedBrace(String),
    #[error("template '{template}': unsupported placeholder spec '{spec}'")]
    InvalidSpec { template: String, spec: String },
    #[error("range {0} is empty")]
    EmptyRange(String),
}

/// Errors emitted by the generation engine.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
    #[error("column '{column}': {source}")]
    Format {
        column: String,
        #[source]
        source: FormatError,
    },
    #[error(transparent)]
    SchemaMismatch(#[from] rowsmith_core::Error),
    #[error("table '{table}' column '{column}': no parent values ({detail})")]
    MissingParentValues {
        table: String,
        column: String,
        detail: String,
    },
    #[error("table '{table}' depends on '{parent}', which is not generated")]
    MissingParentTable { table: String, parent: String },
    #[error("table '{table}' row {row_index}: no condition matched for fk column '{column}'")]
    UnmatchedConditionalFk {
        table: String,
        column: String,
        row_index: u64,
    },
    #[error("unsupported feature: {0}")]
    Unsupported(String),
    #[error("worker pool error: {0}")]
    WorkerPool(String),
    #[error("logging error: {0}")]
    Logging(String),
    #[error("sink error: {0}")]
    Sink(String),
    #[error("generation failed for {} table(s)", .0.failed_tables().len())]
    Failed(GenerationReport),
}
