use thiserror::Error;

/// Core error type shared across Rowsmith crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The schema violates internal invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// A constraint references something the owning table does not have.
    #[error("schema mismatch in table '{table}': {detail}")]
    SchemaMismatch { table: String, detail: String },
    /// A requested feature is not yet supported.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// Catch-all error for unexpected failures.
    #[error("other error: {0}")]
    Other(String),
}

/// Convenience alias for results returned by Rowsmith crates.
pub type Result<T> = std::result::Result<T, Error>;
