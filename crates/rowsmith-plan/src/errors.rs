use serde::Serialize;
use thiserror::Error;

use crate::model::RangeBound;

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// Structured validation issue with location and hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub code: String,
    pub path: String,
    pub message: String,
    pub hint: Option<String>,
}

impl ValidationIssue {
    /// Create a new validation issue.
    pub fn new(
        severity: IssueSeverity,
        code: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            path: path.into(),
            message: message.into(),
            hint,
        }
    }
}

/// Aggregated validation report with errors and warnings.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Returns true when there are no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error issue.
    pub fn push_error(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
    }

    /// Add a warning issue.
    pub fn push_warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    /// Merge another report into this one.
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Configuration errors. All of them are fatal before generation starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("column '{column}': range min {min} is greater than max {max}")]
    InvertedRange {
        column: String,
        min: RangeBound,
        max: RangeBound,
    },
    #[error("column '{column}': invalid range bound: {detail}")]
    InvalidBound { column: String, detail: String },
    #[error("column '{column}': missing required field '{field}'")]
    MissingField { column: String, field: String },
    #[error("column '{column}': values list is empty")]
    EmptyValues { column: String },
    #[error("column '{column}': fk ratio {ratio} must be at least 1.0")]
    InvalidRatio { column: String, ratio: f64 },
    #[error("invalid condition '{condition}': {detail}")]
    InvalidCondition { condition: String, detail: String },
    #[error("invalid logical foreign key to '{table}': {detail}")]
    InvalidForeignKey { table: String, detail: String },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("config validation failed with {} error(s)", .0.errors.len())]
    Invalid(ValidationReport),
}

/// Result type for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
