use std::collections::BTreeMap;

use rowsmith_plan::{RunOptions, ValidationIssue};
use serde::{Deserialize, Serialize};

/// Options for the generation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Worker threads in the pool.
    pub workers: usize,
    /// Rows per work unit.
    pub chunk_rows: u64,
    /// Largest rank space that is shuffled as an explicit list.
    pub materialize_limit: u64,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|count| count.get())
                .unwrap_or(4),
            chunk_rows: 10_000,
            materialize_limit: 1_000_000,
        }
    }
}

impl GenerateOptions {
    /// Overlay config-level options on top of these.
    pub fn merged(&self, run: Option<&RunOptions>) -> Self {
        let mut merged = self.clone();
        if let Some(run) = run {
            if let Some(workers) = run.workers {
                merged.workers = workers;
            }
            if let Some(chunk_rows) = run.chunk_rows {
                merged.chunk_rows = chunk_rows;
            }
            if let Some(limit) = run.materialize_limit {
                merged.materialize_limit = limit;
            }
        }
        merged.workers = merged.workers.max(1);
        merged.chunk_rows = merged.chunk_rows.max(1);
        merged
    }
}

/// Final state of a table in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Completed,
    Failed,
    /// Not attempted because a parent table failed.
    Skipped,
}

/// Summary of a generated table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableReport {
    pub schema: String,
    pub table: String,
    pub rows_requested: u64,
    pub rows_generated: u64,
    pub status: TableStatus,
    /// How each uniqueness constraint was handled, e.g. `combination:uq_a_c`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strategy: Vec<String>,
    pub duration_ms: u64,
}

/// Structured generation issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationIssue {
    pub level: String,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<u64>,
}

impl GenerationIssue {
    pub fn warning(code: &str, schema: &str, table: &str, message: String) -> Self {
        Self {
            level: "warning".to_string(),
            code: code.to_string(),
            message,
            schema: Some(schema.to_string()),
            table: Some(table.to_string()),
            column: None,
            constraint: None,
            requested: None,
            available: None,
        }
    }

    pub fn error(code: &str, schema: &str, table: &str, message: String) -> Self {
        Self {
            level: "error".to_string(),
            ..Self::warning(code, schema, table, message)
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }

    pub fn with_counts(mut self, requested: u64, available: u64) -> Self {
        self.requested = Some(requested);
        self.available = Some(available);
        self
    }
}

impl From<&ValidationIssue> for GenerationIssue {
    fn from(issue: &ValidationIssue) -> Self {
        Self {
            level: "warning".to_string(),
            code: issue.code.clone(),
            message: format!("{} ({})", issue.message, issue.path),
            schema: None,
            table: None,
            column: None,
            constraint: None,
            requested: None,
            available: None,
        }
    }
}

/// Report for a generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub run_id: String,
    pub seed: u64,
    pub started_at: String,
    pub duration_ms: u64,
    pub tables: Vec<TableReport>,
    pub warnings_by_code: BTreeMap<String, u64>,
    pub warnings: Vec<GenerationIssue>,
    pub errors: Vec<GenerationIssue>,
}

impl GenerationReport {
    pub fn new(run_id: String, seed: u64) -> Self {
        Self {
            run_id,
            seed,
            started_at: chrono::Utc::now().to_rfc3339(),
            duration_ms: 0,
            tables: Vec::new(),
            warnings_by_code: BTreeMap::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn record_warning(&mut self, issue: GenerationIssue) {
        *self.warnings_by_code.entry(issue.code.clone()).or_insert(0) += 1;
        self.warnings.push(issue);
    }

    pub fn record_error(&mut self, issue: GenerationIssue) {
        self.errors.push(issue);
    }

    pub fn warnings_with_code<'a>(
        &'a self,
        code: &'a str,
    ) -> impl Iterator<Item = &'a GenerationIssue> + 'a {
        self.warnings.iter().filter(move |issue| issue.code == code)
    }

    pub fn table(&self, schema: &str, table: &str) -> Option<&TableReport> {
        self.tables
            .iter()
            .find(|entry| entry.schema == schema && entry.table == table)
    }

    pub fn failed_tables(&self) -> Vec<&TableReport> {
        self.tables
            .iter()
            .filter(|entry| entry.status != TableStatus::Completed)
            .collect()
    }
}
