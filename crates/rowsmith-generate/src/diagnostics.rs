use std::collections::HashSet;
use std::sync::Mutex;

use tracing::warn;

use crate::model::GenerationIssue;

/// Thread-safe warning collector. A cause is kept once, however many rows or
/// workers hit it.
#[derive(Debug, Default)]
pub struct Diagnostics {
    seen: Mutex<HashSet<(String, String, String)>>,
    issues: Mutex<Vec<GenerationIssue>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and log `issue` unless the same cause was already recorded.
    /// Returns whether it was new.
    pub fn record(&self, issue: GenerationIssue) -> bool {
        let key = (
            issue.code.clone(),
            format!(
                "{}.{}",
                issue.schema.as_deref().unwrap_or_default(),
                issue.table.as_deref().unwrap_or_default()
            ),
            issue
                .column
                .clone()
                .or_else(|| issue.constraint.clone())
                .unwrap_or_default(),
        );
        let fresh = self
            .seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key);
        if fresh {
            log_issue(&issue);
            self.issues
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(issue);
        }
        fresh
    }

    /// Take everything recorded so far.
    pub fn drain(&self) -> Vec<GenerationIssue> {
        std::mem::take(
            &mut *self
                .issues
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

pub(crate) fn log_issue(issue: &GenerationIssue) {
    warn!(
        code = %issue.code,
        schema = issue.schema.as_deref().unwrap_or(""),
        table = issue.table.as_deref().unwrap_or(""),
        column = issue.column.as_deref().unwrap_or(""),
        constraint = issue.constraint.as_deref().unwrap_or(""),
        requested = issue.requested.unwrap_or_default(),
        available = issue.available.unwrap_or_default(),
        message = %issue.message
    );
}
