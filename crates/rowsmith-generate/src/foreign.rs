//! Parent value lookup and per-row foreign key assignment.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::Rng;
use rowsmith_core::{Table, TypeClass};
use rowsmith_plan::Condition;

use crate::combination::Dimension;
use crate::errors::GenerationError;
use crate::seed::hash_row_seed;
use crate::value::{GeneratedValue, Row, value_key};

/// Lookup of rows produced by already generated tables.
pub trait ForeignContext {
    /// Distinct non-null values of a parent column, in first-seen order.
    fn distinct_values(&self, table_key: &str, column: &str) -> Option<Arc<[GeneratedValue]>>;

    /// Distinct parent tuples with no NULL member, in first-seen order.
    fn distinct_tuples(
        &self,
        table_key: &str,
        columns: &[String],
    ) -> Option<Arc<[Vec<GeneratedValue>]>>;

    fn has_table(&self, table_key: &str) -> bool;
}

#[derive(Debug)]
struct ParentTable {
    rows: Arc<[Row]>,
    /// Database-assigned integer columns, assumed to number rows from 1 in
    /// insert order.
    implied: HashSet<String>,
}

impl ParentTable {
    fn cell(&self, row_index: usize, column: &str) -> Option<GeneratedValue> {
        if self.implied.contains(column) {
            return Some(GeneratedValue::Int(row_index as i64 + 1));
        }
        self.rows[row_index]
            .get(column)
            .filter(|value| !value.is_null())
            .cloned()
    }
}

/// In-memory [`ForeignContext`] filled as tables complete.
#[derive(Debug, Default)]
pub struct ParentStore {
    tables: HashMap<String, ParentTable>,
}

impl ParentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest_table(&mut self, table_key: &str, table: &Table, rows: Arc<[Row]>) {
        let implied = table
            .columns
            .iter()
            .filter(|column| column.is_auto_generated && column.type_class == TypeClass::Integer)
            .map(|column| column.name.clone())
            .collect();
        self.tables
            .insert(table_key.to_string(), ParentTable { rows, implied });
    }
}

impl ForeignContext for ParentStore {
    fn distinct_values(&self, table_key: &str, column: &str) -> Option<Arc<[GeneratedValue]>> {
        let table = self.tables.get(table_key)?;
        let mut seen = HashSet::new();
        let values: Vec<GeneratedValue> = (0..table.rows.len())
            .filter_map(|idx| table.cell(idx, column))
            .filter(|value| seen.insert(value_key(value)))
            .collect();
        Some(values.into())
    }

    fn distinct_tuples(
        &self,
        table_key: &str,
        columns: &[String],
    ) -> Option<Arc<[Vec<GeneratedValue>]>> {
        let table = self.tables.get(table_key)?;
        let mut seen = HashSet::new();
        let mut tuples = Vec::new();
        for idx in 0..table.rows.len() {
            let tuple: Option<Vec<GeneratedValue>> =
                columns.iter().map(|column| table.cell(idx, column)).collect();
            if let Some(tuple) = tuple {
                let key: Vec<String> = tuple.iter().map(value_key).collect();
                if seen.insert(key) {
                    tuples.push(tuple);
                }
            }
        }
        Some(tuples.into())
    }

    fn has_table(&self, table_key: &str) -> bool {
        self.tables.contains_key(table_key)
    }
}

/// A parent source usable by one conditional rule.
#[derive(Debug, Clone)]
pub struct ConditionalCandidate {
    /// `None` always matches.
    pub condition: Option<Condition>,
    pub parent: Dimension,
}

/// How one set of FK columns is filled per row.
#[derive(Debug, Clone)]
pub enum FkRule {
    /// Random parent draw, optionally clustered by a reuse ratio.
    Draw {
        parent: Dimension,
        ratio: Option<f64>,
        salt: u64,
    },
    /// First matching candidate in declaration order wins.
    Conditional {
        columns: Vec<String>,
        candidates: Vec<ConditionalCandidate>,
        ratio: Option<f64>,
        salt: u64,
    },
    /// Nullable self-reference left empty.
    Null { columns: Vec<String> },
}

/// Per-table FK assignment, read-only during generation.
#[derive(Debug, Clone, Default)]
pub struct FkResolver {
    table: String,
    rules: Vec<FkRule>,
}

impl FkResolver {
    pub fn new(table: impl Into<String>, rules: Vec<FkRule>) -> Self {
        Self {
            table: table.into(),
            rules,
        }
    }

    /// Fill every FK column of `row` that is not already set. Columns set by
    /// a combination pool are left alone.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        row: &mut Row,
        row_index: u64,
        rng: &mut R,
    ) -> Result<(), GenerationError> {
        let mut assigned = Vec::new();
        for rule in &self.rules {
            assigned.clear();
            match rule {
                FkRule::Draw {
                    parent,
                    ratio,
                    salt,
                } => {
                    if is_preassigned(row, parent.columns()) {
                        continue;
                    }
                    let index = pick_index(parent.len(), row_index, *ratio, *salt, rng);
                    parent.write(index, &mut assigned);
                }
                FkRule::Conditional {
                    columns,
                    candidates,
                    ratio,
                    salt,
                } => {
                    if is_preassigned(row, columns) {
                        continue;
                    }
                    let candidate = candidates
                        .iter()
                        .find(|candidate| match &candidate.condition {
                            None => true,
                            Some(condition) => {
                                let current = row
                                    .get(condition.discriminator())
                                    .and_then(GeneratedValue::render);
                                condition.matches(current.as_deref())
                            }
                        })
                        .ok_or_else(|| GenerationError::UnmatchedConditionalFk {
                            table: self.table.clone(),
                            column: columns.join(","),
                            row_index,
                        })?;
                    let index = pick_index(candidate.parent.len(), row_index, *ratio, *salt, rng);
                    candidate.parent.write(index, &mut assigned);
                }
                FkRule::Null { columns } => {
                    for column in columns {
                        row.entry(column.clone()).or_insert(GeneratedValue::Null);
                    }
                }
            }
            for (column, value) in assigned.drain(..) {
                row.insert(column, value);
            }
        }
        Ok(())
    }
}

fn is_preassigned(row: &Row, columns: &[String]) -> bool {
    columns.iter().all(|column| row.contains_key(column))
}

/// Parent index for a row. With a reuse ratio `r > 1`, consecutive blocks of
/// `r` rows share one draw, so each chosen parent serves about `r` children.
fn pick_index<R: Rng + ?Sized>(
    len: u64,
    row_index: u64,
    ratio: Option<f64>,
    salt: u64,
    rng: &mut R,
) -> u64 {
    if len <= 1 {
        return 0;
    }
    match ratio {
        Some(ratio) if ratio > 1.0 => {
            let block = (row_index as f64 / ratio).floor() as u64;
            hash_row_seed(salt, block) % len
        }
        _ => rng.random_range(0..len),
    }
}
