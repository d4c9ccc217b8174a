use std::collections::{BTreeMap, BTreeSet};

use rowsmith_core::{DatabaseSchema, dependency_levels};
use rowsmith_plan::GenerationConfig;

use crate::errors::GenerationError;

/// Planned generation task for a configured table.
#[derive(Debug, Clone)]
pub struct GenerationTask {
    pub schema: String,
    pub table: String,
    pub rows: u64,
    /// Configured tables this one reads parent values from.
    pub parents: BTreeSet<String>,
}

impl GenerationTask {
    pub fn key(&self) -> String {
        table_key(&self.schema, &self.table)
    }
}

/// Group configured tables into dependency levels. Every table lands after
/// all of its configured parents; tables within a level are independent.
///
/// Physical and logical FKs both count. Parents that are not configured are
/// left to table planning, which fails the table unless static values cover
/// the reference.
pub fn plan_levels(
    schema: &DatabaseSchema,
    config: &GenerationConfig,
) -> Result<Vec<Vec<GenerationTask>>, GenerationError> {
    let parents = build_parent_map(schema, config)?;

    let mut children: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (child, parent_keys) in &parents {
        children.entry(child.clone()).or_default();
        for parent in parent_keys {
            children
                .entry(parent.clone())
                .or_default()
                .insert(child.clone());
        }
    }

    let levels = dependency_levels(&children).map_err(|cycle| {
        GenerationError::Unsupported(format!("cyclic FK graph between {}", cycle.join(", ")))
    })?;

    let mut planned = Vec::with_capacity(levels.len());
    for level in levels {
        let mut tasks = Vec::with_capacity(level.len());
        for key in level {
            let Some(table) = config
                .tables
                .iter()
                .find(|table| table.table_key() == key)
            else {
                continue;
            };
            tasks.push(GenerationTask {
                schema: table.schema.clone(),
                table: table.table.clone(),
                rows: table.rows,
                parents: parents.get(&key).cloned().unwrap_or_default(),
            });
        }
        if !tasks.is_empty() {
            planned.push(tasks);
        }
    }

    Ok(planned)
}

/// Configured child -> configured parents.
fn build_parent_map(
    schema: &DatabaseSchema,
    config: &GenerationConfig,
) -> Result<BTreeMap<String, BTreeSet<String>>, GenerationError> {
    let configured: BTreeSet<String> = config.tables.iter().map(|table| table.table_key()).collect();
    let mut parents: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for table_config in &config.tables {
        let child_key = table_config.table_key();
        let entry = parents.entry(child_key.clone()).or_default();

        let mut references: Vec<String> = schema
            .table(&table_config.schema, &table_config.table)
            .map(|table| {
                table
                    .foreign_keys()
                    .map(|fk| table_key(&fk.referenced_schema, &fk.referenced_table))
                    .collect()
            })
            .unwrap_or_default();
        for fk in table_config.logical_foreign_keys()? {
            references.push(table_key(&fk.referenced_schema, &fk.referenced_table));
        }

        for parent_key in references {
            if parent_key != child_key && configured.contains(&parent_key) {
                entry.insert(parent_key);
            }
        }
    }

    Ok(parents)
}

fn table_key(schema: &str, table: &str) -> String {
    format!("{schema}.{table}")
}
