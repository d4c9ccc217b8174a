use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use rowsmith_core::DatabaseSchema;
use rowsmith_plan::{GenerationConfig, ensure_config_valid};
use tracing::{info, warn};

use crate::assemble::TablePlan;
use crate::diagnostics::Diagnostics;
use crate::domain::ValueDomain;
use crate::errors::GenerationError;
use crate::foreign::ParentStore;
use crate::model::{GenerateOptions, GenerationIssue, GenerationReport, TableReport, TableStatus};
use crate::planner::{GenerationTask, plan_levels};
use crate::sink::RowSink;
use crate::value::Row;

/// Entry point for generating rows from a schema snapshot and a config.
#[derive(Debug, Clone, Default)]
pub struct GenerationEngine {
    options: GenerateOptions,
}

enum TableOutcome {
    Generated {
        rows: Vec<Row>,
        strategy: Vec<String>,
        duration_ms: u64,
    },
    Failed {
        error: GenerationError,
        duration_ms: u64,
    },
    Skipped {
        parent: String,
    },
}

impl GenerationEngine {
    pub fn new(options: GenerateOptions) -> Self {
        Self { options }
    }

    /// Generate every configured table, level by level, handing each
    /// finished table to `sink`.
    ///
    /// Config and template errors abort before any row is produced. A table
    /// that fails later only takes its dependants down with it; the rest of
    /// the run continues and the failure is reported through
    /// [`GenerationError::Failed`].
    pub fn run(
        &self,
        schema: &DatabaseSchema,
        config: &GenerationConfig,
        sink: &mut dyn RowSink,
    ) -> Result<GenerationReport, GenerationError> {
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        let config_warnings = ensure_config_valid(config, schema)?;
        check_domains(config, schema)?;
        let options = self.options.merged(config.options.as_ref());
        let levels = plan_levels(schema, config)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .thread_name(|idx| format!("rowsmith-worker-{idx}"))
            .build()
            .map_err(|err| GenerationError::WorkerPool(err.to_string()))?;

        let mut report = GenerationReport::new(run_id.clone(), config.seed);
        for issue in &config_warnings {
            warn!(code = %issue.code, path = %issue.path, "{}", issue.message);
            report.record_warning(GenerationIssue::from(issue));
        }

        info!(
            run_id = %run_id,
            tables = config.tables.len(),
            levels = levels.len(),
            workers = options.workers,
            seed = config.seed,
            "generation started"
        );

        let referenced = referenced_parents(&levels);
        let diagnostics = Diagnostics::new();
        let mut store = ParentStore::new();
        let mut unavailable: HashSet<String> = HashSet::new();

        for level in &levels {
            let outcomes: Vec<TableOutcome> = pool.install(|| {
                level
                    .par_iter()
                    .map(|task| {
                        self.generate_task(task, schema, config, &options, &store, &unavailable, &diagnostics)
                    })
                    .collect()
            });

            for (task, outcome) in level.iter().zip(outcomes) {
                let outcome = match outcome {
                    TableOutcome::Generated {
                        rows,
                        strategy,
                        duration_ms,
                    } => match sink.write_table(&task.schema, &task.table, &rows) {
                        Ok(()) => TableOutcome::Generated {
                            rows,
                            strategy,
                            duration_ms,
                        },
                        Err(error) => TableOutcome::Failed { error, duration_ms },
                    },
                    other => other,
                };
                if let TableOutcome::Generated { rows, .. } = &outcome
                    && referenced.contains(&task.key())
                    && let Some(table) = schema.table(&task.schema, &task.table)
                {
                    store.ingest_table(&task.key(), table, Arc::from(rows.as_slice()));
                }
                self.record_outcome(task, outcome, &mut unavailable, &mut report);
            }
        }

        for issue in diagnostics.drain() {
            report.record_warning(issue);
        }
        report.duration_ms = start.elapsed().as_millis() as u64;

        if unavailable.is_empty() {
            info!(
                run_id = %run_id,
                tables = report.tables.len(),
                warnings = report.warnings.len(),
                duration_ms = report.duration_ms,
                "generation completed"
            );
            Ok(report)
        } else {
            warn!(
                run_id = %run_id,
                failed = unavailable.len(),
                duration_ms = report.duration_ms,
                "generation finished with failed tables"
            );
            Err(GenerationError::Failed(report))
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn generate_task(
        &self,
        task: &GenerationTask,
        schema: &DatabaseSchema,
        config: &GenerationConfig,
        options: &GenerateOptions,
        store: &ParentStore,
        unavailable: &HashSet<String>,
        diagnostics: &Diagnostics,
    ) -> TableOutcome {
        if let Some(parent) = task.parents.iter().find(|parent| unavailable.contains(*parent)) {
            return TableOutcome::Skipped {
                parent: parent.clone(),
            };
        }

        let table_start = Instant::now();
        info!(
            schema = %task.schema,
            table = %task.table,
            rows = task.rows,
            "generating table"
        );
        let result = generate_table(task, schema, config, options, store, diagnostics);
        let duration_ms = table_start.elapsed().as_millis() as u64;
        match result {
            Ok((rows, strategy)) => TableOutcome::Generated {
                rows,
                strategy,
                duration_ms,
            },
            Err(error) => TableOutcome::Failed { error, duration_ms },
        }
    }

    fn record_outcome(
        &self,
        task: &GenerationTask,
        outcome: TableOutcome,
        unavailable: &mut HashSet<String>,
        report: &mut GenerationReport,
    ) {
        let mut table_report = TableReport {
            schema: task.schema.clone(),
            table: task.table.clone(),
            rows_requested: task.rows,
            rows_generated: 0,
            status: TableStatus::Completed,
            strategy: Vec::new(),
            duration_ms: 0,
        };

        match outcome {
            TableOutcome::Generated {
                rows,
                strategy,
                duration_ms,
            } => {
                table_report.rows_generated = rows.len() as u64;
                table_report.strategy = strategy;
                table_report.duration_ms = duration_ms;
                info!(
                    schema = %task.schema,
                    table = %task.table,
                    rows_generated = table_report.rows_generated,
                    duration_ms,
                    "table generated"
                );
            }
            TableOutcome::Failed { error, duration_ms } => {
                table_report.status = TableStatus::Failed;
                table_report.duration_ms = duration_ms;
                warn!(
                    schema = %task.schema,
                    table = %task.table,
                    error = %error,
                    "table failed"
                );
                report.record_error(GenerationIssue::error(
                    "table_failed",
                    &task.schema,
                    &task.table,
                    error.to_string(),
                ));
                unavailable.insert(task.key());
            }
            TableOutcome::Skipped { parent } => {
                table_report.status = TableStatus::Skipped;
                warn!(
                    schema = %task.schema,
                    table = %task.table,
                    parent = %parent,
                    "table skipped"
                );
                report.record_warning(GenerationIssue::warning(
                    "parent_failed",
                    &task.schema,
                    &task.table,
                    format!("not generated because parent {parent} failed"),
                ));
                unavailable.insert(task.key());
            }
        }

        report.tables.push(table_report);
    }
}

/// Plan one table, then assemble its chunks on the current pool. Allocator
/// tickets are reserved per chunk in chunk order before any worker starts.
fn generate_table(
    task: &GenerationTask,
    schema: &DatabaseSchema,
    config: &GenerationConfig,
    options: &GenerateOptions,
    store: &ParentStore,
    diagnostics: &Diagnostics,
) -> Result<(Vec<Row>, Vec<String>), GenerationError> {
    let table = schema.table(&task.schema, &task.table).ok_or_else(|| {
        GenerationError::SchemaMismatch(rowsmith_core::Error::SchemaMismatch {
            table: task.key(),
            detail: "table not found in schema".to_string(),
        })
    })?;
    let table_config = config.table(&task.schema, &task.table).ok_or_else(|| {
        GenerationError::Unsupported(format!("no config entry for {}", task.key()))
    })?;

    let plan = TablePlan::build(
        &task.schema,
        table,
        table_config,
        store,
        config.seed,
        options,
        diagnostics,
    )?;

    let work: Vec<(u64, u64, Vec<u64>)> = plan
        .chunks(options.chunk_rows)
        .into_iter()
        .map(|(start, len)| (start, len, plan.reserve_tickets(len)))
        .collect();

    let chunks: Vec<Vec<Row>> = work
        .par_iter()
        .map(|(start, len, tickets)| plan.generate_chunk(*start, *len, tickets, diagnostics))
        .collect::<Result<_, _>>()?;

    let rows = chunks.into_iter().flatten().collect();
    Ok((rows, plan.strategy().to_vec()))
}

/// Keys of tables that some task reads parent values from. Only these are
/// kept in memory once generated.
fn referenced_parents(levels: &[Vec<GenerationTask>]) -> HashSet<String> {
    levels
        .iter()
        .flatten()
        .flat_map(|task| task.parents.iter().cloned())
        .collect()
}

/// Resolve every configured domain against its column up front so a
/// malformed template or an empty range fails the run before generation
/// starts. Unknown tables and columns are left to config validation.
fn check_domains(config: &GenerationConfig, schema: &DatabaseSchema) -> Result<(), GenerationError> {
    for table in &config.tables {
        let Some(schema_table) = schema.table(&table.schema, &table.table) else {
            continue;
        };
        for populate in &table.populate_columns {
            let (Some(spec), Some(column)) = (populate.domain()?, schema_table.column(&populate.column))
            else {
                continue;
            };
            ValueDomain::for_column(&spec, column).map_err(|source| GenerationError::Format {
                column: format!("{}.{}", table.table_key(), populate.column),
                source,
            })?;
        }
    }
    Ok(())
}
