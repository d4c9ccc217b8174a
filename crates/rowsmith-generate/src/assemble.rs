//! Per-table generation plan and row assembly.
//!
//! A [`TablePlan`] is built once per table, single-threaded, and is read-only
//! afterwards. Rows are assembled from it positionally: row `i` only depends
//! on the plan, the reserved allocator tickets and `i`, so chunks can be
//! generated by any worker in any order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rowsmith_core::{Column, ForeignKey, Table, validate_table};
use rowsmith_plan::{Condition, TableConfig};

use crate::allocator::{AllocationSource, UniqueAllocator};
use crate::classify::{
    Classification, ColumnFacts, CompositeKind, ConstraintGroup, UniqueSpec, classify,
};
use crate::combination::{CombinationPool, CombinationSpace, Dimension, DimensionSource};
use crate::diagnostics::Diagnostics;
use crate::domain::ValueDomain;
use crate::errors::GenerationError;
use crate::foreign::{ConditionalCandidate, FkResolver, FkRule, ForeignContext};
use crate::model::{GenerateOptions, GenerationIssue};
use crate::seed::{hash_row_seed, hash_seed};
use crate::stratified::{StratifiedLayout, stratified_select};
use crate::uncontrolled::random_value;
use crate::value::{GeneratedValue, Row, value_key};

#[derive(Debug, Clone)]
enum ColumnSource {
    /// Filled by a combination pool.
    Pooled,
    /// Filled by `allocators[idx]`.
    Unique(usize),
    /// Configured or enum domain, no uniqueness.
    Domain(ValueDomain),
    /// Filled by the FK resolver.
    Foreign,
    Random,
}

#[derive(Debug, Clone)]
struct PlannedColumn {
    column: Column,
    source: ColumnSource,
}

/// Everything needed to produce the rows of one table.
#[derive(Debug)]
pub struct TablePlan {
    schema: String,
    table: String,
    rows: u64,
    seed: u64,
    columns: Vec<PlannedColumn>,
    pools: Vec<CombinationPool>,
    allocators: Vec<UniqueAllocator>,
    resolver: FkResolver,
    strategy: Vec<String>,
}

/// Inputs shared by the planning helpers.
struct PlanContext<'a> {
    schema: &'a str,
    table: &'a Table,
    key: String,
    seed: u64,
    options: &'a GenerateOptions,
    diagnostics: &'a Diagnostics,
}

impl PlanContext<'_> {
    fn warning(&self, code: &str, message: String) -> GenerationIssue {
        GenerationIssue::warning(code, self.schema, &self.table.name, message)
    }
}

/// Value sources of the FK and domain columns, before uniqueness handling.
#[derive(Default)]
struct ColumnSources {
    domains: HashMap<String, ValueDomain>,
    /// Non-conditional parent dimensions, one per FK.
    parents: Vec<Dimension>,
    /// Parent values of single-column non-conditional FKs.
    parent_values: HashMap<String, ValueDomain>,
    rules: Vec<FkRule>,
    /// Every column written by an FK rule.
    fk_columns: HashSet<String>,
    conditional_columns: HashSet<String>,
}

impl ColumnSources {
    /// Dimension for `column`, or `None` when it has no controlled source.
    /// Multi-column parents come back whole.
    fn dimension_for(&self, ctx: &PlanContext<'_>, column: &str) -> Result<Option<Dimension>, GenerationError> {
        if let Some(parent) = self
            .parents
            .iter()
            .find(|parent| parent.columns().iter().any(|candidate| candidate == column))
        {
            return Ok(Some(parent.clone()));
        }
        match self.domains.get(column) {
            Some(domain) => Dimension::new(
                &ctx.key,
                vec![column.to_string()],
                DimensionSource::Domain(domain.clone()),
            )
            .map(Some),
            None => Ok(None),
        }
    }

    /// Dimensions covering `columns` in order, skipping anything already
    /// in `covered`.
    fn dimensions<'c>(
        &self,
        ctx: &PlanContext<'_>,
        columns: impl IntoIterator<Item = &'c String>,
        covered: &mut HashSet<String>,
    ) -> Result<Vec<Dimension>, GenerationError> {
        let mut dims = Vec::new();
        for column in columns {
            if covered.contains(column) {
                continue;
            }
            if let Some(dim) = self.dimension_for(ctx, column)? {
                covered.extend(dim.columns().iter().cloned());
                dims.push(dim);
            }
        }
        Ok(dims)
    }
}

impl TablePlan {
    /// Plan one table. Parent values are read from `parents`; every issue
    /// found while planning goes to `diagnostics`.
    pub fn build(
        schema: &str,
        table: &Table,
        config: &TableConfig,
        parents: &dyn ForeignContext,
        run_seed: u64,
        options: &GenerateOptions,
        diagnostics: &Diagnostics,
    ) -> Result<Self, GenerationError> {
        validate_table(schema, table)?;
        let ctx = PlanContext {
            schema,
            table,
            key: config.table_key(),
            seed: hash_seed(run_seed, &config.table_key()),
            options,
            diagnostics,
        };

        let mut foreign_keys: Vec<ForeignKey> = table.foreign_keys().cloned().collect();
        foreign_keys.extend(config.logical_foreign_keys()?);
        for fk in &foreign_keys {
            if let Some(missing) = fk.columns.iter().find(|column| table.column(column).is_none()) {
                return Err(rowsmith_core::Error::SchemaMismatch {
                    table: ctx.key.clone(),
                    detail: format!("foreign key {} uses unknown column '{missing}'", fk.label()),
                }
                .into());
            }
        }

        let mut sources = fk_sources(&ctx, config, &foreign_keys, parents)?;
        for populate in &config.populate_columns {
            let Some(spec) = populate.domain()? else {
                continue;
            };
            let column = table.column(&populate.column).ok_or_else(|| {
                rowsmith_core::Error::SchemaMismatch {
                    table: ctx.key.clone(),
                    detail: format!("populate_columns names unknown column '{}'", populate.column),
                }
            })?;
            let domain =
                ValueDomain::for_column(&spec, column).map_err(|source| GenerationError::Format {
                    column: populate.column.clone(),
                    source,
                })?;
            sources.domains.insert(populate.column.clone(), domain);
        }
        for column in &table.columns {
            if column.is_enum() && !sources.domains.contains_key(&column.name) {
                sources
                    .domains
                    .insert(column.name.clone(), ValueDomain::labels(&column.enum_values));
            }
        }
        // FK columns take their values from the parent.
        sources
            .domains
            .retain(|column, _| !sources.fk_columns.contains(column));

        let specs = unique_specs(table);
        fit_unique_domains(&ctx, &specs, &mut sources.domains);

        let auto_generated: HashSet<String> = table
            .columns
            .iter()
            .filter(|column| column.is_auto_generated)
            .map(|column| column.name.clone())
            .collect();
        let mut facts = ColumnFacts {
            auto_generated,
            ..ColumnFacts::default()
        };
        for parent in &sources.parents {
            facts.controlled.extend(parent.columns().iter().cloned());
            facts.foreign.extend(parent.columns().iter().cloned());
            if parent.columns().len() > 1 {
                facts.tuple_groups.push(parent.columns().to_vec());
            }
        }
        facts.controlled.extend(
            sources
                .domains
                .keys()
                .filter(|column| !facts.auto_generated.contains(*column))
                .cloned(),
        );

        let classification = classify(specs, &facts);
        let mut plan = Self {
            schema: schema.to_string(),
            table: table.name.clone(),
            rows: config.rows,
            seed: ctx.seed,
            columns: Vec::new(),
            pools: Vec::new(),
            allocators: Vec::new(),
            resolver: FkResolver::new(ctx.key.clone(), Vec::new()),
            strategy: Vec::new(),
        };
        plan.report_classification(&ctx, &classification);

        let mut covered = HashSet::new();
        if let Some(group) = &classification.group {
            plan.build_group_pool(&ctx, &sources, group, &mut covered)?;
        }
        for (spec, kind) in &classification.composites {
            plan.build_composite_pool(&ctx, &sources, spec, *kind, &mut covered)?;
        }
        for spec in &classification.singles {
            plan.build_allocator(&ctx, &sources, spec, &covered)?;
        }

        let ratio_ignored: Vec<&String> = config
            .fk_ratios
            .keys()
            .filter(|column| {
                covered.contains(*column)
                    || plan.allocators.iter().any(|allocator| allocator.column() == column.as_str())
            })
            .collect();
        if !ratio_ignored.is_empty() {
            let columns: Vec<&str> = ratio_ignored.iter().map(|column| column.as_str()).collect();
            diagnostics.record(ctx.warning(
                "fk_ratio_ignored",
                format!(
                    "fk ratio on {} ignored: values come from a uniqueness strategy",
                    columns.join(", ")
                ),
            ));
        }

        plan.columns = table
            .columns
            .iter()
            .filter(|column| !column.is_auto_generated)
            .map(|column| {
                let name = &column.name;
                let source = if covered.contains(name) {
                    ColumnSource::Pooled
                } else if let Some(idx) = plan
                    .allocators
                    .iter()
                    .position(|allocator| allocator.column() == name.as_str())
                {
                    ColumnSource::Unique(idx)
                } else if sources.fk_columns.contains(name) {
                    ColumnSource::Foreign
                } else if let Some(domain) = sources.domains.get(name) {
                    ColumnSource::Domain(domain.clone())
                } else {
                    ColumnSource::Random
                };
                PlannedColumn {
                    column: column.clone(),
                    source,
                }
            })
            .collect();
        plan.resolver = FkResolver::new(ctx.key.clone(), sources.rules);

        Ok(plan)
    }

    fn report_classification(&mut self, ctx: &PlanContext<'_>, classification: &Classification) {
        for spec in &classification.database_assigned {
            self.strategy.push(format!("database:{}", spec.name));
        }
        for (spec, implied_by) in &classification.pruned {
            self.strategy.push(format!("implied:{}", spec.name));
            ctx.diagnostics.record(
                ctx.warning(
                    "implied_constraint_pruned",
                    format!(
                        "unique constraint {} ({}) is implied by {implied_by}",
                        spec.name,
                        spec.columns.join(", ")
                    ),
                )
                .with_constraint(spec.name.clone()),
            );
        }
        for group in &classification.extra_groups {
            let label = group.label();
            ctx.diagnostics.record(
                ctx.warning(
                    "overlap_group_unresolved",
                    format!(
                        "overlapping unique constraints {label} are not enforced; only one overlap group per table is built"
                    ),
                )
                .with_constraint(label),
            );
        }
        for spec in &classification.unresolved {
            self.record_unresolved(ctx, spec);
        }
    }

    fn record_unresolved(&mut self, ctx: &PlanContext<'_>, spec: &UniqueSpec) {
        self.strategy.push(format!("unresolved:{}", spec.name));
        ctx.diagnostics.record(
            ctx.warning(
                "unresolved_unique",
                format!(
                    "unique constraint {} ({}) has no controlled value source; duplicates are possible",
                    spec.name,
                    spec.columns.join(", ")
                ),
            )
            .with_constraint(spec.name.clone()),
        );
    }

    fn record_shortfall(&self, ctx: &PlanContext<'_>, pool: &CombinationPool) {
        if !pool.is_short() {
            return;
        }
        ctx.diagnostics.record(
            ctx.warning(
                "capacity_shortfall",
                format!(
                    "{} distinct combinations for {} rows on {}; combinations repeat",
                    pool.available(),
                    self.rows,
                    pool.name()
                ),
            )
            .with_constraint(pool.name().to_string())
            .with_counts(self.rows, pool.available()),
        );
    }

    fn build_group_pool(
        &mut self,
        ctx: &PlanContext<'_>,
        sources: &ColumnSources,
        group: &ConstraintGroup,
        covered: &mut HashSet<String>,
    ) -> Result<(), GenerationError> {
        let mut dims = sources.dimensions(ctx, &group.shared, covered)?;
        let shared_dims = dims.len();
        dims.extend(sources.dimensions(ctx, &group.non_shared, covered)?);

        let projections = group
            .members
            .iter()
            .map(|member| {
                (shared_dims..dims.len())
                    .filter(|idx| {
                        dims[*idx]
                            .columns()
                            .iter()
                            .all(|column| member.columns.contains(column))
                    })
                    .collect()
            })
            .collect();
        let layout = StratifiedLayout {
            shared_dims,
            projections,
        };
        let space = CombinationSpace::new(dims);
        let label = group.label();
        let selected = stratified_select(
            &space,
            &layout,
            self.rows,
            hash_seed(ctx.seed, &label),
            ctx.options.materialize_limit,
        );
        let pool = CombinationPool::selected(label.clone(), space, self.rows, selected);
        self.record_shortfall(ctx, &pool);
        self.strategy.push(format!("overlap_group:{label}"));
        self.pools.push(pool);
        Ok(())
    }

    fn build_composite_pool(
        &mut self,
        ctx: &PlanContext<'_>,
        sources: &ColumnSources,
        spec: &UniqueSpec,
        kind: CompositeKind,
        covered: &mut HashSet<String>,
    ) -> Result<(), GenerationError> {
        let dims = sources.dimensions(ctx, &spec.columns, covered)?;
        if dims.is_empty() {
            return Ok(());
        }
        let pool = CombinationPool::shuffled(
            spec.name.clone(),
            CombinationSpace::new(dims),
            self.rows,
            hash_seed(ctx.seed, &spec.name),
            ctx.options.materialize_limit,
        );
        self.record_shortfall(ctx, &pool);
        let prefix = match kind {
            CompositeKind::AllForeign => "composite_fk",
            CompositeKind::Mixed => "composite_mixed",
        };
        self.strategy.push(format!("{prefix}:{}", spec.name));
        self.pools.push(pool);
        Ok(())
    }

    fn build_allocator(
        &mut self,
        ctx: &PlanContext<'_>,
        sources: &ColumnSources,
        spec: &UniqueSpec,
        covered: &HashSet<String>,
    ) -> Result<(), GenerationError> {
        let Some(name) = spec.columns.first() else {
            return Ok(());
        };
        if covered.contains(name)
            || self.allocators.iter().any(|allocator| allocator.column() == name.as_str())
        {
            return Ok(());
        }
        if sources.conditional_columns.contains(name) {
            self.record_unresolved(ctx, spec);
            return Ok(());
        }
        let Some(column) = ctx.table.column(name) else {
            return Ok(());
        };

        let pool_seed = hash_seed(ctx.seed, &format!("unique:{name}"));
        let limit = ctx.options.materialize_limit;
        let allocator = if let Some(parent) = sources.parent_values.get(name) {
            UniqueAllocator::pooled(
                name.clone(),
                AllocationSource::Domain(parent.clone()),
                pool_seed,
                limit,
            )
        } else if let Some(domain) = sources.domains.get(name) {
            let source = AllocationSource::Domain(domain.clone());
            // Decimal and temporal ranges are visited in shuffled order.
            match domain {
                ValueDomain::Decimal(_) | ValueDomain::Temporal(_) => {
                    UniqueAllocator::pooled(name.clone(), source, pool_seed, limit)
                }
                _ => UniqueAllocator::sequential(name.clone(), source),
            }
        } else {
            UniqueAllocator::sequential(name.clone(), AllocationSource::Sequence(column.clone()))
        };
        if allocator.capacity() < self.rows {
            ctx.diagnostics.record(
                ctx.warning(
                    "capacity_shortfall",
                    format!(
                        "{} distinct values for {} rows on {}; values repeat",
                        allocator.capacity(),
                        self.rows,
                        spec.name
                    ),
                )
                .with_column(name.clone())
                .with_constraint(spec.name.clone())
                .with_counts(self.rows, allocator.capacity()),
            );
        }
        self.strategy.push(format!("unique_allocator:{}", spec.name));
        self.allocators.push(allocator);
        Ok(())
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// How each uniqueness constraint is handled.
    pub fn strategy(&self) -> &[String] {
        &self.strategy
    }

    /// Split the table into `(start, len)` work units.
    pub fn chunks(&self, chunk_rows: u64) -> Vec<(u64, u64)> {
        let chunk_rows = chunk_rows.max(1);
        (0..self.rows.div_ceil(chunk_rows))
            .map(|idx| {
                let start = idx * chunk_rows;
                (start, chunk_rows.min(self.rows - start))
            })
            .collect()
    }

    /// Claim `len` tickets on every allocator. Call once per chunk, in chunk
    /// order.
    pub fn reserve_tickets(&self, len: u64) -> Vec<u64> {
        self.allocators
            .iter()
            .map(|allocator| allocator.reserve(len))
            .collect()
    }

    /// Assemble rows `start..start + len`. `tickets` is the chunk's
    /// reservation from [`reserve_tickets`](Self::reserve_tickets).
    pub fn generate_chunk(
        &self,
        start: u64,
        len: u64,
        tickets: &[u64],
        diagnostics: &Diagnostics,
    ) -> Result<Vec<Row>, GenerationError> {
        (0..len)
            .map(|offset| self.assemble_row(start + offset, offset, tickets, diagnostics))
            .collect()
    }

    fn assemble_row(
        &self,
        row_index: u64,
        offset: u64,
        tickets: &[u64],
        diagnostics: &Diagnostics,
    ) -> Result<Row, GenerationError> {
        let mut rng = ChaCha8Rng::seed_from_u64(hash_row_seed(self.seed, row_index));
        let mut row = Row::new();

        for pool in &self.pools {
            row.extend(pool.assignments_for_row(row_index));
        }

        for (allocator, first) in self.allocators.iter().zip(tickets) {
            let allocation = allocator.issue(first + offset);
            if allocation.first_wrap {
                diagnostics.record(
                    GenerationIssue::warning(
                        "allocator_wrapped",
                        &self.schema,
                        &self.table,
                        format!(
                            "column {} ran out of distinct values after {}; values repeat",
                            allocator.column(),
                            allocator.capacity()
                        ),
                    )
                    .with_column(allocator.column())
                    .with_counts(self.rows, allocator.capacity()),
                );
            }
            row.insert(allocator.column().to_string(), allocation.value);
        }

        for planned in &self.columns {
            let value = match &planned.source {
                ColumnSource::Domain(domain @ ValueDomain::Values(_)) => domain.value_at(row_index),
                ColumnSource::Domain(domain) => domain.sample(&mut rng),
                ColumnSource::Random => random_value(&planned.column, &mut rng),
                ColumnSource::Pooled | ColumnSource::Unique(_) | ColumnSource::Foreign => continue,
            };
            row.insert(planned.column.name.clone(), value);
        }

        self.resolver.resolve(&mut row, row_index, &mut rng)?;

        for planned in &self.columns {
            if let Some(value) = row.get_mut(&planned.column.name) {
                let current = std::mem::replace(value, GeneratedValue::Null);
                *value = current.truncated(planned.column.character_max_length);
            }
        }
        Ok(row)
    }
}

/// Primary key and unique constraints in declaration order.
fn unique_specs(table: &Table) -> Vec<UniqueSpec> {
    let mut specs = Vec::new();
    if let Some(pk) = table.primary_key() {
        specs.push(UniqueSpec {
            name: pk
                .name
                .clone()
                .unwrap_or_else(|| format!("{}_pkey", table.name)),
            columns: pk.columns.clone(),
            is_primary: true,
            order: 0,
        });
    }
    for (idx, unique) in table.unique_constraints().enumerate() {
        specs.push(UniqueSpec {
            name: unique
                .name
                .clone()
                .unwrap_or_else(|| format!("{}_{}_key", table.name, unique.columns.join("_"))),
            columns: unique.columns.clone(),
            is_primary: false,
            order: idx + 1,
        });
    }
    specs
}

/// Swap configured domains of unique columns that can outgrow the column
/// length for their distinct truncated values, so capacity counts what is
/// actually written.
fn fit_unique_domains(
    ctx: &PlanContext<'_>,
    specs: &[UniqueSpec],
    domains: &mut HashMap<String, ValueDomain>,
) {
    let mut visited = HashSet::new();
    for name in specs.iter().flat_map(|spec| &spec.columns) {
        if !visited.insert(name) {
            continue;
        }
        let (Some(column), Some(domain)) = (ctx.table.column(name), domains.get(name)) else {
            continue;
        };
        let Some(fitted) =
            fit_to_length(domain, column.character_max_length, ctx.options.materialize_limit)
        else {
            continue;
        };
        ctx.diagnostics.record(
            ctx.warning(
                "values_truncated",
                format!(
                    "values of {name} can exceed length {}; {} distinct values remain after truncation",
                    column.character_max_length.unwrap_or_default(),
                    fitted.len()
                ),
            )
            .with_column(name.clone())
            .with_counts(domain.len(), fitted.len()),
        );
        domains.insert(name.clone(), fitted);
    }
}

/// Distinct truncated values of `domain` in enumeration order, or `None`
/// when nothing it produces is longer than `max_length`. At most
/// `walk_limit` values are enumerated.
fn fit_to_length(
    domain: &ValueDomain,
    max_length: Option<u32>,
    walk_limit: u64,
) -> Option<ValueDomain> {
    let max = max_length?;
    if domain.max_text_len().is_none_or(|len| len <= max as usize) {
        return None;
    }
    let mut seen = HashSet::new();
    let mut fitted = Vec::new();
    for index in 0..domain.len().min(walk_limit.max(1)) {
        let value = domain.value_at(index).truncated(Some(max));
        if seen.insert(value_key(&value)) {
            fitted.push(value);
        }
    }
    Some(ValueDomain::Values(fitted.into()))
}

/// Build the parent dimensions and resolver rules for every FK, plus
/// standalone static FKs.
fn fk_sources(
    ctx: &PlanContext<'_>,
    config: &TableConfig,
    foreign_keys: &[ForeignKey],
    parents: &dyn ForeignContext,
) -> Result<ColumnSources, GenerationError> {
    let mut sources = ColumnSources::default();
    let statics: HashMap<String, ValueDomain> = config
        .static_fks
        .iter()
        .map(|entry| {
            let values: Arc<[GeneratedValue]> =
                entry.values.iter().map(GeneratedValue::from_json).collect();
            (entry.column.clone(), ValueDomain::Parent(values))
        })
        .collect();
    let mut used_statics: HashSet<String> = HashSet::new();

    let mut draws: Vec<&ForeignKey> = Vec::new();
    let mut conditionals: Vec<(Vec<String>, Vec<ConditionalCandidate>)> = Vec::new();
    for fk in foreign_keys {
        if fk.referenced_schema == ctx.schema && fk.referenced_table == ctx.table.name {
            if config.ignore_self_referential_fks {
                continue;
            }
            let nullable = fk.columns.iter().all(|column| {
                ctx.table
                    .column(column)
                    .is_some_and(|column| column.is_nullable)
            });
            if !nullable {
                return Err(GenerationError::MissingParentValues {
                    table: ctx.key.clone(),
                    column: fk.columns.join(","),
                    detail: "self-referencing foreign key on a NOT NULL column; set ignore_self_referential_fks"
                        .to_string(),
                });
            }
            sources.fk_columns.extend(fk.columns.iter().cloned());
            sources.rules.push(FkRule::Null {
                columns: fk.columns.clone(),
            });
            continue;
        }
        match &fk.condition {
            Some(expression) => {
                let condition = Condition::parse(expression)?;
                let parent = parent_dimension(ctx, fk, &statics, &mut used_statics, parents)?;
                let candidate = ConditionalCandidate {
                    condition: Some(condition),
                    parent,
                };
                match conditionals.iter_mut().find(|(columns, _)| *columns == fk.columns) {
                    Some((_, candidates)) => candidates.push(candidate),
                    None => conditionals.push((fk.columns.clone(), vec![candidate])),
                }
            }
            None => draws.push(fk),
        }
    }

    for fk in draws {
        let parent = parent_dimension(ctx, fk, &statics, &mut used_statics, parents)?;
        // An unconditional FK on the same columns is the fallback candidate.
        if let Some((_, candidates)) = conditionals
            .iter_mut()
            .find(|(columns, _)| *columns == fk.columns)
        {
            candidates.push(ConditionalCandidate {
                condition: None,
                parent,
            });
            continue;
        }
        push_draw(ctx, config, &mut sources, parent);
    }

    for entry in &config.static_fks {
        let column = &entry.column;
        if used_statics.contains(column) || sources.fk_columns.contains(column) {
            continue;
        }
        let Some(domain) = statics.get(column) else {
            continue;
        };
        let parent = Dimension::new(
            &ctx.key,
            vec![column.clone()],
            DimensionSource::Domain(domain.clone()),
        )?;
        push_draw(ctx, config, &mut sources, parent);
    }

    for (columns, candidates) in conditionals {
        sources.fk_columns.extend(columns.iter().cloned());
        sources.conditional_columns.extend(columns.iter().cloned());
        sources.rules.push(FkRule::Conditional {
            ratio: columns.first().and_then(|column| config.fk_ratios.get(column)).copied(),
            salt: hash_seed(ctx.seed, &format!("fk:{}", columns.join(","))),
            columns,
            candidates,
        });
    }

    Ok(sources)
}

fn push_draw(ctx: &PlanContext<'_>, config: &TableConfig, sources: &mut ColumnSources, parent: Dimension) {
    let columns = parent.columns().to_vec();
    if let [column] = columns.as_slice()
        && let DimensionSource::Domain(domain) = parent.source()
    {
        sources.parent_values.insert(column.clone(), domain.clone());
    }
    sources.fk_columns.extend(columns.iter().cloned());
    sources.rules.push(FkRule::Draw {
        ratio: columns.first().and_then(|column| config.fk_ratios.get(column)).copied(),
        salt: hash_seed(ctx.seed, &format!("fk:{}", columns.join(","))),
        parent: parent.clone(),
    });
    sources.parents.push(parent);
}

/// Parent values for `fk`: a static list for a single column when one is
/// configured, otherwise the distinct values of the generated parent table.
fn parent_dimension(
    ctx: &PlanContext<'_>,
    fk: &ForeignKey,
    statics: &HashMap<String, ValueDomain>,
    used_statics: &mut HashSet<String>,
    parents: &dyn ForeignContext,
) -> Result<Dimension, GenerationError> {
    if let [column] = fk.columns.as_slice()
        && let Some(domain) = statics.get(column)
    {
        used_statics.insert(column.clone());
        return Dimension::new(
            &ctx.key,
            fk.columns.clone(),
            DimensionSource::Domain(domain.clone()),
        );
    }

    let parent_key = format!("{}.{}", fk.referenced_schema, fk.referenced_table);
    let missing = || GenerationError::MissingParentTable {
        table: ctx.key.clone(),
        parent: parent_key.clone(),
    };
    if !parents.has_table(&parent_key) {
        return Err(missing());
    }
    let source = if fk.is_composite() {
        DimensionSource::Tuples(
            parents
                .distinct_tuples(&parent_key, &fk.referenced_columns)
                .ok_or_else(missing)?,
        )
    } else {
        let values = fk
            .referenced_columns
            .first()
            .and_then(|column| parents.distinct_values(&parent_key, column))
            .ok_or_else(missing)?;
        DimensionSource::Domain(ValueDomain::Parent(values))
    };
    Dimension::new(&ctx.key, fk.columns.clone(), source)
}
