use std::collections::{HashMap, HashSet};

use jsonschema::JSONSchema;
use rowsmith_core::DatabaseSchema;
use serde_json::Value;

use crate::condition::Condition;
use crate::errors::{ConfigError, IssueSeverity, ValidationIssue, ValidationReport};
use crate::model::{GenerationConfig, TableConfig};

/// Validated config with accumulated warnings.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub config: GenerationConfig,
    pub warnings: Vec<ValidationIssue>,
}

/// Validate a config JSON document against the config JSON Schema.
pub fn validate_config_json(
    config_json: &Value,
    config_schema: &Value,
) -> Result<ValidationReport, ConfigError> {
    let compiled =
        JSONSchema::compile(config_schema).map_err(|err| ConfigError::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();

    if let Err(errors) = compiled.validate(config_json) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "schema_violation",
                path,
                error.to_string(),
                None,
            ));
        }
    }

    Ok(report)
}

/// Validate the config end-to-end, returning structured issues on failure.
pub fn validate_config(
    config_json: &Value,
    config_schema: &Value,
    schema: &DatabaseSchema,
) -> Result<ValidatedConfig, ValidationReport> {
    let structural = match validate_config_json(config_json, config_schema) {
        Ok(report) => report,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "schema_validation_error",
                "/",
                err.to_string(),
                None,
            ));
            return Err(report);
        }
    };

    if !structural.is_ok() {
        return Err(structural);
    }

    let config: GenerationConfig = match serde_json::from_value(config_json.clone()) {
        Ok(config) => config,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "invalid_config_json",
                "/",
                err.to_string(),
                None,
            ));
            return Err(report);
        }
    };

    let schema_report = validate_config_against_schema(&config, schema);
    if !schema_report.is_ok() {
        return Err(schema_report);
    }

    Ok(ValidatedConfig {
        config,
        warnings: schema_report.warnings,
    })
}

/// Run the schema checks on an already parsed config and turn any error into
/// a fatal [`ConfigError::Invalid`]. Warnings are handed back to the caller.
pub fn ensure_config_valid(
    config: &GenerationConfig,
    schema: &DatabaseSchema,
) -> Result<Vec<ValidationIssue>, ConfigError> {
    let report = validate_config_against_schema(config, schema);
    if report.is_ok() {
        Ok(report.warnings)
    } else {
        Err(ConfigError::Invalid(report))
    }
}

/// Validate a parsed config against a database schema snapshot.
pub fn validate_config_against_schema(
    config: &GenerationConfig,
    schema: &DatabaseSchema,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    let schema_index = build_schema_index(schema);

    if config.tables.is_empty() {
        report.push_error(ValidationIssue::new(
            IssueSeverity::Error,
            "tables_empty",
            "/tables",
            "config requires at least one table".to_string(),
            Some("add at least one table entry".to_string()),
        ));
        return report;
    }

    let mut seen = HashSet::new();
    for (idx, table) in config.tables.iter().enumerate() {
        let base_path = format!("/tables/{idx}");
        if !seen.insert(table.table_key()) {
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "duplicate_table",
                base_path.clone(),
                "duplicate entry for the same table".to_string(),
                Some("merge duplicate entries into one".to_string()),
            ));
        }
        validate_table(table, &base_path, &schema_index, &mut report);
    }

    validate_schema_conditions(schema, &mut report);

    report
}

fn validate_table(
    table: &TableConfig,
    base_path: &str,
    schema_index: &SchemaIndex,
    report: &mut ValidationReport,
) {
    if table.rows == 0 {
        report.push_error(ValidationIssue::new(
            IssueSeverity::Error,
            "rows_zero",
            format!("{base_path}/rows"),
            "rows must be greater than zero".to_string(),
            Some("set rows to a positive integer".to_string()),
        ));
    }

    let Some(info) = schema_index.table(&table.schema, &table.table) else {
        report.push_error(ValidationIssue::new(
            IssueSeverity::Error,
            "unknown_table",
            format!("{base_path}/table"),
            format!("table '{}' not found in schema.json", table.table_key()),
            None,
        ));
        return;
    };

    let mut populated = HashSet::new();
    for (idx, populate) in table.populate_columns.iter().enumerate() {
        let path = format!("{base_path}/populate_columns/{idx}");
        check_column(info, &populate.column, &path, report);
        if !populated.insert(populate.column.as_str()) {
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "duplicate_populate_column",
                path.clone(),
                format!("column '{}' is configured twice", populate.column),
                None,
            ));
        }
        if let Err(err) = populate.domain() {
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "invalid_domain",
                path.clone(),
                err.to_string(),
                None,
            ));
        }
        let has_other = populate.min.is_some() || populate.max.is_some() || populate.format.is_some();
        if populate.values.is_some() && has_other {
            report.push_warning(ValidationIssue::new(
                IssueSeverity::Warning,
                "values_override",
                path,
                format!(
                    "column '{}' sets values alongside min/max/format; values are used",
                    populate.column
                ),
                None,
            ));
        }
    }

    let mut fk_columns: HashSet<String> = info.fk_columns.clone();
    for (idx, logical) in table.logical_fks.iter().enumerate() {
        let path = format!("{base_path}/logical_fks/{idx}");
        match logical.to_foreign_key(&table.schema) {
            Ok(fk) => {
                for column in &fk.columns {
                    check_column(info, column, &path, report);
                    fk_columns.insert(column.clone());
                }
                match schema_index.table(&fk.referenced_schema, &fk.referenced_table) {
                    Some(parent) => {
                        for column in &fk.referenced_columns {
                            check_column(parent, column, &path, report);
                        }
                    }
                    None => report.push_error(ValidationIssue::new(
                        IssueSeverity::Error,
                        "unknown_parent_table",
                        path,
                        format!(
                            "referenced table '{}.{}' not found in schema.json",
                            fk.referenced_schema, fk.referenced_table
                        ),
                        None,
                    )),
                }
            }
            Err(err) => report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "invalid_logical_fk",
                path,
                err.to_string(),
                None,
            )),
        }
    }

    for (idx, static_fk) in table.static_fks.iter().enumerate() {
        let path = format!("{base_path}/static_fks/{idx}");
        check_column(info, &static_fk.column, &path, report);
        fk_columns.insert(static_fk.column.clone());
        if static_fk.values.is_empty() {
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "static_fk_empty",
                format!("{path}/values"),
                format!("static fk for '{}' has no values", static_fk.column),
                None,
            ));
        }
    }

    for (column, ratio) in &table.fk_ratios {
        let path = format!("{base_path}/fk_ratios/{column}");
        if !ratio.is_finite() || *ratio < 1.0 {
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "invalid_ratio",
                path.clone(),
                ConfigError::InvalidRatio {
                    column: column.clone(),
                    ratio: *ratio,
                }
                .to_string(),
                Some("use a ratio of 1.0 or more".to_string()),
            ));
        }
        if !fk_columns.contains(column) {
            report.push_warning(ValidationIssue::new(
                IssueSeverity::Warning,
                "ratio_not_fk",
                path,
                format!("fk ratio set for '{column}', which is not a foreign key column"),
                None,
            ));
        }
    }
}

fn validate_schema_conditions(schema: &DatabaseSchema, report: &mut ValidationReport) {
    for db_schema in &schema.schemas {
        for table in &db_schema.tables {
            for fk in table.foreign_keys() {
                if let Some(condition) = &fk.condition
                    && let Err(err) = Condition::parse(condition)
                {
                    report.push_error(ValidationIssue::new(
                        IssueSeverity::Error,
                        "invalid_condition",
                        format!("{}.{}", db_schema.name, table.name),
                        err.to_string(),
                        None,
                    ));
                }
            }
        }
    }
}

fn check_column(table: &TableInfo, column: &str, path: &str, report: &mut ValidationReport) {
    if !table.columns.contains(column) {
        report.push_error(ValidationIssue::new(
            IssueSeverity::Error,
            "unknown_column",
            path.to_string(),
            format!("column '{}' not found in table '{}'", column, table.key),
            None,
        ));
    }
}

fn build_schema_index(schema: &DatabaseSchema) -> SchemaIndex {
    let mut tables = HashMap::new();

    for schema_entry in &schema.schemas {
        for table in &schema_entry.tables {
            let key = format!("{}.{}", schema_entry.name, table.name);
            let columns = table.columns.iter().map(|c| c.name.clone()).collect();
            let fk_columns = table
                .foreign_keys()
                .flat_map(|fk| fk.columns.iter().cloned())
                .collect();
            tables.insert(
                key.clone(),
                TableInfo {
                    key,
                    columns,
                    fk_columns,
                },
            );
        }
    }

    SchemaIndex { tables }
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}

struct SchemaIndex {
    tables: HashMap<String, TableInfo>,
}

impl SchemaIndex {
    fn table(&self, schema: &str, table: &str) -> Option<&TableInfo> {
        self.tables.get(&format!("{schema}.{table}"))
    }
}

struct TableInfo {
    key: String,
    columns: HashSet<String>,
    fk_columns: HashSet<String>,
}
