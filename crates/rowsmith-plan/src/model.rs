use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use rowsmith_core::ForeignKey;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::Condition;
use crate::errors::ConfigError;

/// Current contract version for generation config documents.
pub const CONFIG_VERSION: &str = "0.1";

fn default_config_version() -> String {
    CONFIG_VERSION.to_string()
}

/// Canonical configuration for a generation run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationConfig {
    /// Contract version for the config format.
    #[serde(default = "default_config_version")]
    pub config_version: String,
    /// Seed for reproducibility.
    pub seed: u64,
    /// Optional run-level options; engine defaults apply when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<RunOptions>,
    /// Tables to generate.
    pub tables: Vec<TableConfig>,
}

impl GenerationConfig {
    /// Parse a JSON document.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Parse a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Load a config file, picking the parser from the extension (`.toml`
    /// or anything else as JSON).
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&contents),
            _ => Self::from_json_str(&contents),
        }
    }

    pub fn table(&self, schema: &str, table: &str) -> Option<&TableConfig> {
        self.tables
            .iter()
            .find(|entry| entry.schema == schema && entry.table == table)
    }
}

/// Run-level tuning knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RunOptions {
    /// Worker threads in the generation pool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// Rows per work unit handed to a worker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_rows: Option<u64>,
    /// Combination pools at or below this size are materialized and shuffled;
    /// larger ones are addressed by rank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub materialize_limit: Option<u64>,
}

/// Per-table generation settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TableConfig {
    /// Schema name (namespace) of the table.
    pub schema: String,
    /// Table name within the schema.
    pub table: String,
    /// Number of rows to generate.
    pub rows: u64,
    /// Value sources for individual columns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub populate_columns: Vec<PopulateColumnConfig>,
    /// Foreign keys not declared in the database.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logical_fks: Vec<LogicalFkConfig>,
    /// Pre-sampled parent values, used like physical parent values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_fks: Vec<StaticFkConfig>,
    /// FK column -> expected child rows per distinct parent value.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fk_ratios: BTreeMap<String, f64>,
    /// Leave self-referencing FK columns out of assignment entirely.
    #[serde(default)]
    pub ignore_self_referential_fks: bool,
}

impl TableConfig {
    pub fn table_key(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// Normalize every logical FK into the schema model's representation.
    pub fn logical_foreign_keys(&self) -> Result<Vec<ForeignKey>, ConfigError> {
        self.logical_fks
            .iter()
            .map(|fk| fk.to_foreign_key(&self.schema))
            .collect()
    }
}

/// Value source for one column.
///
/// At most one of `values`, `min`/`max` or `format` is meaningful; `values`
/// wins when several are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PopulateColumnConfig {
    pub column: String,
    /// Explicit value set, reused cyclically.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<RangeBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<RangeBound>,
    /// Template such as `CODE_{:03d}_{:02d}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Per-placeholder `[min, max]` ranges, by position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_ranges: Option<Vec<[i64; 2]>>,
}

/// One end of a `min`/`max` range: an integer, a decimal, or a
/// `YYYY-MM-DD[ HH:MM:SS]` string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RangeBound {
    Integer(i64),
    Decimal(f64),
    Temporal(String),
}

impl RangeBound {
    fn as_f64(&self) -> Option<f64> {
        match self {
            RangeBound::Integer(value) => Some(*value as f64),
            RangeBound::Decimal(value) => Some(*value),
            RangeBound::Temporal(_) => None,
        }
    }
}

impl From<i64> for RangeBound {
    fn from(value: i64) -> Self {
        RangeBound::Integer(value)
    }
}

impl From<f64> for RangeBound {
    fn from(value: f64) -> Self {
        RangeBound::Decimal(value)
    }
}

impl From<&str> for RangeBound {
    fn from(value: &str) -> Self {
        RangeBound::Temporal(value.to_string())
    }
}

impl fmt::Display for RangeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeBound::Integer(value) => write!(f, "{value}"),
            RangeBound::Decimal(value) => write!(f, "{value}"),
            RangeBound::Temporal(value) => write!(f, "'{value}'"),
        }
    }
}

/// Resolved value source of a column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDomainSpec {
    Values(Vec<Value>),
    NumericRange {
        min: i64,
        max: i64,
    },
    DecimalRange {
        min: f64,
        max: f64,
    },
    /// Date or datetime bounds. Date-only bounds sit at midnight and leave
    /// `with_time` unset.
    TemporalRange {
        min: NaiveDateTime,
        max: NaiveDateTime,
        with_time: bool,
    },
    Template(TemplateSpec),
}

/// Template source: the format string plus the resolved range of every slot
/// that was configured. Slots past `slot_ranges` default to `[0, 9]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSpec {
    pub format: String,
    pub slot_ranges: Vec<(i64, i64)>,
}

impl PopulateColumnConfig {
    /// Resolve the configured fields into a single domain.
    ///
    /// Returns `Ok(None)` when the entry names the column without giving it a
    /// source.
    pub fn domain(&self) -> Result<Option<ColumnDomainSpec>, ConfigError> {
        if let Some(values) = &self.values {
            if values.is_empty() {
                return Err(ConfigError::EmptyValues {
                    column: self.column.clone(),
                });
            }
            return Ok(Some(ColumnDomainSpec::Values(values.clone())));
        }

        let range = match (&self.min, &self.max) {
            (Some(min), Some(max)) => Some(self.resolve_range(min, max)?),
            (None, None) => None,
            (Some(_), None) => return Err(self.missing("max")),
            (None, Some(_)) => return Err(self.missing("min")),
        };

        if let Some(format) = &self.format {
            let mut slot_ranges: Vec<(i64, i64)> = self
                .format_ranges
                .iter()
                .flatten()
                .map(|[min, max]| (*min, *max))
                .collect();
            if let Some((min, max)) = slot_ranges.iter().find(|(min, max)| min > max) {
                return Err(ConfigError::InvertedRange {
                    column: self.column.clone(),
                    min: RangeBound::Integer(*min),
                    max: RangeBound::Integer(*max),
                });
            }
            if slot_ranges.is_empty() {
                match range.ok_or_else(|| self.missing("min/max"))? {
                    ColumnDomainSpec::NumericRange { min, max } => slot_ranges.push((min, max)),
                    _ => return Err(self.invalid_bound("format placeholders need integer min/max")),
                }
            }
            return Ok(Some(ColumnDomainSpec::Template(TemplateSpec {
                format: format.clone(),
                slot_ranges,
            })));
        }

        Ok(range)
    }

    fn resolve_range(
        &self,
        min: &RangeBound,
        max: &RangeBound,
    ) -> Result<ColumnDomainSpec, ConfigError> {
        let inverted = || ConfigError::InvertedRange {
            column: self.column.clone(),
            min: min.clone(),
            max: max.clone(),
        };
        match (min, max) {
            (RangeBound::Integer(lo), RangeBound::Integer(hi)) => {
                if lo > hi {
                    return Err(inverted());
                }
                Ok(ColumnDomainSpec::NumericRange { min: *lo, max: *hi })
            }
            (RangeBound::Temporal(lo), RangeBound::Temporal(hi)) => {
                let (lo, lo_time) = parse_temporal(lo)
                    .ok_or_else(|| self.invalid_bound(&format!("'{lo}' is not a date or datetime")))?;
                let (hi, hi_time) = parse_temporal(hi)
                    .ok_or_else(|| self.invalid_bound(&format!("'{hi}' is not a date or datetime")))?;
                if lo > hi {
                    return Err(inverted());
                }
                Ok(ColumnDomainSpec::TemporalRange {
                    min: lo,
                    max: hi,
                    with_time: lo_time || hi_time,
                })
            }
            (RangeBound::Temporal(_), _) | (_, RangeBound::Temporal(_)) => {
                Err(self.invalid_bound("min and max mix dates with numbers"))
            }
            _ => {
                let (Some(lo), Some(hi)) = (min.as_f64(), max.as_f64()) else {
                    return Err(self.invalid_bound("numeric bounds expected"));
                };
                if !lo.is_finite() || !hi.is_finite() {
                    return Err(self.invalid_bound("bounds must be finite"));
                }
                if lo > hi {
                    return Err(inverted());
                }
                Ok(ColumnDomainSpec::DecimalRange { min: lo, max: hi })
            }
        }
    }

    fn invalid_bound(&self, detail: &str) -> ConfigError {
        ConfigError::InvalidBound {
            column: self.column.clone(),
            detail: detail.to_string(),
        }
    }

    fn missing(&self, field: &str) -> ConfigError {
        ConfigError::MissingField {
            column: self.column.clone(),
            field: field.to_string(),
        }
    }
}

/// Parse `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` or the `T`-separated form. The
/// flag tells whether a time of day was given.
fn parse_temporal(input: &str) -> Option<(NaiveDateTime, bool)> {
    let input = input.trim();
    for pattern in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(input, pattern) {
            return Some((parsed, true));
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|parsed| (parsed, false))
}

/// Foreign key declared in config rather than the database.
///
/// Single-column form uses `column` + `referenced_column`; composite form uses
/// `child_columns` + `referenced_columns`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct LogicalFkConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_column: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub referenced_columns: Vec<String>,
    /// Defaults to the owning table's schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_schema: Option<String>,
    pub referenced_table: String,
    /// Discriminator rule, e.g. `owner_type = 'user'`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl LogicalFkConfig {
    pub fn to_foreign_key(&self, owner_schema: &str) -> Result<ForeignKey, ConfigError> {
        let invalid = |detail: &str| ConfigError::InvalidForeignKey {
            table: self.referenced_table.clone(),
            detail: detail.to_string(),
        };

        let (columns, referenced_columns) = match (&self.column, &self.referenced_column) {
            (Some(column), Some(referenced)) => {
                if !self.child_columns.is_empty() || !self.referenced_columns.is_empty() {
                    return Err(invalid("mixes single-column and composite forms"));
                }
                (vec![column.clone()], vec![referenced.clone()])
            }
            (None, None) => {
                if self.child_columns.is_empty() {
                    return Err(invalid("no child columns"));
                }
                if self.child_columns.len() != self.referenced_columns.len() {
                    return Err(invalid("child and referenced column counts differ"));
                }
                (self.child_columns.clone(), self.referenced_columns.clone())
            }
            _ => return Err(invalid("column and referenced_column must be set together")),
        };

        if let Some(condition) = &self.condition {
            Condition::parse(condition)?;
        }

        Ok(ForeignKey {
            name: self.name.clone(),
            columns,
            referenced_schema: self
                .referenced_schema
                .clone()
                .unwrap_or_else(|| owner_schema.to_string()),
            referenced_table: self.referenced_table.clone(),
            referenced_columns,
            condition: self.condition.clone(),
        })
    }
}

/// Parent values supplied directly by the config.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StaticFkConfig {
    pub column: String,
    pub values: Vec<Value>,
    /// Free-form note on where the values came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}
