//! Generation config contracts, loading, and validation.

pub mod condition;
pub mod errors;
pub mod model;
pub mod schema;
pub mod validate;

pub use condition::{Condition, ConditionOp};
pub use errors::{ConfigError, IssueSeverity, ValidationIssue, ValidationReport};
pub use model::{
    CONFIG_VERSION, ColumnDomainSpec, GenerationConfig, LogicalFkConfig, PopulateColumnConfig,
    RangeBound, RunOptions, StaticFkConfig, TableConfig, TemplateSpec,
};
pub use schema::config_json_schema;
pub use validate::{
    ValidatedConfig, ensure_config_valid, validate_config, validate_config_against_schema,
    validate_config_json,
};
