use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constraints::{Constraint, ForeignKey, PrimaryKey, UniqueConstraint};

/// Top-level schema snapshot for a database.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DatabaseSchema {
    /// Contract version for this schema format.
    pub schema_version: String,
    /// Database engine identifier (e.g. `postgres`).
    pub engine: String,
    /// Schemas captured from the database.
    pub schemas: Vec<Schema>,
}

impl DatabaseSchema {
    pub fn table(&self, schema: &str, table: &str) -> Option<&Table> {
        self.schemas
            .iter()
            .find(|entry| entry.name == schema)
            .and_then(|entry| entry.tables.iter().find(|candidate| candidate.name == table))
    }
}

/// A namespace containing tables.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Schema {
    pub name: String,
    pub tables: Vec<Table>,
}

/// Table metadata: columns plus key and uniqueness constraints.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn primary_key(&self) -> Option<&PrimaryKey> {
        self.constraints.iter().find_map(|constraint| match constraint {
            Constraint::PrimaryKey(pk) => Some(pk),
            _ => None,
        })
    }

    pub fn unique_constraints(&self) -> impl Iterator<Item = &UniqueConstraint> {
        self.constraints.iter().filter_map(|constraint| match constraint {
            Constraint::Unique(unique) => Some(unique),
            _ => None,
        })
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &ForeignKey> {
        self.constraints.iter().filter_map(|constraint| match constraint {
            Constraint::ForeignKey(fk) => Some(fk),
            _ => None,
        })
    }
}

/// Declared type class of a column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TypeClass {
    Integer,
    /// Fixed-point numeric; see `numeric_precision` / `numeric_scale`.
    Decimal,
    Float,
    Boolean,
    String,
    Date,
    #[serde(rename = "datetime")]
    DateTime,
    Time,
    Uuid,
    /// MySQL-style SET; members are listed in `enum_values`.
    Set,
    Other,
}

/// Column metadata for a table.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Column {
    pub name: String,
    pub type_class: TypeClass,
    pub is_nullable: bool,
    /// Identity/serial columns are filled by the database and never assigned.
    #[serde(default)]
    pub is_auto_generated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_scale: Option<u32>,
    /// Labels of an ENUM type, or members of a SET type, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
}

impl Column {
    pub fn is_enum(&self) -> bool {
        !self.is_set() && !self.enum_values.is_empty()
    }

    pub fn is_set(&self) -> bool {
        self.type_class == TypeClass::Set
    }
}
