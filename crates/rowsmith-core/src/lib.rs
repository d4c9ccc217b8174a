//! Core contracts and helpers for Rowsmith.
//!
//! This crate defines the schema model consumed by the generator, the
//! FK dependency graph, and per-table validation helpers.

pub mod constraints;
pub mod error;
pub mod graph;
pub mod schema;
pub mod validation;

pub use constraints::{Constraint, ForeignKey, PrimaryKey, UniqueConstraint};
pub use error::{Error, Result};
pub use graph::{FkGraphReport, FkGraphSummary, build_fk_graph_report, dependency_levels};
pub use schema::{Column, DatabaseSchema, Schema, Table, TypeClass};
pub use validation::{validate_schema, validate_table};

/// Current schema contract version for `schema.json` artifacts.
pub const SCHEMA_VERSION: &str = "0.1";
