//! Constraint-aware synthetic row generation for Rowsmith.
//!
//! This crate consumes a schema snapshot and a generation config and
//! produces rows that respect uniqueness, foreign keys and configured value
//! domains, deterministically for a given seed.

pub mod allocator;
pub mod assemble;
pub mod classify;
pub mod combination;
pub mod diagnostics;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod foreign;
pub mod logging;
pub mod model;
pub mod planner;
pub mod seed;
pub mod sink;
pub mod stratified;
pub mod template;
pub mod uncontrolled;
pub mod value;

pub use engine::GenerationEngine;
pub use errors::{FormatError, GenerationError};
pub use model::{
    GenerateOptions, GenerationIssue, GenerationReport, TableReport, TableStatus,
};
pub use sink::{CollectingSink, RowSink};
pub use value::{GeneratedValue, Row};
