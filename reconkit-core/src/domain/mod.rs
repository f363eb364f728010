//! Core domain entities
//!
//! Datasets, schemas, outcomes and the error types. These are pure data
//! structures with validation logic - no I/O.

mod dataset;
mod outcome;
pub mod result;
mod schema;

pub use dataset::{AmountTotal, Cell, Dataset, Record, TablePreview};
pub use outcome::{
    Category, MatchOutcome, MissingReason, OutcomeSets, PairingPolicy, ReconMeta, ReconSummary,
    ReconciliationResult, ResultTable,
};
pub(crate) use outcome::unique_header;
pub use schema::{ColumnRole, ColumnSpec, Schema, SideSchema};
