//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod table_source;

pub use table_source::{RawRows, RawTable, TableSource};
