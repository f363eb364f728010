//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - Delimited files on disk (csv crate) for TableSource
//! - In-memory rows for TableSource (embedders and tests)

pub mod csv_file;
pub mod memory;

pub use csv_file::CsvFileSource;
pub use memory::MemorySource;
