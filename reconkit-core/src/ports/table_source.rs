//! Tabular source port
//!
//! Defines how the loader reads a delimited table without knowing whether it
//! comes from a file on disk or from rows already held in memory.

use crate::domain::result::LoadError;

/// Streaming iterator over raw data rows, one row held at a time
pub type RawRows<'a> = Box<dyn Iterator<Item = Result<Vec<String>, LoadError>> + 'a>;

/// An opened source: header row plus the remaining rows
pub struct RawTable<'a> {
    pub headers: Vec<String>,
    pub rows: RawRows<'a>,
}

/// Tabular source trait
///
/// Implementations yield the header row and then each data row as raw text.
/// Cells are not trimmed or normalized here; that is the loader's job.
pub trait TableSource: Send + Sync {
    /// Display name used in errors and logs (e.g. the file name)
    fn name(&self) -> &str;

    /// Open the source for one pass.
    ///
    /// A source without a header row fails with `LoadError::EmptyFile`.
    fn open(&self) -> Result<RawTable<'_>, LoadError>;
}
