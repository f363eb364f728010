//! In-memory adapter for the TableSource port

use crate::domain::result::LoadError;
use crate::ports::{RawTable, TableSource};

/// Rows already held in memory, e.g. from another parser or a test
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl MemorySource {
    pub fn new<H, S>(name: impl Into<String>, headers: H) -> Self
    where
        H: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row<R, S>(mut self, row: R) -> Self
    where
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
        self
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl TableSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<RawTable<'_>, LoadError> {
        if self.headers.is_empty() {
            return Err(LoadError::EmptyFile(self.name.clone()));
        }
        Ok(RawTable {
            headers: self.headers.clone(),
            rows: Box::new(self.rows.iter().cloned().map(Ok)),
        })
    }
}
