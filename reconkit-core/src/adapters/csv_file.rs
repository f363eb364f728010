//! Delimited-file adapter for the TableSource port

use std::path::{Path, PathBuf};

use crate::domain::result::LoadError;
use crate::ports::{RawTable, TableSource};

/// A delimited text file with a header row
#[derive(Debug, Clone)]
pub struct CsvFileSource {
    path: PathBuf,
    name: String,
    delimiter: u8,
}

impl CsvFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path,
            name,
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reader(&self) -> Result<csv::Reader<std::fs::File>, LoadError> {
        csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| LoadError::io(&self.name, e))
    }
}

impl TableSource for CsvFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<RawTable<'_>, LoadError> {
        let mut reader = self.reader()?;

        let mut headers: Vec<String> = reader
            .headers()
            .map_err(|e| LoadError::io(&self.name, e))?
            .iter()
            .map(str::to_string)
            .collect();
        if let Some(first) = headers.first_mut() {
            *first = first.trim_start_matches('\u{feff}').to_string();
        }
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(LoadError::EmptyFile(self.name.clone()));
        }

        let name = self.name.clone();
        let rows = reader.into_records().map(move |record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(|e| LoadError::io(&name, e))
        });

        Ok(RawTable {
            headers,
            rows: Box::new(rows),
        })
    }
}
