//! Export service - writes result tables as UTF-8 delimited files

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::domain::result::{Error, Result};
use crate::domain::{unique_header, Category, ReconciliationResult, ResultTable};

/// One file written by [`export_all`]
#[derive(Debug, Clone, Serialize)]
pub struct ExportedFile {
    pub category: Category,
    pub path: PathBuf,
    pub rows: usize,
}

/// Write a table with its header row
pub fn write_table<W: Write>(table: &ResultTable, writer: W, delimiter: u8) -> Result<()> {
    let mut out = csv::WriterBuilder::new().delimiter(delimiter).from_writer(writer);
    out.write_record(&table.headers)?;
    for row in &table.rows {
        out.write_record(row)?;
    }
    out.flush()?;
    Ok(())
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.exists() && !dir.is_dir() {
        return Err(Error::export(format!("{} is not a directory", dir.display())));
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Write one category to `dir/<file name>`
pub fn export_table(
    result: &ReconciliationResult,
    category: Category,
    dir: &Path,
    delimiter: u8,
) -> Result<PathBuf> {
    ensure_dir(dir)?;
    let path = dir.join(category.file_name());
    let file = File::create(&path)?;
    write_table(&result.table(category), file, delimiter)?;
    Ok(path)
}

/// Write all five categories, one file each. Empty tables still get a header.
pub fn export_all(result: &ReconciliationResult, dir: &Path, delimiter: u8) -> Result<Vec<ExportedFile>> {
    let mut files = Vec::with_capacity(Category::ALL.len());
    for category in Category::ALL {
        let path = export_table(result, category, dir, delimiter)?;
        files.push(ExportedFile {
            category,
            path,
            rows: result.outcomes(category).len(),
        });
    }
    info!("Exported {} tables to {}", files.len(), dir.display());
    Ok(files)
}

/// Combine every table into one, with a leading `table` column.
///
/// The header is the union of all table headers in first-appearance order;
/// cells a table does not have are left empty. A header that repeats inside
/// one table, or is named `table`, gets a numeric suffix so no cell is lost.
pub fn combined_table(result: &ReconciliationResult) -> ResultTable {
    let tables = result.tables();

    let mut headers = vec!["table".to_string()];
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut targets: Vec<Vec<usize>> = Vec::with_capacity(tables.len());
    for table in &tables {
        let mut taken: HashSet<String> = HashSet::from(["table".to_string()]);
        let columns = table
            .headers
            .iter()
            .map(|header| {
                let name = unique_header(header, &mut taken);
                *positions.entry(name.clone()).or_insert_with(|| {
                    headers.push(name);
                    headers.len() - 1
                })
            })
            .collect();
        targets.push(columns);
    }

    let mut rows = Vec::new();
    for (table, columns) in tables.iter().zip(&targets) {
        for row in &table.rows {
            let mut out = vec![String::new(); headers.len()];
            out[0] = table.name.clone();
            for (value, &target) in row.iter().zip(columns) {
                out[target] = value.clone();
            }
            rows.push(out);
        }
    }

    ResultTable {
        name: "combined".to_string(),
        headers,
        rows,
    }
}

/// Write the combined table to `path`; returns the number of data rows
pub fn export_combined(result: &ReconciliationResult, path: &Path, delimiter: u8) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    let table = combined_table(result);
    let file = File::create(path)?;
    write_table(&table, file, delimiter)?;
    info!("Exported {} combined rows to {}", table.rows.len(), path.display());
    Ok(table.rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemorySource;
    use crate::domain::SideSchema;
    use crate::services::engine::{ReconEngine, ToleranceConfig};
    use crate::services::load::{load, LoadOptions};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn result() -> ReconciliationResult {
        let side = SideSchema::new("ref", "date", "amount").with_description("memo");
        let a = MemorySource::new("bank", ["ref", "date", "amount", "memo"])
            .row(["1", "2024-01-01", "10.00", "coffee"])
            .row(["2", "2024-01-01", "5.00", "tea, hot"])
            .row(["3", "2024-01-01", "1.00", "gum"]);
        let b = MemorySource::new("ledger", ["ref", "date", "amount", "memo"])
            .row(["1", "2024-01-01", "10.00", "Coffee"])
            .row(["2", "2024-01-01", "6.00", "Tea"]);
        let a = load(&a, &side, &LoadOptions::default()).unwrap();
        let b = load(&b, &side, &LoadOptions::default()).unwrap();
        ReconEngine::new(ToleranceConfig::exact())
            .run(Arc::new(a), Arc::new(b))
            .unwrap()
    }

    #[test]
    fn test_export_all_writes_five_files() {
        let dir = TempDir::new().unwrap();
        let files = export_all(&result(), &dir.path().join("out"), b',').unwrap();
        assert_eq!(files.len(), 5);

        let names: Vec<String> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names.contains(&"missing_in_source_b.csv".to_string()));

        let variances = fs::read_to_string(dir.path().join("out/amount_variances.csv")).unwrap();
        assert_eq!(
            variances,
            "match_key,row_a,row_b,date_a,date_b,amount_a,amount_b,variance,description_a,description_b\n\
             2,1,1,2024-01-01,2024-01-01,5.00,6.00,1.00,\"tea, hot\",Tea\n"
        );

        let missing = fs::read_to_string(dir.path().join("out/missing_in_source_b.csv")).unwrap();
        assert_eq!(missing, "row,ref,date,amount,memo,reason\n2,3,2024-01-01,1.00,gum,absent\n");

        let empty = fs::read_to_string(dir.path().join("out/missing_in_source_a.csv")).unwrap();
        assert_eq!(empty, "row,ref,date,amount,memo,reason\n");
    }

    #[test]
    fn test_combined_has_table_column() {
        let table = combined_table(&result());
        assert_eq!(table.headers[0], "table");
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0][0], "exact_matches");
        assert_eq!(table.rows[2][0], "missing_in_b");

        let reason = table.headers.iter().position(|h| h == "reason").unwrap();
        assert_eq!(table.rows[2][reason], "absent");
        assert_eq!(table.rows[0][reason], "");
    }

    #[test]
    fn test_source_headers_clashing_with_computed_columns() {
        // Source columns named like the computed ones, plus a repeated header
        let side = SideSchema::new("table", "date", "amount").with_description("reason");
        let a = MemorySource::new("a", ["table", "date", "amount", "reason", "row", "row"])
            .row(["1", "2024-01-01", "3.00", "late fee", "r1", "r2"]);
        let b = MemorySource::new("b", ["table", "date", "amount", "reason"])
            .row(["2", "2024-01-01", "4.00", "x"]);
        let a = load(&a, &side, &LoadOptions::default()).unwrap();
        let b = load(&b, &side, &LoadOptions::default()).unwrap();
        let result = ReconEngine::new(ToleranceConfig::exact())
            .run(Arc::new(a), Arc::new(b))
            .unwrap();

        let missing = result.table(Category::MissingInB);
        assert_eq!(
            missing.headers,
            vec!["row", "table", "date", "amount", "reason_2", "row_2", "row_3", "reason"]
        );
        assert_eq!(missing.rows[0], vec!["0", "1", "2024-01-01", "3.00", "late fee", "r1", "r2", "absent"]);

        let combined = combined_table(&result);
        let unique: HashSet<&String> = combined.headers.iter().collect();
        assert_eq!(unique.len(), combined.headers.len());
        let col = |name: &str| combined.headers.iter().position(|h| h == name).unwrap();

        let row = &combined.rows[0];
        assert_eq!(row[0], "missing_in_b");
        assert_eq!(row[col("table_2")], "1");
        assert_eq!(row[col("reason_2")], "late fee");
        assert_eq!(row[col("reason")], "absent");
        assert_eq!(row[col("row")], "0");
        assert_eq!(row[col("row_2")], "r1");
        assert_eq!(row[col("row_3")], "r2");
        assert_eq!(combined.rows[1][col("table_2")], "2");
    }

    #[test]
    fn test_export_combined_semicolon() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all.csv");
        let rows = export_combined(&result(), &path, b';').unwrap();
        assert_eq!(rows, 3);
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("table;match_key;row_a;"));
    }

    #[test]
    fn test_export_into_file_path_fails() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("taken");
        fs::write(&file, "x").unwrap();
        let err = export_all(&result(), &file, b',').unwrap_err();
        assert!(matches!(err, Error::Export(_)));
    }
}
