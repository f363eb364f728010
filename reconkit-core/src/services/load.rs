//! Dataset loader - reads a TableSource into a typed, normalized Dataset

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::domain::result::LoadError;
use crate::domain::{AmountTotal, Cell, ColumnRole, Dataset, Record, Schema, SideSchema, TablePreview};
use crate::ports::TableSource;
use crate::services::normalize::{normalize_amount, normalize_date, AmountOptions, DateOrder};

/// Rows shown by [`preview`] when the caller does not ask for a count
pub const DEFAULT_PREVIEW_ROWS: usize = 3;

/// Normalization options applied while loading one side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadOptions {
    #[serde(default)]
    pub amount: AmountOptions,
    #[serde(default)]
    pub date_order: DateOrder,
}

/// Load a source into a Dataset.
///
/// Cells of the amount and date columns are normalized; every other cell is
/// trimmed text. A cell that fails to normalize is kept as `Cell::Unparsed`
/// and does not fail the load.
pub fn load(
    source: &dyn TableSource,
    side: &SideSchema,
    options: &LoadOptions,
) -> Result<Dataset, LoadError> {
    let name = source.name().to_string();
    side.validate().map_err(|error| LoadError::InvalidSchema {
        source_name: name.clone(),
        error,
    })?;
    let table = source.open()?;

    let headers: Vec<String> = table.headers.iter().map(|h| h.trim().to_string()).collect();
    let schema = Schema::resolve(side, &headers).map_err(|(role, column)| LoadError::SchemaMismatch {
        source_name: name.clone(),
        role: role.to_string(),
        column,
    })?;

    let roles: Vec<ColumnRole> = schema.columns().iter().map(|c| c.role).collect();
    let mut unparsed = vec![0usize; roles.len()];
    let mut records = Vec::new();

    for (index, row) in table.rows.enumerate() {
        let row = row?;
        let cells = roles
            .iter()
            .enumerate()
            .map(|(col, role)| {
                let raw = row.get(col).map(|s| s.trim()).unwrap_or("");
                let cell = normalize_cell(raw, *role, options);
                if cell.is_unparsed() {
                    unparsed[col] += 1;
                }
                cell
            })
            .collect();
        records.push(Record { index, cells });
    }

    if records.is_empty() {
        return Err(LoadError::EmptyFile(name));
    }

    for (col, count) in unparsed.iter().enumerate() {
        if *count > 0 {
            warn!(
                "{}: {} cell(s) in {} column '{}' could not be parsed",
                name,
                count,
                roles[col],
                headers[col]
            );
        }
    }
    info!("Loaded {} rows, {} columns from {}", records.len(), headers.len(), name);

    Ok(Dataset::new(name, schema, records))
}

fn normalize_cell(raw: &str, role: ColumnRole, options: &LoadOptions) -> Cell {
    if raw.is_empty() {
        return Cell::Null;
    }
    match role {
        ColumnRole::Amount => match normalize_amount(raw, &options.amount) {
            Ok(value) => Cell::Amount {
                value,
                raw: raw.to_string(),
            },
            Err(error) => Cell::Unparsed {
                raw: raw.to_string(),
                error,
            },
        },
        ColumnRole::Date => match normalize_date(raw, options.date_order) {
            Ok(value) => Cell::Date {
                value,
                raw: raw.to_string(),
            },
            Err(error) => Cell::Unparsed {
                raw: raw.to_string(),
                error,
            },
        },
        ColumnRole::Key | ColumnRole::Description | ColumnRole::Other => Cell::text(raw),
    }
}

/// Header plus the first `rows` raw rows, without loading the whole source
pub fn preview(source: &dyn TableSource, rows: usize) -> Result<TablePreview, LoadError> {
    let table = source.open()?;
    let headers = table.headers.iter().map(|h| h.trim().to_string()).collect();
    let rows = table
        .rows
        .take(rows)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TablePreview {
        source: source.name().to_string(),
        headers,
        rows,
    })
}

/// Total of one amount column, streamed without building a Dataset
pub fn column_total(
    source: &dyn TableSource,
    column: &str,
    options: &AmountOptions,
) -> Result<AmountTotal, LoadError> {
    let table = source.open()?;
    let position = table
        .headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| LoadError::SchemaMismatch {
            source_name: source.name().to_string(),
            role: ColumnRole::Amount.to_string(),
            column: column.to_string(),
        })?;

    let mut total = AmountTotal::default();
    for row in table.rows {
        let row = row?;
        let raw = row.get(position).map(|s| s.as_str()).unwrap_or("");
        match normalize_amount(raw, options) {
            Ok(value) => total.add(value),
            Err(_) => total.unparsed += 1,
        }
    }
    Ok(total)
}
