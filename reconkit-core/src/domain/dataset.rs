//! Dataset domain model - typed cells, records, and loaded tables

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::result::ParseError;
use super::schema::Schema;

static NULL_CELL: Cell = Cell::Null;

/// One typed cell value.
///
/// Every variant can reproduce the original (trimmed) source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Cell {
    Text { value: String },
    Amount { value: Decimal, raw: String },
    Date { value: NaiveDate, raw: String },
    Null,
    /// Normalization failed; the original text is kept
    Unparsed { raw: String, error: ParseError },
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text { value: value.into() }
    }

    /// Original (trimmed) text of the cell
    pub fn raw(&self) -> &str {
        match self {
            Cell::Text { value } => value,
            Cell::Amount { raw, .. } | Cell::Date { raw, .. } | Cell::Unparsed { raw, .. } => raw,
            Cell::Null => "",
        }
    }

    pub fn as_amount(&self) -> Option<Decimal> {
        match self {
            Cell::Amount { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn is_unparsed(&self) -> bool {
        matches!(self, Cell::Unparsed { .. })
    }
}

/// A single row of a dataset, cells in header order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    /// Zero-based position in the source (data rows only)
    pub index: usize,
    pub cells: Vec<Cell>,
}

impl Record {
    pub fn cell(&self, column: usize) -> &Cell {
        self.cells.get(column).unwrap_or(&NULL_CELL)
    }
}

/// A loaded, normalized table. Immutable after load.
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    name: String,
    schema: Schema,
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, schema: Schema, records: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            schema,
            records,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn key_cell(&self, row: usize) -> &Cell {
        self.cell(row, self.schema.key_index())
    }

    pub fn date_cell(&self, row: usize) -> &Cell {
        self.cell(row, self.schema.date_index())
    }

    pub fn amount_cell(&self, row: usize) -> &Cell {
        self.cell(row, self.schema.amount_index())
    }

    pub fn description_cell(&self, row: usize) -> &Cell {
        match self.schema.description_index() {
            Some(column) => self.cell(row, column),
            None => &NULL_CELL,
        }
    }

    fn cell(&self, row: usize, column: usize) -> &Cell {
        self.records
            .get(row)
            .map(|r| r.cell(column))
            .unwrap_or(&NULL_CELL)
    }

    /// Rows whose amount or date could not be normalized
    pub fn unparseable_rows(&self) -> usize {
        (0..self.records.len())
            .filter(|&row| self.amount_cell(row).as_amount().is_none() || self.date_cell(row).as_date().is_none())
            .count()
    }

    /// Sum of the amount column over parsed cells
    pub fn amount_total(&self) -> AmountTotal {
        let mut total = AmountTotal::default();
        for row in 0..self.records.len() {
            match self.amount_cell(row).as_amount() {
                Some(amount) => total.add(amount),
                None => total.unparsed += 1,
            }
        }
        total
    }
}

/// Column total over one dataset's amount column
///
/// `total` is `None` once the running sum no longer fits in a `Decimal`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmountTotal {
    pub total: Option<Decimal>,
    pub parsed: usize,
    pub unparsed: usize,
}

impl Default for AmountTotal {
    fn default() -> Self {
        Self {
            total: Some(Decimal::ZERO),
            parsed: 0,
            unparsed: 0,
        }
    }
}

impl AmountTotal {
    /// Count one parsed amount; an overflowing sum is recorded, not raised
    pub fn add(&mut self, amount: Decimal) {
        self.parsed += 1;
        self.total = self.total.and_then(|t| t.checked_add(amount));
    }

    pub fn overflowed(&self) -> bool {
        self.total.is_none()
    }
}

/// Header plus the first few raw rows of a source, read without a full load
#[derive(Debug, Clone, Serialize)]
pub struct TablePreview {
    pub source: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::SideSchema;

    fn sample() -> Dataset {
        let headers: Vec<String> = ["id", "date", "amount"].iter().map(|s| s.to_string()).collect();
        let schema = Schema::resolve(&SideSchema::new("id", "date", "amount"), &headers).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let records = vec![
            Record {
                index: 0,
                cells: vec![
                    Cell::text("1"),
                    Cell::Date { value: date, raw: "01/01/2024".into() },
                    Cell::Amount { value: Decimal::new(1050, 2), raw: "$10.50".into() },
                ],
            },
            Record {
                index: 1,
                cells: vec![
                    Cell::text("2"),
                    Cell::Date { value: date, raw: "2024-01-01".into() },
                    Cell::Unparsed { raw: "n/a".into(), error: ParseError::InvalidAmount("n/a".into()) },
                ],
            },
            // short row: trailing cells are missing
            Record { index: 2, cells: vec![Cell::text("3")] },
        ];
        Dataset::new("sample", schema, records)
    }

    #[test]
    fn test_cell_raw_text() {
        let ds = sample();
        assert_eq!(ds.amount_cell(0).raw(), "$10.50");
        assert_eq!(ds.amount_cell(1).raw(), "n/a");
        assert_eq!(ds.amount_cell(2).raw(), "");
        assert!(ds.date_cell(2).is_null());
    }

    #[test]
    fn test_amount_total_counts_unparsed() {
        let total = sample().amount_total();
        assert_eq!(total.total, Some(Decimal::new(1050, 2)));
        assert_eq!(total.parsed, 1);
        assert_eq!(total.unparsed, 2);
    }

    #[test]
    fn test_amount_total_overflow_is_recorded() {
        let mut total = AmountTotal::default();
        total.add(Decimal::MAX);
        assert_eq!(total.total, Some(Decimal::MAX));
        total.add(Decimal::ONE);
        assert!(total.overflowed());
        // stays overflowed even if later amounts would bring it back in range
        total.add(-Decimal::MAX);
        assert_eq!(total.total, None);
        assert_eq!(total.parsed, 3);
    }

    #[test]
    fn test_unparseable_rows() {
        assert_eq!(sample().unparseable_rows(), 2);
    }
}
