//! Reconciliation outcomes, summary, and the five result tables

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::dataset::{AmountTotal, Dataset};

/// The five mutually-exclusive outcome categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ExactMatches,
    DateNotes,
    AmountVariances,
    MissingInB,
    MissingInA,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::ExactMatches,
        Category::DateNotes,
        Category::AmountVariances,
        Category::MissingInB,
        Category::MissingInA,
    ];

    /// Table name used at the export boundary
    pub fn table_name(&self) -> &'static str {
        match self {
            Category::ExactMatches => "exact_matches",
            Category::DateNotes => "matches_with_date_note",
            Category::AmountVariances => "amount_variances",
            Category::MissingInB => "missing_in_b",
            Category::MissingInA => "missing_in_a",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Category::ExactMatches => "exact_matches.csv",
            Category::DateNotes => "matches_with_date_note.csv",
            Category::AmountVariances => "amount_variances.csv",
            Category::MissingInB => "missing_in_source_b.csv",
            Category::MissingInA => "missing_in_source_a.csv",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::ExactMatches => "Exact matches",
            Category::DateNotes => "Matches with date note",
            Category::AmountVariances => "Amount variances",
            Category::MissingInB => "Missing in B",
            Category::MissingInA => "Missing in A",
        }
    }

    pub fn from_table_name(name: &str) -> Option<Self> {
        Category::ALL.into_iter().find(|c| c.table_name() == name)
    }

    fn is_paired(&self) -> bool {
        matches!(
            self,
            Category::ExactMatches | Category::DateNotes | Category::AmountVariances
        )
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Why a row landed in a missing table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MissingReason {
    /// The key does not occur on the other side
    Absent,
    /// The key occurs on both sides but the other bucket had fewer comparable rows
    Unpaired,
    /// The key cell is null or empty
    Unkeyed,
    /// The row could not be compared: amount and/or date failed to normalize
    Unparseable { amount: bool, date: bool },
}

impl MissingReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissingReason::Absent => "absent",
            MissingReason::Unpaired => "unpaired",
            MissingReason::Unkeyed => "unkeyed",
            MissingReason::Unparseable { amount: true, date: true } => "unparseable:amount+date",
            MissingReason::Unparseable { amount: true, date: false } => "unparseable:amount",
            MissingReason::Unparseable { amount: false, date: _ } => "unparseable:date",
        }
    }

    pub fn is_unparseable(&self) -> bool {
        matches!(self, MissingReason::Unparseable { .. })
    }
}

/// Classification of one row (or one A/B pair).
///
/// Rows are referenced by their zero-based index in the source dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchOutcome {
    ExactMatch {
        key: String,
        row_a: usize,
        row_b: usize,
    },
    DateNote {
        key: String,
        row_a: usize,
        row_b: usize,
        date_a: NaiveDate,
        date_b: NaiveDate,
        raw_date_a: String,
        raw_date_b: String,
    },
    AmountVariance {
        key: String,
        row_a: usize,
        row_b: usize,
        delta: Decimal,
    },
    MissingInB {
        key: Option<String>,
        row_a: usize,
        reason: MissingReason,
    },
    MissingInA {
        key: Option<String>,
        row_b: usize,
        reason: MissingReason,
    },
}

impl MatchOutcome {
    pub fn category(&self) -> Category {
        match self {
            MatchOutcome::ExactMatch { .. } => Category::ExactMatches,
            MatchOutcome::DateNote { .. } => Category::DateNotes,
            MatchOutcome::AmountVariance { .. } => Category::AmountVariances,
            MatchOutcome::MissingInB { .. } => Category::MissingInB,
            MatchOutcome::MissingInA { .. } => Category::MissingInA,
        }
    }

    /// Row of dataset A this outcome refers to, if any
    pub fn row_a(&self) -> Option<usize> {
        match self {
            MatchOutcome::ExactMatch { row_a, .. }
            | MatchOutcome::DateNote { row_a, .. }
            | MatchOutcome::AmountVariance { row_a, .. }
            | MatchOutcome::MissingInB { row_a, .. } => Some(*row_a),
            MatchOutcome::MissingInA { .. } => None,
        }
    }

    /// Row of dataset B this outcome refers to, if any
    pub fn row_b(&self) -> Option<usize> {
        match self {
            MatchOutcome::ExactMatch { row_b, .. }
            | MatchOutcome::DateNote { row_b, .. }
            | MatchOutcome::AmountVariance { row_b, .. }
            | MatchOutcome::MissingInA { row_b, .. } => Some(*row_b),
            MatchOutcome::MissingInB { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<MissingReason> {
        match self {
            MatchOutcome::MissingInB { reason, .. } | MatchOutcome::MissingInA { reason, .. } => {
                Some(*reason)
            }
            _ => None,
        }
    }
}

/// Tie-break rule for keys with several rows on one side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingPolicy {
    /// First unconsumed A row pairs with the first unconsumed B row, in file order.
    /// Not an optimal assignment: with unequal bucket sizes a different pairing
    /// could move rows between amount_variances and the missing tables.
    #[default]
    FileOrder,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconSummary {
    pub rows_a: usize,
    pub rows_b: usize,
    pub exact_matches: usize,
    pub matches_with_date_note: usize,
    pub amount_variances: usize,
    pub missing_in_b: usize,
    pub missing_in_a: usize,
    pub unparseable_a: usize,
    pub unparseable_b: usize,
    pub unkeyed_a: usize,
    pub unkeyed_b: usize,
    pub total_a: AmountTotal,
    pub total_b: AmountTotal,
}

impl ReconSummary {
    /// Pairs considered matched (exact + date note)
    pub fn total_matched(&self) -> usize {
        self.exact_matches + self.matches_with_date_note
    }

    /// Outcomes needing attention (variances + missing rows)
    pub fn total_unmatched(&self) -> usize {
        self.amount_variances + self.missing_in_b + self.missing_in_a
    }

    /// Rows accounted for by the outcomes: pairs count twice
    pub fn classified_rows(&self) -> usize {
        2 * (self.exact_matches + self.matches_with_date_note + self.amount_variances)
            + self.missing_in_b
            + self.missing_in_a
    }

    /// Every input row is classified exactly once
    pub fn is_complete(&self) -> bool {
        self.rows_a + self.rows_b == self.classified_rows()
    }

    pub fn count(&self, category: Category) -> usize {
        match category {
            Category::ExactMatches => self.exact_matches,
            Category::DateNotes => self.matches_with_date_note,
            Category::AmountVariances => self.amount_variances,
            Category::MissingInB => self.missing_in_b,
            Category::MissingInA => self.missing_in_a,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    /// Unique per run; not part of the fingerprint
    pub run_id: String,
    pub engine_version: String,
    pub run_at: String,
    pub source_a: String,
    pub source_b: String,
    pub amount_tolerance: Decimal,
    pub pairing: PairingPolicy,
    pub workers: usize,
}

/// A rendered result table: header row plus text rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Output of one reconciliation run. Immutable once returned.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub exact_matches: Vec<MatchOutcome>,
    pub date_notes: Vec<MatchOutcome>,
    pub amount_variances: Vec<MatchOutcome>,
    pub missing_in_b: Vec<MatchOutcome>,
    pub missing_in_a: Vec<MatchOutcome>,
    #[serde(skip)]
    dataset_a: Arc<Dataset>,
    #[serde(skip)]
    dataset_b: Arc<Dataset>,
}

/// The five outcome sequences of a run, in emission order
#[derive(Debug, Default)]
pub struct OutcomeSets {
    pub exact_matches: Vec<MatchOutcome>,
    pub date_notes: Vec<MatchOutcome>,
    pub amount_variances: Vec<MatchOutcome>,
    pub missing_in_b: Vec<MatchOutcome>,
    pub missing_in_a: Vec<MatchOutcome>,
}

impl OutcomeSets {
    pub fn push(&mut self, outcome: MatchOutcome) {
        match outcome.category() {
            Category::ExactMatches => self.exact_matches.push(outcome),
            Category::DateNotes => self.date_notes.push(outcome),
            Category::AmountVariances => self.amount_variances.push(outcome),
            Category::MissingInB => self.missing_in_b.push(outcome),
            Category::MissingInA => self.missing_in_a.push(outcome),
        }
    }

    /// Append another set, keeping its order after ours
    pub fn extend(&mut self, other: OutcomeSets) {
        self.exact_matches.extend(other.exact_matches);
        self.date_notes.extend(other.date_notes);
        self.amount_variances.extend(other.amount_variances);
        self.missing_in_b.extend(other.missing_in_b);
        self.missing_in_a.extend(other.missing_in_a);
    }
}

impl ReconciliationResult {
    pub fn new(meta: ReconMeta, sets: OutcomeSets, dataset_a: Arc<Dataset>, dataset_b: Arc<Dataset>) -> Self {
        let count_reason = |outcomes: &[MatchOutcome], pred: fn(&MissingReason) -> bool| {
            outcomes
                .iter()
                .filter(|o| o.reason().as_ref().is_some_and(pred))
                .count()
        };

        let summary = ReconSummary {
            rows_a: dataset_a.len(),
            rows_b: dataset_b.len(),
            exact_matches: sets.exact_matches.len(),
            matches_with_date_note: sets.date_notes.len(),
            amount_variances: sets.amount_variances.len(),
            missing_in_b: sets.missing_in_b.len(),
            missing_in_a: sets.missing_in_a.len(),
            unparseable_a: count_reason(&sets.missing_in_b, MissingReason::is_unparseable),
            unparseable_b: count_reason(&sets.missing_in_a, MissingReason::is_unparseable),
            unkeyed_a: count_reason(&sets.missing_in_b, |r| *r == MissingReason::Unkeyed),
            unkeyed_b: count_reason(&sets.missing_in_a, |r| *r == MissingReason::Unkeyed),
            total_a: dataset_a.amount_total(),
            total_b: dataset_b.amount_total(),
        };

        Self {
            meta,
            summary,
            exact_matches: sets.exact_matches,
            date_notes: sets.date_notes,
            amount_variances: sets.amount_variances,
            missing_in_b: sets.missing_in_b,
            missing_in_a: sets.missing_in_a,
            dataset_a,
            dataset_b,
        }
    }

    pub fn dataset_a(&self) -> &Dataset {
        &self.dataset_a
    }

    pub fn dataset_b(&self) -> &Dataset {
        &self.dataset_b
    }

    pub fn outcomes(&self, category: Category) -> &[MatchOutcome] {
        match category {
            Category::ExactMatches => &self.exact_matches,
            Category::DateNotes => &self.date_notes,
            Category::AmountVariances => &self.amount_variances,
            Category::MissingInB => &self.missing_in_b,
            Category::MissingInA => &self.missing_in_a,
        }
    }

    /// All outcomes, category by category
    pub fn iter(&self) -> impl Iterator<Item = &MatchOutcome> {
        Category::ALL.into_iter().flat_map(|c| self.outcomes(c).iter())
    }

    /// Render one category with original values and computed fields
    pub fn table(&self, category: Category) -> ResultTable {
        let outcomes = self.outcomes(category);
        let (headers, rows) = if category.is_paired() {
            let headers = paired_headers(category);
            let rows = outcomes.iter().map(|o| self.paired_row(o)).collect();
            (headers, rows)
        } else {
            let dataset = if category == Category::MissingInB {
                &self.dataset_a
            } else {
                &self.dataset_b
            };
            let mut taken: HashSet<String> = ["row", "reason"].into_iter().map(String::from).collect();
            let mut headers = vec!["row".to_string()];
            headers.extend(dataset.schema().headers().map(|h| unique_header(h, &mut taken)));
            headers.push("reason".to_string());
            let rows = outcomes.iter().map(|o| missing_row(dataset, o)).collect();
            (headers, rows)
        };

        ResultTable {
            name: category.table_name().to_string(),
            headers,
            rows,
        }
    }

    pub fn tables(&self) -> Vec<ResultTable> {
        Category::ALL.into_iter().map(|c| self.table(c)).collect()
    }

    /// SHA-256 over every rendered table; equal for identical inputs and tolerance
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for table in self.tables() {
            hasher.update(table.name.as_bytes());
            hasher.update(b"\n");
            hasher.update(table.headers.join("\x1f").as_bytes());
            hasher.update(b"\n");
            for row in &table.rows {
                hasher.update(row.join("\x1f").as_bytes());
                hasher.update(b"\n");
            }
        }
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn paired_row(&self, outcome: &MatchOutcome) -> Vec<String> {
        let (row_a, row_b) = match (outcome.row_a(), outcome.row_b()) {
            (Some(a), Some(b)) => (a, b),
            _ => return Vec::new(),
        };
        let a = &self.dataset_a;
        let b = &self.dataset_b;

        let date = |ds: &Dataset, row: usize| {
            ds.date_cell(row)
                .as_date()
                .map(|d| d.to_string())
                .unwrap_or_else(|| ds.date_cell(row).raw().to_string())
        };
        let amount = |ds: &Dataset, row: usize| {
            ds.amount_cell(row)
                .as_amount()
                .map(|v| v.to_string())
                .unwrap_or_else(|| ds.amount_cell(row).raw().to_string())
        };

        let mut row = vec![
            a.key_cell(row_a).raw().to_string(),
            row_a.to_string(),
            row_b.to_string(),
            date(a, row_a),
            date(b, row_b),
            amount(a, row_a),
            amount(b, row_b),
        ];
        match outcome {
            MatchOutcome::DateNote { .. } => row.push("Date mismatch".to_string()),
            MatchOutcome::AmountVariance { delta, .. } => row.push(delta.to_string()),
            _ => {}
        }
        row.push(a.description_cell(row_a).raw().to_string());
        row.push(b.description_cell(row_b).raw().to_string());
        row
    }
}

/// `name`, or `name_2`, `name_3`, ... when already taken; the result is marked taken
pub(crate) fn unique_header(name: &str, taken: &mut HashSet<String>) -> String {
    let mut candidate = name.to_string();
    let mut n = 2;
    while taken.contains(&candidate) {
        candidate = format!("{}_{}", name, n);
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

fn paired_headers(category: Category) -> Vec<String> {
    let mut headers = vec![
        "match_key", "row_a", "row_b", "date_a", "date_b", "amount_a", "amount_b",
    ];
    match category {
        Category::DateNotes => headers.push("note"),
        Category::AmountVariances => headers.push("variance"),
        _ => {}
    }
    headers.extend(["description_a", "description_b"]);
    headers.into_iter().map(str::to_string).collect()
}

fn missing_row(dataset: &Dataset, outcome: &MatchOutcome) -> Vec<String> {
    let row = match outcome.row_a().or(outcome.row_b()) {
        Some(row) => row,
        None => return Vec::new(),
    };
    let mut cells = vec![row.to_string()];
    if let Some(record) = dataset.record(row) {
        cells.extend((0..dataset.schema().len()).map(|i| record.cell(i).raw().to_string()));
    }
    cells.push(outcome.reason().map(|r| r.as_str()).unwrap_or_default().to_string());
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_header_suffixes() {
        let mut taken: HashSet<String> = ["row".to_string()].into_iter().collect();
        assert_eq!(unique_header("memo", &mut taken), "memo");
        assert_eq!(unique_header("memo", &mut taken), "memo_2");
        assert_eq!(unique_header("row", &mut taken), "row_2");
        assert_eq!(unique_header("memo", &mut taken), "memo_3");
    }

    #[test]
    fn test_category_names() {
        assert_eq!(Category::DateNotes.table_name(), "matches_with_date_note");
        assert_eq!(Category::MissingInA.file_name(), "missing_in_source_a.csv");
        assert_eq!(Category::from_table_name("amount_variances"), Some(Category::AmountVariances));
        assert_eq!(Category::from_table_name("nope"), None);
    }

    #[test]
    fn test_missing_reason_labels() {
        assert_eq!(MissingReason::Absent.as_str(), "absent");
        assert_eq!(
            MissingReason::Unparseable { amount: true, date: true }.as_str(),
            "unparseable:amount+date"
        );
        assert_eq!(
            MissingReason::Unparseable { amount: false, date: true }.as_str(),
            "unparseable:date"
        );
        assert!(MissingReason::Unparseable { amount: true, date: false }.is_unparseable());
        assert!(!MissingReason::Unpaired.is_unparseable());
    }

    #[test]
    fn test_summary_partition_check() {
        let summary = ReconSummary {
            rows_a: 3,
            rows_b: 2,
            exact_matches: 1,
            amount_variances: 1,
            missing_in_b: 1,
            ..Default::default()
        };
        assert_eq!(summary.classified_rows(), 5);
        assert!(summary.is_complete());
        assert_eq!(summary.total_matched(), 1);
        assert_eq!(summary.total_unmatched(), 2);
    }

    #[test]
    fn test_outcome_row_accessors() {
        let o = MatchOutcome::MissingInA {
            key: None,
            row_b: 4,
            reason: MissingReason::Unkeyed,
        };
        assert_eq!(o.category(), Category::MissingInA);
        assert_eq!(o.row_a(), None);
        assert_eq!(o.row_b(), Some(4));
        assert_eq!(o.reason(), Some(MissingReason::Unkeyed));
    }
}
