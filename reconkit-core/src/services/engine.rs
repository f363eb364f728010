//! Reconciliation engine - pairs rows by key and classifies every row once
//!
//! The matching pass is a fold over key buckets. Buckets are independent, so
//! with more than one worker the ordered bucket list is cut into contiguous
//! shards that run on scoped threads; shard outputs are concatenated in shard
//! order, which keeps the result identical to a single-threaded run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ScopedJoinHandle};

use chrono::NaiveDate;
use log::{debug, info};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::result::{ConfigError, Error, Result};
use crate::domain::{
    Dataset, MatchOutcome, MissingReason, OutcomeSets, PairingPolicy, ReconMeta,
    ReconciliationResult,
};
use crate::services::planner::{build_index, KeyIndex};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// How often (in buckets) a worker checks for cancellation
const CANCEL_CHECK_INTERVAL: usize = 256;

/// Amount tolerance for a run. Dates are compared for equality only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToleranceConfig {
    amount_tolerance: Decimal,
}

impl ToleranceConfig {
    pub fn new(amount_tolerance: Decimal) -> std::result::Result<Self, ConfigError> {
        if amount_tolerance.is_sign_negative() && !amount_tolerance.is_zero() {
            return Err(ConfigError::NegativeTolerance(amount_tolerance));
        }
        Ok(Self { amount_tolerance })
    }

    /// Zero tolerance: amounts must be equal
    pub fn exact() -> Self {
        Self::default()
    }

    pub fn amount_tolerance(&self) -> Decimal {
        self.amount_tolerance
    }

    /// Inclusive: a difference equal to the tolerance still matches
    pub fn accepts(&self, delta: Decimal) -> bool {
        delta <= self.amount_tolerance
    }
}

/// Shared flag a caller can set to stop a run in progress
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// A run started with [`ReconEngine::spawn`]
pub struct ReconHandle {
    token: CancellationToken,
    handle: JoinHandle<Result<ReconciliationResult>>,
}

impl ReconHandle {
    /// Request cancellation; `join` then returns `Error::Cancelled` unless the run already finished
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the run ends
    pub fn join(self) -> Result<ReconciliationResult> {
        self.handle
            .join()
            .map_err(|_| Error::Worker("reconciliation thread panicked".to_string()))?
    }
}

/// One unit of the matching pass
enum Unit<'a> {
    Shared {
        key: &'a str,
        rows_a: &'a [usize],
        rows_b: &'a [usize],
    },
    OnlyA {
        key: &'a str,
        rows: &'a [usize],
    },
    OnlyB {
        key: &'a str,
        rows: &'a [usize],
    },
}

/// A row whose amount and date both parsed
struct Comparable {
    row: usize,
    amount: Decimal,
    date: NaiveDate,
}

fn comparable(dataset: &Dataset, row: usize) -> std::result::Result<Comparable, MissingReason> {
    let amount = dataset.amount_cell(row).as_amount();
    let date = dataset.date_cell(row).as_date();
    match (amount, date) {
        (Some(amount), Some(date)) => Ok(Comparable { row, amount, date }),
        _ => Err(MissingReason::Unparseable {
            amount: amount.is_none(),
            date: date.is_none(),
        }),
    }
}

/// Split a bucket into comparable rows and (row, reason) for the rest, file order kept
fn split_bucket(dataset: &Dataset, rows: &[usize]) -> (Vec<Comparable>, Vec<(usize, MissingReason)>) {
    let mut ok = Vec::with_capacity(rows.len());
    let mut failed = Vec::new();
    for &row in rows {
        match comparable(dataset, row) {
            Ok(c) => ok.push(c),
            Err(reason) => failed.push((row, reason)),
        }
    }
    (ok, failed)
}

/// Reconciliation engine
///
/// ```ignore
/// let engine = ReconEngine::new(ToleranceConfig::new(dec!(0.01))?).with_workers(4);
/// let result = engine.run(Arc::new(bank), Arc::new(ledger))?;
/// ```
#[derive(Debug, Clone)]
pub struct ReconEngine {
    tolerance: ToleranceConfig,
    pairing: PairingPolicy,
    workers: usize,
    token: CancellationToken,
}

impl ReconEngine {
    pub fn new(tolerance: ToleranceConfig) -> Self {
        Self {
            tolerance,
            pairing: PairingPolicy::FileOrder,
            workers: 1,
            token: CancellationToken::new(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_pairing(mut self, pairing: PairingPolicy) -> Self {
        self.pairing = pairing;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn tolerance(&self) -> ToleranceConfig {
        self.tolerance
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run the engine on a background thread
    pub fn spawn(self, a: Arc<Dataset>, b: Arc<Dataset>) -> ReconHandle {
        let token = self.token.clone();
        let handle = thread::spawn(move || self.run(a, b));
        ReconHandle { token, handle }
    }

    /// Reconcile two datasets. Blocks until the pass is complete.
    pub fn run(&self, a: Arc<Dataset>, b: Arc<Dataset>) -> Result<ReconciliationResult> {
        self.check_cancelled()?;

        let (index_a, index_b) = if self.workers > 1 {
            thread::scope(|s| {
                let ha = s.spawn(|| build_index(&a));
                let hb = s.spawn(|| build_index(&b));
                Ok::<_, Error>((join_worker(ha)?, join_worker(hb)?))
            })?
        } else {
            (build_index(&a), build_index(&b))
        };
        self.check_cancelled()?;

        let units = plan_units(&index_a, &index_b);
        let mut sets = if self.workers > 1 && units.len() > 1 {
            let shard_len = units.len().div_ceil(self.workers);
            debug!(
                "Sharding {} keys across {} workers ({} keys per shard)",
                units.len(),
                self.workers,
                shard_len
            );
            let (da, db): (&Dataset, &Dataset) = (&a, &b);
            thread::scope(|s| {
                let handles: Vec<_> = units
                    .chunks(shard_len)
                    .map(|shard| s.spawn(move || self.fold(shard, da, db)))
                    .collect();
                let mut merged = OutcomeSets::default();
                for handle in handles {
                    merged.extend(join_worker(handle)??);
                }
                Ok::<_, Error>(merged)
            })?
        } else {
            self.fold(&units, &a, &b)?
        };

        for &row in index_a.unkeyed() {
            sets.push(MatchOutcome::MissingInB {
                key: None,
                row_a: row,
                reason: MissingReason::Unkeyed,
            });
        }
        for &row in index_b.unkeyed() {
            sets.push(MatchOutcome::MissingInA {
                key: None,
                row_b: row,
                reason: MissingReason::Unkeyed,
            });
        }
        self.check_cancelled()?;

        let meta = ReconMeta {
            run_id: Uuid::new_v4().to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            source_a: a.name().to_string(),
            source_b: b.name().to_string(),
            amount_tolerance: self.tolerance.amount_tolerance(),
            pairing: self.pairing,
            workers: self.workers,
        };
        let result = ReconciliationResult::new(meta, sets, a, b);
        debug_assert!(result.summary.is_complete());

        info!(
            "Reconciled {} x {} rows: {} exact, {} date notes, {} variances, {} missing in B, {} missing in A",
            result.summary.rows_a,
            result.summary.rows_b,
            result.summary.exact_matches,
            result.summary.matches_with_date_note,
            result.summary.amount_variances,
            result.summary.missing_in_b,
            result.summary.missing_in_a
        );
        Ok(result)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.token.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    fn fold(&self, units: &[Unit<'_>], a: &Dataset, b: &Dataset) -> Result<OutcomeSets> {
        let mut sets = OutcomeSets::default();
        for (i, unit) in units.iter().enumerate() {
            if i % CANCEL_CHECK_INTERVAL == 0 {
                self.check_cancelled()?;
            }
            match unit {
                Unit::Shared { key, rows_a, rows_b } => {
                    self.fold_shared(key, rows_a, rows_b, a, b, &mut sets)
                }
                Unit::OnlyA { key, rows } => {
                    for &row in *rows {
                        sets.push(MatchOutcome::MissingInB {
                            key: Some(key.to_string()),
                            row_a: row,
                            reason: absent_or_unparseable(a, row),
                        });
                    }
                }
                Unit::OnlyB { key, rows } => {
                    for &row in *rows {
                        sets.push(MatchOutcome::MissingInA {
                            key: Some(key.to_string()),
                            row_b: row,
                            reason: absent_or_unparseable(b, row),
                        });
                    }
                }
            }
        }
        Ok(sets)
    }

    /// Pair the comparable rows of a key present on both sides
    fn fold_shared(
        &self,
        key: &str,
        rows_a: &[usize],
        rows_b: &[usize],
        a: &Dataset,
        b: &Dataset,
        sets: &mut OutcomeSets,
    ) {
        let (ok_a, mut left_a) = split_bucket(a, rows_a);
        let (ok_b, mut left_b) = split_bucket(b, rows_b);

        let paired = match self.pairing {
            PairingPolicy::FileOrder => ok_a.len().min(ok_b.len()),
        };
        for (ra, rb) in ok_a.iter().zip(ok_b.iter()) {
            sets.push(self.classify(key, ra, rb, a, b));
        }

        left_a.extend(ok_a[paired..].iter().map(|c| (c.row, MissingReason::Unpaired)));
        left_b.extend(ok_b[paired..].iter().map(|c| (c.row, MissingReason::Unpaired)));
        left_a.sort_by_key(|(row, _)| *row);
        left_b.sort_by_key(|(row, _)| *row);

        for (row, reason) in left_a {
            sets.push(MatchOutcome::MissingInB {
                key: Some(key.to_string()),
                row_a: row,
                reason,
            });
        }
        for (row, reason) in left_b {
            sets.push(MatchOutcome::MissingInA {
                key: Some(key.to_string()),
                row_b: row,
                reason,
            });
        }
    }

    fn classify(&self, key: &str, ra: &Comparable, rb: &Comparable, a: &Dataset, b: &Dataset) -> MatchOutcome {
        // An overflowing difference is far outside any tolerance
        let delta = ra
            .amount
            .checked_sub(rb.amount)
            .map(|d| d.abs())
            .unwrap_or(Decimal::MAX);

        if !self.tolerance.accepts(delta) {
            MatchOutcome::AmountVariance {
                key: key.to_string(),
                row_a: ra.row,
                row_b: rb.row,
                delta,
            }
        } else if ra.date == rb.date {
            MatchOutcome::ExactMatch {
                key: key.to_string(),
                row_a: ra.row,
                row_b: rb.row,
            }
        } else {
            MatchOutcome::DateNote {
                key: key.to_string(),
                row_a: ra.row,
                row_b: rb.row,
                date_a: ra.date,
                date_b: rb.date,
                raw_date_a: a.date_cell(ra.row).raw().to_string(),
                raw_date_b: b.date_cell(rb.row).raw().to_string(),
            }
        }
    }
}

fn absent_or_unparseable(dataset: &Dataset, row: usize) -> MissingReason {
    match comparable(dataset, row) {
        Ok(_) => MissingReason::Absent,
        Err(reason) => reason,
    }
}

/// A's keys in first-appearance order, then keys only B has
fn plan_units<'a>(index_a: &'a KeyIndex, index_b: &'a KeyIndex) -> Vec<Unit<'a>> {
    let mut units = Vec::with_capacity(index_a.key_count() + index_b.key_count());
    for bucket in index_a.buckets() {
        match index_b.get(&bucket.key) {
            Some(rows_b) => units.push(Unit::Shared {
                key: &bucket.key,
                rows_a: &bucket.rows,
                rows_b,
            }),
            None => units.push(Unit::OnlyA {
                key: &bucket.key,
                rows: &bucket.rows,
            }),
        }
    }
    for bucket in index_b.buckets() {
        if !index_a.contains(&bucket.key) {
            units.push(Unit::OnlyB {
                key: &bucket.key,
                rows: &bucket.rows,
            });
        }
    }
    units
}

fn join_worker<T>(handle: ScopedJoinHandle<'_, T>) -> Result<T> {
    handle
        .join()
        .map_err(|_| Error::Worker("worker thread panicked".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemorySource;
    use crate::domain::{Category, SideSchema};
    use crate::services::load::{load, LoadOptions};
    use std::str::FromStr;

    fn dataset(name: &str, rows: &[(&str, &str, &str)]) -> Arc<Dataset> {
        let mut source = MemorySource::new(name, ["key", "date", "amount"]);
        for (key, date, amount) in rows {
            source = source.row([*key, *date, *amount]);
        }
        Arc::new(load(&source, &SideSchema::new("key", "date", "amount"), &LoadOptions::default()).unwrap())
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn exact() -> ReconEngine {
        ReconEngine::new(ToleranceConfig::exact())
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        assert_eq!(
            ToleranceConfig::new(dec("-0.01")),
            Err(ConfigError::NegativeTolerance(dec("-0.01")))
        );
        assert!(ToleranceConfig::new(Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_date_note_scenario() {
        let a = dataset("a", &[("1", "2024-01-01", "100.00")]);
        let b = dataset("b", &[("1", "2024-01-02", "100.00")]);
        let result = exact().run(a, b).unwrap();

        assert_eq!(result.date_notes.len(), 1);
        assert_eq!(result.summary.total_matched(), 1);
        assert_eq!(result.summary.total_unmatched(), 0);
        assert_eq!(result.exact_matches.len(), 0);
        match &result.date_notes[0] {
            MatchOutcome::DateNote { raw_date_a, raw_date_b, .. } => {
                assert_eq!(raw_date_a, "2024-01-01");
                assert_eq!(raw_date_b, "2024-01-02");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_key_only_in_a() {
        let a = dataset("a", &[("9", "2024-01-01", "5.00")]);
        let b = dataset("b", &[("1", "2024-01-01", "5.00")]);
        let result = exact().run(a, b).unwrap();

        assert_eq!(
            result.missing_in_b,
            vec![MatchOutcome::MissingInB {
                key: Some("9".into()),
                row_a: 0,
                reason: MissingReason::Absent
            }]
        );
        assert_eq!(result.missing_in_a.len(), 1);
        assert!(result.summary.is_complete());
    }

    #[test]
    fn test_duplicate_keys_pair_in_file_order() {
        let a = dataset("a", &[("5", "2024-01-01", "10.00"), ("5", "2024-01-01", "20.00")]);
        let b = dataset("b", &[("5", "2024-01-01", "10.00")]);
        let result = exact().run(a, b).unwrap();

        assert_eq!(
            result.exact_matches,
            vec![MatchOutcome::ExactMatch { key: "5".into(), row_a: 0, row_b: 0 }]
        );
        assert_eq!(
            result.missing_in_b,
            vec![MatchOutcome::MissingInB {
                key: Some("5".into()),
                row_a: 1,
                reason: MissingReason::Unpaired
            }]
        );
        assert!(result.missing_in_a.is_empty());
    }

    #[test]
    fn test_tolerance_boundary_is_inclusive() {
        let a = dataset("a", &[("1", "2024-01-01", "100.00"), ("2", "2024-01-01", "100.00")]);
        let b = dataset("b", &[("1", "2024-01-01", "100.05"), ("2", "2024-01-01", "100.06")]);
        let engine = ReconEngine::new(ToleranceConfig::new(dec("0.05")).unwrap());
        let result = engine.run(a, b).unwrap();

        assert_eq!(result.exact_matches.len(), 1);
        assert_eq!(
            result.amount_variances,
            vec![MatchOutcome::AmountVariance {
                key: "2".into(),
                row_a: 1,
                row_b: 1,
                delta: dec("0.06")
            }]
        );
    }

    #[test]
    fn test_extreme_amounts_do_not_abort_run() {
        let max = "79228162514264337593543950335";
        let a = dataset("a", &[("1", "2024-01-01", max), ("2", "2024-01-01", max)]);
        let b = dataset("b", &[("1", "2024-01-01", max), ("2", "2024-01-01", "-1")]);
        let result = exact().run(a, b).unwrap();

        assert!(result.summary.total_a.overflowed());
        assert_eq!(result.summary.total_b.total, Some(Decimal::MAX - Decimal::ONE));
        assert_eq!(result.exact_matches.len(), 1);
        assert_eq!(
            result.amount_variances,
            vec![MatchOutcome::AmountVariance {
                key: "2".into(),
                row_a: 1,
                row_b: 1,
                delta: Decimal::MAX
            }]
        );
    }

    #[test]
    fn test_unparseable_rows_are_flagged() {
        let a = dataset("a", &[("1", "2024-01-01", "oops"), ("1", "2024-01-01", "7.00"), ("2", "bad", "1.00")]);
        let b = dataset("b", &[("1", "2024-01-01", "7.00")]);
        let result = exact().run(a, b).unwrap();

        assert_eq!(result.exact_matches.len(), 1);
        assert_eq!(result.exact_matches[0].row_a(), Some(1));
        let reasons: Vec<_> = result.missing_in_b.iter().filter_map(|o| o.reason()).collect();
        assert_eq!(
            reasons,
            vec![
                MissingReason::Unparseable { amount: true, date: false },
                MissingReason::Unparseable { amount: false, date: true },
            ]
        );
        assert_eq!(result.summary.unparseable_a, 2);
    }

    #[test]
    fn test_unkeyed_rows_emitted_last() {
        let a = dataset("a", &[("", "2024-01-01", "1.00"), ("x", "2024-01-01", "1.00")]);
        let b = dataset("b", &[("  ", "2024-01-01", "1.00"), ("y", "2024-01-01", "1.00")]);
        let result = exact().run(a, b).unwrap();

        let last_b = result.missing_in_b.last().unwrap();
        assert_eq!(last_b.reason(), Some(MissingReason::Unkeyed));
        assert_eq!(last_b.row_a(), Some(0));
        assert_eq!(result.summary.unkeyed_a, 1);
        assert_eq!(result.summary.unkeyed_b, 1);
        assert_eq!(result.outcomes(Category::MissingInA).len(), 2);
    }

    #[test]
    fn test_keys_compare_case_insensitively() {
        let a = dataset("a", &[(" INV-7 ", "2024-02-01", "3.00")]);
        let b = dataset("b", &[("inv-7", "2024-02-01", "3.00")]);
        let result = exact().run(a, b).unwrap();
        assert_eq!(result.exact_matches.len(), 1);
    }

    #[test]
    fn test_sharded_run_matches_sequential() {
        let rows_a: Vec<(String, String, String)> = (0..500)
            .map(|i| (format!("k{}", i % 170), "2024-03-01".to_string(), format!("{}.00", i % 7)))
            .collect();
        let rows_b: Vec<(String, String, String)> = (0..450)
            .map(|i| (format!("k{}", (i * 3) % 200), format!("2024-03-0{}", 1 + i % 2), format!("{}.00", i % 5)))
            .collect();
        fn as_refs(rows: &[(String, String, String)]) -> Vec<(&str, &str, &str)> {
            rows.iter().map(|(k, d, a)| (k.as_str(), d.as_str(), a.as_str())).collect()
        }
        let a = dataset("a", &as_refs(&rows_a));
        let b = dataset("b", &as_refs(&rows_b));

        let sequential = exact().run(Arc::clone(&a), Arc::clone(&b)).unwrap();
        let sharded = exact().with_workers(4).run(a, b).unwrap();

        assert_eq!(sequential.exact_matches, sharded.exact_matches);
        assert_eq!(sequential.date_notes, sharded.date_notes);
        assert_eq!(sequential.amount_variances, sharded.amount_variances);
        assert_eq!(sequential.missing_in_b, sharded.missing_in_b);
        assert_eq!(sequential.missing_in_a, sharded.missing_in_a);
        assert_eq!(sequential.fingerprint(), sharded.fingerprint());
        assert!(sharded.summary.is_complete());
    }

    #[test]
    fn test_cancelled_before_run() {
        let a = dataset("a", &[("1", "2024-01-01", "1.00")]);
        let b = dataset("b", &[("1", "2024-01-01", "1.00")]);
        let engine = exact();
        engine.cancellation_token().cancel();
        assert!(engine.run(a, b).unwrap_err().is_cancelled());
    }

    #[test]
    fn test_spawn_and_join() {
        let a = dataset("a", &[("1", "2024-01-01", "1.00")]);
        let b = dataset("b", &[("1", "2024-01-01", "1.00")]);
        let handle = exact().with_workers(2).spawn(a, b);
        let result = handle.join().unwrap();
        assert_eq!(result.exact_matches.len(), 1);
        assert_eq!(result.meta.workers, 2);
    }
}
