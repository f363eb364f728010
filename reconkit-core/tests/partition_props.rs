//! Property tests: every input row lands in exactly one outcome

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;
use rust_decimal::Decimal;

use reconkit_core::services::load;
use reconkit_core::{Dataset, LoadOptions, MemorySource, ReconEngine, SideSchema, ToleranceConfig};

#[derive(Debug, Clone)]
struct Row {
    key: String,
    date: String,
    amount: String,
}

fn row_strategy() -> impl Strategy<Value = Row> {
    let key = prop_oneof![
        4 => (0u8..12).prop_map(|k| format!("K{}", k)),
        1 => (0u8..12).prop_map(|k| format!(" k{} ", k)),
        1 => Just(String::new()),
    ];
    let date = prop_oneof![
        6 => (1u32..=28, 1u32..=12).prop_map(|(d, m)| format!("2024-{:02}-{:02}", m, d)),
        2 => (1u32..=28, 1u32..=12).prop_map(|(d, m)| format!("{:02}/{:02}/2024", d, m)),
        1 => Just("someday".to_string()),
    ];
    let amount = prop_oneof![
        6 => (-5000i64..5000).prop_map(|c| Decimal::new(c, 2).to_string()),
        2 => (0i64..5000).prop_map(|c| format!("({})", Decimal::new(c, 2))),
        1 => Just("n/a".to_string()),
    ];
    (key, date, amount).prop_map(|(key, date, amount)| Row { key, date, amount })
}

fn dataset(name: &str, rows: &[Row]) -> Arc<Dataset> {
    let mut source = MemorySource::new(name, ["key", "date", "amount"]);
    for row in rows {
        source = source.row([row.key.as_str(), row.date.as_str(), row.amount.as_str()]);
    }
    Arc::new(load(&source, &SideSchema::new("key", "date", "amount"), &LoadOptions::default()).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn every_row_classified_exactly_once(
        rows_a in prop::collection::vec(row_strategy(), 1..40),
        rows_b in prop::collection::vec(row_strategy(), 1..40),
        cents in 0i64..200,
        workers in 1usize..5,
    ) {
        let a = dataset("a", &rows_a);
        let b = dataset("b", &rows_b);
        let tolerance = ToleranceConfig::new(Decimal::new(cents, 2)).unwrap();
        let result = ReconEngine::new(tolerance).with_workers(workers).run(a, b).unwrap();

        let mut seen_a: HashMap<usize, usize> = HashMap::new();
        let mut seen_b: HashMap<usize, usize> = HashMap::new();
        for outcome in result.iter() {
            if let Some(row) = outcome.row_a() {
                *seen_a.entry(row).or_default() += 1;
            }
            if let Some(row) = outcome.row_b() {
                *seen_b.entry(row).or_default() += 1;
            }
        }

        prop_assert_eq!(seen_a.len(), rows_a.len());
        prop_assert_eq!(seen_b.len(), rows_b.len());
        prop_assert!(seen_a.values().all(|&n| n == 1));
        prop_assert!(seen_b.values().all(|&n| n == 1));
        prop_assert!(result.summary.is_complete());
    }

    #[test]
    fn worker_count_does_not_change_tables(
        rows_a in prop::collection::vec(row_strategy(), 1..30),
        rows_b in prop::collection::vec(row_strategy(), 1..30),
        workers in 2usize..6,
    ) {
        let a = dataset("a", &rows_a);
        let b = dataset("b", &rows_b);

        let sequential = ReconEngine::new(ToleranceConfig::exact()).run(Arc::clone(&a), Arc::clone(&b)).unwrap();
        let sharded = ReconEngine::new(ToleranceConfig::exact()).with_workers(workers).run(a, b).unwrap();

        prop_assert_eq!(sequential.tables(), sharded.tables());
    }
}
