//! Match planner - groups the rows of one dataset by normalized key

use std::collections::HashMap;

use log::debug;

use crate::domain::Dataset;
use crate::services::normalize::normalize_key;

/// Rows sharing one normalized key, in file order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub key: String,
    pub rows: Vec<usize>,
}

/// Key → row-group index over one dataset.
///
/// Buckets keep first-appearance order; rows with an empty key go to the
/// unkeyed bucket. Every row index appears exactly once.
#[derive(Debug, Clone, Default)]
pub struct KeyIndex {
    buckets: Vec<Bucket>,
    positions: HashMap<String, usize>,
    unkeyed: Vec<usize>,
}

impl KeyIndex {
    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn get(&self, key: &str) -> Option<&[usize]> {
        self.positions
            .get(key)
            .map(|&pos| self.buckets[pos].rows.as_slice())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    pub fn unkeyed(&self) -> &[usize] {
        &self.unkeyed
    }

    pub fn key_count(&self) -> usize {
        self.buckets.len()
    }

    /// Rows across all buckets plus the unkeyed bucket
    pub fn row_count(&self) -> usize {
        self.buckets.iter().map(|b| b.rows.len()).sum::<usize>() + self.unkeyed.len()
    }
}

/// Build the key index of a dataset using its schema's key column
pub fn build_index(dataset: &Dataset) -> KeyIndex {
    let mut index = KeyIndex::default();

    for row in 0..dataset.len() {
        match normalize_key(dataset.key_cell(row).raw()) {
            Some(key) => match index.positions.get(&key) {
                Some(&pos) => index.buckets[pos].rows.push(row),
                None => {
                    index.positions.insert(key.clone(), index.buckets.len());
                    index.buckets.push(Bucket { key, rows: vec![row] });
                }
            },
            None => index.unkeyed.push(row),
        }
    }

    debug_assert_eq!(index.row_count(), dataset.len());
    debug!(
        "Indexed {}: {} keys, {} unkeyed rows",
        dataset.name(),
        index.key_count(),
        index.unkeyed.len()
    );
    index
}
