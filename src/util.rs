//! Small shared utilities.
use std::hash::BuildHasherDefault;

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use rustc_hash::FxHasher;

/// A simple incrementing counter.
#[derive(Default)]
pub struct Counter {
    value: usize,
}

impl Counter {
    /// Returns current counter value.
    pub fn curr(&self) -> usize {
        self.value
    }

    /// Post-increments the counter.
    pub fn increment(&mut self) -> usize {
        let curr = self.value;
        self.value += 1;
        curr
    }
}

/// Median of a slice; the input is copied and sorted, an empty slice yields 0.
pub fn median(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let sorted: Vec<u64> = values.iter().copied().sorted_unstable().collect();
    let middle = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[middle]
    } else {
        (sorted[middle - 1] + sorted[middle]) / 2
    }
}

/// IndexMap with faster hash function.
pub type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;
/// IndexSet with faster hash function.
pub type FxIndexSet<K> = IndexSet<K, BuildHasherDefault<FxHasher>>;
