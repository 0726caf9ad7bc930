//! Append-only log of sampled snapshots.

use hs_system::SystemSnapshot;

/// Samples in strictly increasing time order.
///
/// Only the model appends; only reinitialization truncates.
#[derive(Debug, Clone, Default)]
pub struct TimeHistory {
    entries: Vec<SystemSnapshot>,
}

impl TimeHistory {
    pub(crate) fn push(&mut self, snapshot: SystemSnapshot) {
        debug_assert!(
            self.entries
                .last()
                .is_none_or(|last| last.time() < snapshot.time()),
            "samples must be strictly increasing in time"
        );
        self.entries.push(snapshot);
    }

    /// Truncate and replace the initial entry.
    pub(crate) fn restart(&mut self, initial: SystemSnapshot) {
        self.entries.clear();
        self.entries.push(initial);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SystemSnapshot> {
        self.entries.get(index)
    }

    pub fn first(&self) -> Option<&SystemSnapshot> {
        self.entries.first()
    }

    pub fn last(&self) -> Option<&SystemSnapshot> {
        self.entries.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SystemSnapshot> {
        self.entries.iter()
    }

    pub fn times(&self) -> Vec<f64> {
        self.entries.iter().map(|s| s.time()).collect()
    }

    /// `(t, x)` rows for export.
    pub fn records(&self) -> Vec<(f64, Vec<f64>)> {
        self.entries
            .iter()
            .map(|s| (s.time(), s.state().to_vec()))
            .collect()
    }
}

impl<'a> IntoIterator for &'a TimeHistory {
    type Item = &'a SystemSnapshot;
    type IntoIter = std::slice::Iter<'a, SystemSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
