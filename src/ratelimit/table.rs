//! Per-key state storage shared by the limiter implementations.

use dashmap::DashMap;
use parking_lot::Mutex;

/// A concurrent map from key to a mutex-guarded state record.
///
/// Lookups take a shard read guard and then the record's own lock, so
/// decisions for different keys never wait on each other beyond the map
/// lookup. Creation of an unseen key goes through `entry`, which makes
/// get-or-create atomic.
pub(crate) struct StateTable<S> {
    entries: DashMap<String, Mutex<S>>,
}

impl<S> StateTable<S> {
    pub(crate) fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Run `f` against the state for `key` while holding its lock, creating
    /// the state with `init` if the key has not been seen before.
    pub(crate) fn with_state<R>(
        &self,
        key: &str,
        init: impl FnOnce() -> S,
        f: impl FnOnce(&mut S) -> R,
    ) -> R {
        if let Some(entry) = self.entries.get(key) {
            let mut state = entry.lock();
            return f(&mut state);
        }

        let entry = self
            .entries
            .entry(key.to_owned())
            .or_insert_with(|| Mutex::new(init()))
            .downgrade();
        let mut state = entry.lock();
        f(&mut state)
    }

    /// Read the state for `key` without creating it.
    #[cfg(test)]
    pub(crate) fn inspect<R>(&self, key: &str, f: impl FnOnce(&S) -> R) -> Option<R> {
        self.entries.get(key).map(|entry| f(&entry.lock()))
    }

    /// Remove every record for which `stale` returns true.
    ///
    /// Returns the number of records removed.
    pub(crate) fn sweep(&self, mut stale: impl FnMut(&mut S) -> bool) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, state| {
            if stale(state.get_mut()) {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&self) {
        self.entries.clear();
    }
}

impl<S> Default for StateTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_state_creates_once() {
        let table: StateTable<u32> = StateTable::new();

        table.with_state("a", || 10, |n| *n += 1);
        table.with_state("a", || 100, |n| *n += 1);

        assert_eq!(table.inspect("a", |n| *n), Some(12));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_inspect_does_not_create() {
        let table: StateTable<u32> = StateTable::new();
        assert_eq!(table.inspect("missing", |n| *n), None);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_sweep_counts_removed() {
        let table: StateTable<u32> = StateTable::new();
        for (key, value) in [("a", 1), ("b", 2), ("c", 3)] {
            table.with_state(key, || value, |_| ());
        }

        let removed = table.sweep(|n| *n % 2 == 1);

        assert_eq!(removed, 2);
        assert_eq!(table.len(), 1);
        assert_eq!(table.inspect("b", |n| *n), Some(2));
    }

    #[test]
    fn test_clear() {
        let table: StateTable<u32> = StateTable::new();
        table.with_state("a", || 1, |_| ());
        table.clear();
        assert_eq!(table.len(), 0);
    }
}
