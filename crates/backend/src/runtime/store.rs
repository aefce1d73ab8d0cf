use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
};

use lazy_static::lazy_static;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::instrumentation::CoverageKey;

/// Counts recorded for one file, keyed by coverage key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawCoverage(BTreeMap<CoverageKey, u64>);

impl RawCoverage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count of `key`, 0 if it never ran.
    pub fn get(&self, key: &str) -> u64 {
        self.0.get(key).copied().unwrap_or_default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: CoverageKey, count: u64) {
        self.0.insert(key, count);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CoverageKey, u64)> + '_ {
        self.0.iter().map(|(key, count)| (key, *count))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(CoverageKey, u64)> for RawCoverage {
    fn from_iter<I: IntoIterator<Item = (CoverageKey, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

type Counters = FxHashMap<CoverageKey, AtomicU64>;

/// Per-file coverage counters, incremented by executing instrumented code.
///
/// Increments of a known key only take the read lock; the write lock is taken to allocate the
/// counters of a new file or key.
#[derive(Debug, Default)]
pub struct CoverageStore {
    files: RwLock<FxHashMap<Arc<str>, Counters>>,
}

impl CoverageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter of `key` in `file` and return the new count.
    pub fn increment(&self, file: &str, key: &str) -> u64 {
        if let Some(counter) = self.read().get(file).and_then(|counters| counters.get(key)) {
            return counter.fetch_add(1, Ordering::Relaxed) + 1;
        }

        let mut files = self.write();
        let counters = files.entry(Arc::from(file)).or_default();
        let counter = counters.entry(CoverageKey::from(key)).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Current counts of `file`, or `None` if nothing in it ran.
    pub fn snapshot(&self, file: &str) -> Option<RawCoverage> {
        let files = self.read();
        let counters = files.get(file)?;
        Some(
            counters
                .iter()
                .map(|(key, counter)| (key.clone(), counter.load(Ordering::Relaxed)))
                .collect(),
        )
    }

    /// Files with at least one recorded count, sorted.
    pub fn files(&self) -> Vec<String> {
        let mut files: Vec<_> = self.read().keys().map(|file| file.to_string()).collect();
        files.sort();
        files
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, FxHashMap<Arc<str>, Counters>> {
        self.files.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, FxHashMap<Arc<str>, Counters>> {
        self.files.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

lazy_static! {
    static ref GLOBAL_STORE: Arc<CoverageStore> = Arc::new(CoverageStore::new());
}

/// The process-wide store used by hosts that do not provide their own.
pub fn global_store() -> Arc<CoverageStore> {
    GLOBAL_STORE.clone()
}

#[cfg(test)]
mod tests {
    use std::thread;

    use serial_test::serial;

    use super::*;

    #[test]
    fn test_increment_and_snapshot() {
        let store = CoverageStore::new();
        assert!(store.snapshot("a.js").is_none());

        assert_eq!(store.increment("a.js", "s:1:0:1:4"), 1);
        assert_eq!(store.increment("a.js", "s:1:0:1:4"), 2);
        store.increment("a.js", "b:2:0:2:1");

        let raw = store.snapshot("a.js").unwrap();
        assert_eq!(raw.get("s:1:0:1:4"), 2);
        assert_eq!(raw.get("b:2:0:2:1"), 1);
        assert_eq!(raw.get("f:9:0:9:1"), 0);
        assert_eq!(raw.len(), 2);
    }

    #[test]
    fn test_files_are_isolated() {
        let store = CoverageStore::new();
        store.increment("b.js", "s:1:0:1:1");
        store.increment("a.js", "s:1:0:1:1");
        assert_eq!(store.files(), vec!["a.js", "b.js"]);

        store.clear();
        assert!(store.files().is_empty());
        assert!(store.snapshot("a.js").is_none());
    }

    #[test]
    fn test_concurrent_increments() {
        let store = Arc::new(CoverageStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        store.increment("a.js", "s:1:0:1:1");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.snapshot("a.js").unwrap().get("s:1:0:1:1"), 8000);
    }

    #[test]
    fn test_raw_coverage_json() {
        let raw: RawCoverage =
            [(CoverageKey::from("s:1:0:1:1"), 3), (CoverageKey::from("b:1:0:1:1"), 0)]
                .into_iter()
                .collect();
        let json = serde_json::to_string(&raw).unwrap();
        assert_eq!(json, r#"{"b:1:0:1:1":0,"s:1:0:1:1":3}"#);
        assert_eq!(serde_json::from_str::<RawCoverage>(&json).unwrap(), raw);
    }

    #[test]
    #[serial]
    fn test_global_store_is_shared() {
        let first = global_store();
        first.increment("global.js", "s:1:0:1:1");
        assert_eq!(global_store().snapshot("global.js").unwrap().get("s:1:0:1:1"), 1);
        global_store().clear();
    }
}
