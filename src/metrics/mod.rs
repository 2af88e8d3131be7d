use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;

/// Monotonic counter handle. Clones share the underlying value, so a counter
/// minted once can be incremented by the splitter and read by an exporter.
#[derive(Clone, Debug, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    pub fn inc(&self) {
        self.inc_by(1);
    }

    pub fn inc_by(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Statistics sink consumed by the splitter. Minting the same name twice must
/// return handles over the same underlying value.
pub trait Scope {
    fn counter(&self, name: &str) -> Counter;
}

/// In-memory scope backed by a name-keyed registry. Suitable for tests and
/// embeddings without an external metrics pipeline.
#[derive(Default)]
pub struct MemoryScope {
    counters: Mutex<HashMap<String, Counter>>,
}

impl MemoryScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter, if it has been minted.
    pub fn get(&self, name: &str) -> Option<u64> {
        self.counters.lock().get(name).map(|counter| counter.get())
    }

    /// All counters with their current values, sorted by name.
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        let mut entries: Vec<(String, u64)> = self
            .counters
            .lock()
            .iter()
            .map(|(name, counter)| (name.clone(), counter.get()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl Scope for MemoryScope {
    fn counter(&self, name: &str) -> Counter {
        self.counters
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}
