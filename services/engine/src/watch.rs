//! Watch set: which symbol@exchange streams the engine needs
//!
//! Maps `symbol@exchange → set of holder ids` where holders are order
//! external ids and position uuids. The first holder added to a key means
//! the pub/sub subscription must be opened; removing the last holder means
//! it must be dropped. The engine performs the actual subscribe calls —
//! this structure only reports the edges.

use dashmap::DashMap;
use std::collections::HashSet;

/// Process-local watch set.
pub struct WatchSet {
    entries: DashMap<String, HashSet<String>>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Add a holder. Returns true if the key was previously absent, i.e.
    /// a subscription must be opened.
    pub fn add(&self, key: &str, holder: impl Into<String>) -> bool {
        let mut entry = self.entries.entry(key.to_string()).or_default();
        let was_empty = entry.is_empty();
        entry.insert(holder.into());
        was_empty
    }

    /// Remove a holder. Returns true if this removal emptied the key, i.e.
    /// the subscription must be dropped.
    pub fn remove(&self, key: &str, holder: &str) -> bool {
        let emptied = match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.remove(holder);
                entry.is_empty()
            }
            None => false,
        };
        if emptied {
            self.entries.remove_if(key, |_, holders| holders.is_empty());
        }
        emptied
    }

    /// Whether any holder references this key.
    pub fn has(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|holders| !holders.is_empty())
            .unwrap_or(false)
    }

    /// Number of holders for a key.
    pub fn holder_count(&self, key: &str) -> usize {
        self.entries.get(key).map(|holders| holders.len()).unwrap_or(0)
    }

    /// All watched keys.
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl Default for WatchSet {
    fn default() -> Self {
        Self::new()
    }
}
