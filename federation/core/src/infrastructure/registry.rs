// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Concurrency-safe string-keyed registry.
//!
//! Used wherever several tasks share a registry without a higher-level
//! lock: the active per-kind schedulers and the per-type-config plugin
//! sets. Reads run concurrently with reads; writes are exclusive.

use parking_lot::RwLock;
use std::collections::HashMap;

pub struct SafeMap<V> {
    inner: RwLock<HashMap<String, V>>,
}

impl<V: Clone> SafeMap<V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self, key: impl Into<String>, value: V) {
        self.inner.write().insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.read().get(key).cloned()
    }

    /// Unordered snapshot of all values.
    pub fn get_all(&self) -> Vec<V> {
        self.inner.read().values().cloned().collect()
    }

    pub fn delete(&self, key: &str) {
        self.inner.write().remove(key);
    }

    pub fn delete_all(&self) {
        self.inner.write().clear();
    }

    pub fn size(&self) -> usize {
        self.inner.read().len()
    }
}

impl<V: Clone> Default for SafeMap<V> {
    fn default() -> Self {
        Self::new()
    }
}
