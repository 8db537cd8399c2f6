// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Versioned in-memory keyspace.
//!
//! Maps each key to its current payload, a per-key version counter and a
//! bounded history of prior versions. The keyspace is rebuilt
//! deterministically by replaying the log: applying the same entries in
//! the same order always produces the same map.
//!
//! Versioning rules:
//! - every successful SET increments the key's version by exactly 1
//!   (version 1 for an absent key);
//! - a DELETE removes the key and ends its version chain; a later SET
//!   starts again at version 1.

use crate::log::types::{LogEntry, Operation};
use serde_json::Value;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

/// Current payload, version, and bounded history for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedValue {
    /// Current payload.
    pub value: Value,

    /// Current version, strictly increasing per SET.
    pub version: u64,

    /// Prior `(version, payload)` pairs, oldest first, bounded.
    history: VecDeque<(u64, Value)>,
}

impl VersionedValue {
    fn new(value: Value, version: u64) -> Self {
        Self {
            value,
            version,
            history: VecDeque::new(),
        }
    }
}

/// Outcome of applying a log entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// SET installed; carries the resulting version.
    Applied { version: u64 },

    /// DELETE removed the key.
    Deleted,

    /// DELETE for a key that was not present.
    Missing,
}

/// Thread-safe versioned key-value map.
pub struct Keyspace {
    entries: RwLock<HashMap<String, VersionedValue>>,
    history_limit: usize,
}

impl Keyspace {
    /// Creates an empty keyspace retaining up to `history_limit` prior
    /// versions per key.
    pub fn new(history_limit: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            history_limit,
        }
    }

    /// Applies one log entry.
    ///
    /// A SET carrying a version installs exactly that version, which keeps
    /// replicas and replay deterministic; a SET without one takes
    /// `current + 1`. Version conflict checks happen in the facade before
    /// the entry is ever appended, so nothing conflicting reaches here.
    pub fn apply(&self, entry: &LogEntry) -> ApplyOutcome {
        let mut entries = self.entries.write().expect("keyspace lock poisoned");

        match entry.operation {
            Operation::Set => {
                let value = entry.value.clone().unwrap_or(Value::Null);
                match entries.entry(entry.key.clone()) {
                    Entry::Occupied(mut occupied) => {
                        let existing = occupied.get_mut();
                        let version = entry.version.unwrap_or(existing.version + 1);
                        let prior = std::mem::replace(&mut existing.value, value);
                        existing.history.push_back((existing.version, prior));
                        while existing.history.len() > self.history_limit {
                            existing.history.pop_front();
                        }
                        existing.version = version;
                        ApplyOutcome::Applied { version }
                    }
                    Entry::Vacant(vacant) => {
                        let version = entry.version.unwrap_or(1);
                        vacant.insert(VersionedValue::new(value, version));
                        ApplyOutcome::Applied { version }
                    }
                }
            }
            Operation::Delete => {
                if entries.remove(&entry.key).is_some() {
                    ApplyOutcome::Deleted
                } else {
                    ApplyOutcome::Missing
                }
            }
        }
    }

    /// Current version of a key, if present.
    pub fn current_version(&self, key: &str) -> Option<u64> {
        self.entries
            .read()
            .expect("keyspace lock poisoned")
            .get(key)
            .map(|v| v.version)
    }

    /// Reads the current value, or a retained historical version.
    ///
    /// ## Output
    /// - `Some((value, version))`: the requested payload
    /// - `None`: key absent, or the version is no longer retained
    pub fn get(&self, key: &str, version: Option<u64>) -> Option<(Value, u64)> {
        let entries = self.entries.read().expect("keyspace lock poisoned");
        let current = entries.get(key)?;

        match version {
            None => Some((current.value.clone(), current.version)),
            Some(v) if v == current.version => Some((current.value.clone(), current.version)),
            Some(v) => current
                .history
                .iter()
                .find(|(hv, _)| *hv == v)
                .map(|(hv, hval)| (hval.clone(), *hv)),
        }
    }

    /// Retained `(version, value)` pairs for a key, oldest first and
    /// ending with the current version.
    pub fn history(&self, key: &str) -> Option<Vec<(u64, Value)>> {
        let entries = self.entries.read().expect("keyspace lock poisoned");
        let current = entries.get(key)?;

        let mut history: Vec<(u64, Value)> = current.history.iter().cloned().collect();
        history.push((current.version, current.value.clone()));
        Some(history)
    }

    /// Retained version numbers for a key, ascending.
    pub fn versions(&self, key: &str) -> Option<Vec<u64>> {
        self.history(key)
            .map(|history| history.into_iter().map(|(v, _)| v).collect())
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.entries.read().expect("keyspace lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
