// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Idempotent-receiver cache.
//!
//! Remembers the reply produced for each `(client_id, request_id,
//! operation)` triple so a retried request returns the original reply
//! without mutating state again. Records expire after a TTL; a periodic
//! sweep evicts them. The cache is consulted before any log position is
//! taken, so duplicates never burn ids.
//!
//! The same `(client_id, request_id)` pair with a *different* operation is
//! a separate record: it is counted as a cross-operation duplicate but
//! processed normally.

use crate::log::types::Operation;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Result of consulting the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum DedupLookup<R> {
    /// Same triple seen before: the stored reply must be returned.
    Hit(R),

    /// Same `(client_id, request_id)` with a different operation: process
    /// normally.
    NewOperation,

    /// Never seen.
    Miss,
}

/// Counters exposed on the stats surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DedupStats {
    pub size: usize,
    pub distinct_request_ids: usize,
    pub distinct_clients: usize,
    pub recorded_total: u64,
    pub duplicates_same_operation: u64,
    pub duplicates_different_operation: u64,
    pub sweeps: u64,
}

struct CachedEntry<R> {
    reply: R,
    created_at: Instant,
    created_at_wall: DateTime<Utc>,
}

struct Inner<R> {
    entries: HashMap<(String, String), HashMap<Operation, CachedEntry<R>>>,
    recorded_total: u64,
    duplicates_same_operation: u64,
    duplicates_different_operation: u64,
    sweeps: u64,
}

/// TTL cache of request replies, generic over the reply type.
pub struct DedupCache<R> {
    ttl: Duration,
    inner: Mutex<Inner<R>>,
}

impl<R: Clone> DedupCache<R> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                recorded_total: 0,
                duplicates_same_operation: 0,
                duplicates_different_operation: 0,
                sweeps: 0,
            }),
        }
    }

    /// Consults the cache for a request. Expired records count as misses
    /// and are evicted on the spot.
    pub fn lookup(
        &self,
        client_id: &str,
        request_id: &str,
        operation: Operation,
    ) -> DedupLookup<R> {
        let mut guard = self.inner.lock().expect("dedup lock poisoned");
        let inner = &mut *guard;
        let now = Instant::now();
        let ttl = self.ttl;

        let pair = (client_id.to_string(), request_id.to_string());
        let Some(by_operation) = inner.entries.get_mut(&pair) else {
            return DedupLookup::Miss;
        };

        by_operation.retain(|_, entry| now.duration_since(entry.created_at) <= ttl);
        if by_operation.is_empty() {
            inner.entries.remove(&pair);
            return DedupLookup::Miss;
        }

        match by_operation.get(&operation) {
            Some(entry) => {
                let reply = entry.reply.clone();
                inner.duplicates_same_operation += 1;
                DedupLookup::Hit(reply)
            }
            None => {
                inner.duplicates_different_operation += 1;
                DedupLookup::NewOperation
            }
        }
    }

    /// Stores the reply produced for a request.
    pub fn record(&self, client_id: &str, request_id: &str, operation: Operation, reply: R) {
        let mut inner = self.inner.lock().expect("dedup lock poisoned");
        inner.recorded_total += 1;
        inner
            .entries
            .entry((client_id.to_string(), request_id.to_string()))
            .or_default()
            .insert(
                operation,
                CachedEntry {
                    reply,
                    created_at: Instant::now(),
                    created_at_wall: Utc::now(),
                },
            );
    }

    /// Evicts all records older than the TTL. Returns the eviction count.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut inner = self.inner.lock().expect("dedup lock poisoned");
        let ttl = self.ttl;
        let before: usize = inner.entries.values().map(HashMap::len).sum();

        inner.entries.retain(|_, by_operation| {
            by_operation
                .retain(|_, entry| now.duration_since(entry.created_at) <= ttl);
            !by_operation.is_empty()
        });

        let after: usize = inner.entries.values().map(HashMap::len).sum();
        inner.sweeps += 1;
        before - after
    }

    /// Current counters.
    pub fn stats(&self) -> DedupStats {
        let inner = self.inner.lock().expect("dedup lock poisoned");

        let mut request_ids = HashSet::new();
        let mut clients = HashSet::new();
        for (client_id, request_id) in inner.entries.keys() {
            clients.insert(client_id.as_str());
            request_ids.insert(request_id.as_str());
        }

        DedupStats {
            size: inner.entries.values().map(HashMap::len).sum(),
            distinct_request_ids: request_ids.len(),
            distinct_clients: clients.len(),
            recorded_total: inner.recorded_total,
            duplicates_same_operation: inner.duplicates_same_operation,
            duplicates_different_operation: inner.duplicates_different_operation,
            sweeps: inner.sweeps,
        }
    }

    /// Oldest wall-clock record time, for diagnostics.
    pub fn oldest_record_at(&self) -> Option<DateTime<Utc>> {
        let inner = self.inner.lock().expect("dedup lock poisoned");
        inner
            .entries
            .values()
            .flat_map(HashMap::values)
            .map(|entry| entry.created_at_wall)
            .min()
    }
}
