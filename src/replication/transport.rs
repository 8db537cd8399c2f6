// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Transport seam for replication traffic.
//!
//! The engine never speaks a wire protocol itself. Outbound calls go
//! through [`PeerTransport`]; inbound calls arrive at a node's
//! [`ReplicationEndpoint`]. An HTTP binding implements both outside this
//! crate; [`InMemoryHub`] wires endpoints directly for single-process
//! clusters and tests.

use crate::cluster::heartbeat::{Heartbeat, HeartbeatAck};
use crate::config::PeerConfig;
use crate::error::{StoreError, StoreResult};
use crate::log::types::LogEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Reply to a replication push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PushOutcome {
    /// Entry (and any fetched predecessors) appended and applied.
    Ack { last_id: u64 },

    /// Entry id at or below the local tail; nothing applied.
    Duplicate { last_id: u64 },

    /// Entry left a gap the receiver could not fill right now; it will
    /// catch up on its next heartbeat.
    Gap { expected_id: u64 },
}

/// Outbound replication calls, all deadline-bounded.
pub trait PeerTransport: Send + Sync {
    /// Ships one entry to a peer.
    fn push_entry(
        &self,
        peer: &PeerConfig,
        entry: &LogEntry,
        deadline: Duration,
    ) -> StoreResult<PushOutcome>;

    /// Fetches the contiguous entries `[from_id, to_id]` from a peer.
    fn fetch_range(
        &self,
        peer: &PeerConfig,
        from_id: u64,
        to_id: u64,
        deadline: Duration,
    ) -> StoreResult<Vec<LogEntry>>;

    /// Delivers a heartbeat to a peer.
    fn send_heartbeat(
        &self,
        peer: &PeerConfig,
        heartbeat: &Heartbeat,
        deadline: Duration,
    ) -> StoreResult<HeartbeatAck>;
}

/// Inbound surface a node exposes to the transport.
pub trait ReplicationEndpoint: Send + Sync {
    fn handle_push(&self, entry: LogEntry) -> StoreResult<PushOutcome>;

    fn handle_range(&self, from_id: u64, to_id: u64) -> StoreResult<Vec<LogEntry>>;

    fn handle_heartbeat(&self, heartbeat: Heartbeat) -> StoreResult<HeartbeatAck>;
}

/// Direct in-process wiring of endpoints, addressed by peer id.
///
/// Unregistered peers behave like unreachable hosts, which makes
/// partition scenarios trivial to stage in tests.
#[derive(Default)]
pub struct InMemoryHub {
    endpoints: RwLock<HashMap<String, Arc<dyn ReplicationEndpoint>>>,
}

impl InMemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects a node under its peer id.
    pub fn register(&self, peer_id: &str, endpoint: Arc<dyn ReplicationEndpoint>) {
        self.endpoints
            .write()
            .expect("hub lock poisoned")
            .insert(peer_id.to_string(), endpoint);
    }

    /// Disconnects a node, simulating a partition.
    pub fn disconnect(&self, peer_id: &str) {
        self.endpoints
            .write()
            .expect("hub lock poisoned")
            .remove(peer_id);
    }

    fn endpoint(&self, peer: &PeerConfig) -> StoreResult<Arc<dyn ReplicationEndpoint>> {
        self.endpoints
            .read()
            .expect("hub lock poisoned")
            .get(&peer.id)
            .cloned()
            .ok_or_else(|| StoreError::PeerUnavailable {
                peer: peer.id.clone(),
                reason: "not connected".to_string(),
            })
    }
}

impl PeerTransport for InMemoryHub {
    fn push_entry(
        &self,
        peer: &PeerConfig,
        entry: &LogEntry,
        _deadline: Duration,
    ) -> StoreResult<PushOutcome> {
        self.endpoint(peer)?.handle_push(entry.clone())
    }

    fn fetch_range(
        &self,
        peer: &PeerConfig,
        from_id: u64,
        to_id: u64,
        _deadline: Duration,
    ) -> StoreResult<Vec<LogEntry>> {
        self.endpoint(peer)?.handle_range(from_id, to_id)
    }

    fn send_heartbeat(
        &self,
        peer: &PeerConfig,
        heartbeat: &Heartbeat,
        _deadline: Duration,
    ) -> StoreResult<HeartbeatAck> {
        self.endpoint(peer)?.handle_heartbeat(heartbeat.clone())
    }
}
