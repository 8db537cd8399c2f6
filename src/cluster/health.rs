// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Peer health classification.
//!
//! Tracks the last heartbeat received from every configured peer and
//! classifies each as healthy or down. A peer transitions to healthy only
//! on heartbeat receipt and to down only through the timeout sweep; both
//! transitions are idempotent. A peer no heartbeat was ever received from
//! is down.

use crate::config::PeerConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Healthy/down classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerStatus {
    Healthy,
    Down,
}

/// Health record for one peer.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerHealth {
    pub url: String,
    pub status: PeerStatus,
    pub last_heartbeat: Option<Instant>,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
}

/// Table of peer health records.
pub struct HealthTable {
    timeout: Duration,
    peers: RwLock<HashMap<String, PeerHealth>>,
}

impl HealthTable {
    /// Creates the table with every configured peer initially down.
    pub fn new(peers: &[PeerConfig], timeout: Duration) -> Self {
        let entries = peers
            .iter()
            .map(|peer| {
                (
                    peer.id.clone(),
                    PeerHealth {
                        url: peer.url.clone(),
                        status: PeerStatus::Down,
                        last_heartbeat: None,
                        last_heartbeat_at: None,
                    },
                )
            })
            .collect();

        Self {
            timeout,
            peers: RwLock::new(entries),
        }
    }

    /// Records a heartbeat received from a peer and marks it healthy.
    ///
    /// Heartbeats from unknown senders are ignored. Returns whether the
    /// sender was known.
    pub fn record_heartbeat(&self, peer_id: &str, now: Instant) -> bool {
        let mut peers = self.peers.write().expect("health lock poisoned");
        match peers.get_mut(peer_id) {
            Some(peer) => {
                peer.last_heartbeat = Some(now);
                peer.last_heartbeat_at = Some(Utc::now());
                peer.status = PeerStatus::Healthy;
                true
            }
            None => false,
        }
    }

    /// Marks every peer whose last heartbeat is older than the timeout as
    /// down. Returns the number of healthy-to-down transitions.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut peers = self.peers.write().expect("health lock poisoned");
        let mut transitions = 0;

        for peer in peers.values_mut() {
            let expired = match peer.last_heartbeat {
                Some(at) => now.duration_since(at) > self.timeout,
                None => true,
            };
            if expired && peer.status == PeerStatus::Healthy {
                transitions += 1;
            }
            if expired {
                peer.status = PeerStatus::Down;
            }
        }

        transitions
    }

    /// Current classification of a peer.
    pub fn status(&self, peer_id: &str) -> Option<PeerStatus> {
        self.peers
            .read()
            .expect("health lock poisoned")
            .get(peer_id)
            .map(|peer| peer.status)
    }

    /// Ids of all currently healthy peers.
    pub fn healthy_peers(&self) -> Vec<String> {
        let peers = self.peers.read().expect("health lock poisoned");
        let mut healthy: Vec<String> = peers
            .iter()
            .filter(|(_, peer)| peer.status == PeerStatus::Healthy)
            .map(|(id, _)| id.clone())
            .collect();
        healthy.sort();
        healthy
    }

    /// Full table snapshot, sorted by peer id.
    pub fn snapshot(&self) -> Vec<(String, PeerHealth)> {
        let peers = self.peers.read().expect("health lock poisoned");
        let mut snapshot: Vec<(String, PeerHealth)> = peers
            .iter()
            .map(|(id, peer)| (id.clone(), peer.clone()))
            .collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }
}
