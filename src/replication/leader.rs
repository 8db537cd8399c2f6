// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Leader-side replication shipper.
//!
//! Freshly appended entries are handed to [`Replicator::enqueue`] and
//! shipped to every currently healthy follower by a background thread.
//! The client acknowledgment never waits on any of this: a peer that is
//! down is skipped, and a peer that stops answering mid-push is retried a
//! bounded number of times and then left to catch up through the
//! heartbeat path.

use crate::cluster::health::{HealthTable, PeerStatus};
use crate::config::PeerConfig;
use crate::log::types::LogEntry;
use crate::metrics::{Metric, MetricUnit, MetricsCollector};
use crate::replication::transport::PeerTransport;
use crate::tasks::TaskHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Push attempts per entry and peer before giving up on the push path.
const MAX_PUSH_ATTEMPTS: u32 = 3;

/// Base backoff between push attempts; doubles per attempt.
const PUSH_BACKOFF: Duration = Duration::from_millis(50);

/// Fans appended entries out to healthy followers.
pub struct Replicator {
    transport: Arc<dyn PeerTransport>,
    health: Arc<HealthTable>,
    peers: Vec<PeerConfig>,
    deadline: Duration,
    sender: Sender<LogEntry>,
    receiver: Mutex<Option<Receiver<LogEntry>>>,
}

impl Replicator {
    pub fn new(
        transport: Arc<dyn PeerTransport>,
        health: Arc<HealthTable>,
        peers: Vec<PeerConfig>,
        deadline: Duration,
    ) -> Self {
        let (sender, receiver) = channel();
        Self {
            transport,
            health,
            peers,
            deadline,
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Queues an entry for shipment. Never blocks the caller.
    pub fn enqueue(&self, entry: LogEntry) {
        // A send fails only after the shipper has shut down, at which
        // point followers catch up via heartbeat instead.
        let _ = self.sender.send(entry);
    }

    /// Ships one entry synchronously to every healthy follower.
    pub fn ship(&self, entry: &LogEntry) {
        for peer in &self.peers {
            if self.health.status(&peer.id) != Some(PeerStatus::Healthy) {
                continue;
            }
            self.push_with_retry(peer, entry);
        }
    }

    fn push_with_retry(&self, peer: &PeerConfig, entry: &LogEntry) {
        let started = Instant::now();
        for attempt in 0..MAX_PUSH_ATTEMPTS {
            match self.transport.push_entry(peer, entry, self.deadline) {
                Ok(_) => {
                    MetricsCollector::global().record(
                        Metric::new(
                            "replication_push",
                            started.elapsed().as_micros() as f64,
                            MetricUnit::Microseconds,
                        )
                        .with_tag("peer", &peer.id),
                    );
                    return;
                }
                Err(_) => {
                    // Transient failure; stop early once the sweep marks
                    // the peer down.
                    if self.health.status(&peer.id) != Some(PeerStatus::Healthy) {
                        return;
                    }
                    std::thread::sleep(PUSH_BACKOFF * 2u32.pow(attempt));
                }
            }
        }
    }

    /// Spawns the shipper thread draining the queue.
    ///
    /// Can be spawned once; a second call gets a thread that exits
    /// immediately.
    pub fn spawn_shipper(self: &Arc<Self>) -> TaskHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let replicator = Arc::clone(self);
        let receiver = self
            .receiver
            .lock()
            .expect("replicator lock poisoned")
            .take();

        let handle = std::thread::spawn(move || {
            let Some(receiver) = receiver else {
                return;
            };
            while !stop_flag.load(Ordering::SeqCst) {
                match receiver.recv_timeout(Duration::from_millis(100)) {
                    Ok(entry) => replicator.ship(&entry),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        TaskHandle::new("replication-shipper", stop, handle)
    }
}
