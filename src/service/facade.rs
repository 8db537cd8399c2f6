// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Node facade.
//!
//! Owns the storage and replication components, routes requests through
//! them, and manages the background tasks. The facade holds no state of
//! its own beyond the write gate: a mutation is check-version, append,
//! apply under one lock so concurrent writers always observe a
//! consistent version counter. Reads go straight to the keyspace.

use crate::cluster::health::HealthTable;
use crate::cluster::heartbeat::{Heartbeat, HeartbeatAck};
use crate::compact::compactor::{Compactor, RunOutcome};
use crate::compact::CompactionStatus;
use crate::config::{NodeConfig, NodeRole, PeerConfig};
use crate::dedup::cache::{DedupCache, DedupLookup, DedupStats};
use crate::error::{StoreError, StoreResult};
use crate::log::codec;
use crate::log::types::{LogEntry, Operation};
use crate::log::wal::SegmentedWal;
use crate::replication::follower::ReplicaReceiver;
use crate::replication::leader::Replicator;
use crate::replication::transport::{PeerTransport, PushOutcome, ReplicationEndpoint};
use crate::service::types::*;
use crate::store::keyspace::Keyspace;
use crate::tasks::{spawn_periodic, TaskHandle};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// One replicated key-value node: storage engine, replication role and
/// background tasks behind a stable request surface.
pub struct Node {
    config: NodeConfig,
    wal: Arc<SegmentedWal>,
    keyspace: Arc<Keyspace>,
    dedup: Arc<DedupCache<WriteReply>>,
    health: Arc<HealthTable>,
    compactor: Arc<Compactor>,
    replicator: Option<Arc<Replicator>>,
    receiver: Option<Arc<ReplicaReceiver>>,
    transport: Arc<dyn PeerTransport>,
    write_gate: Mutex<()>,
    tasks: Mutex<Vec<TaskHandle>>,
}

impl Node {
    /// Opens the node: recovers the WAL, rebuilds the keyspace from a
    /// full replay, and wires the components for the configured role.
    /// Background tasks are not started until [`Node::start`].
    pub fn open(config: NodeConfig, transport: Arc<dyn PeerTransport>) -> StoreResult<Self> {
        config.validate()?;

        let wal = Arc::new(SegmentedWal::open(&config.data_dir, config.max_segment_size)?);

        let keyspace = Arc::new(Keyspace::new(config.history_limit));
        for entry in wal.replay() {
            keyspace.apply(&entry);
        }
        let recovery = wal.recovery_report();
        if recovery.skipped > 0 {
            eprintln!(
                "Warning: node {} skipped {} corrupt records during replay",
                config.node_id, recovery.skipped
            );
        }

        let health = Arc::new(HealthTable::new(
            &all_peers(&config),
            config.heartbeat_timeout(),
        ));
        let dedup = Arc::new(DedupCache::new(config.dedup_ttl()));
        let compactor = Arc::new(Compactor::new(Arc::clone(&wal), config.compaction.clone()));

        let replicator = match config.role {
            NodeRole::Leader => Some(Arc::new(Replicator::new(
                Arc::clone(&transport),
                Arc::clone(&health),
                config.peers.clone(),
                config.transport_deadline(),
            ))),
            NodeRole::Follower => None,
        };
        let receiver = match config.role {
            NodeRole::Follower => {
                let leader = config.leader.clone().expect("validated follower config");
                Some(Arc::new(ReplicaReceiver::new(
                    Arc::clone(&wal),
                    Arc::clone(&keyspace),
                    Arc::clone(&transport),
                    leader,
                    config.transport_deadline(),
                    config.replication_lag_threshold,
                )))
            }
            NodeRole::Leader => None,
        };

        Ok(Self {
            config,
            wal,
            keyspace,
            dedup,
            health,
            compactor,
            replicator,
            receiver,
            transport,
            write_gate: Mutex::new(()),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Spawns the background tasks: heartbeat emitter, health sweeper,
    /// dedup sweeper, compaction scheduler, and on the leader the
    /// replication shipper.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock().expect("task list poisoned");
        if !tasks.is_empty() {
            return;
        }

        {
            let transport = Arc::clone(&self.transport);
            let wal = Arc::clone(&self.wal);
            let receiver = self.receiver.clone();
            let peers = all_peers(&self.config);
            let node_id = self.config.node_id.clone();
            let deadline = self.config.transport_deadline();
            tasks.push(spawn_periodic(
                "heartbeat-emitter",
                self.config.heartbeat_interval(),
                move || {
                    let heartbeat = Heartbeat::new(&node_id, wal.last_id());
                    for peer in &peers {
                        let ack = match transport.send_heartbeat(peer, &heartbeat, deadline) {
                            Ok(ack) => ack,
                            Err(_) => continue,
                        };
                        // Bulk catch-up once the leader's tail is far
                        // enough ahead.
                        if let (Some(receiver), Some(leader_last)) = (&receiver, ack.last_id) {
                            if receiver.leader().id == peer.id && receiver.is_lagging(leader_last)
                            {
                                if let Err(e) = receiver.sync_with_leader(leader_last) {
                                    eprintln!("Warning: catch-up from {} failed: {}", peer.id, e);
                                }
                            }
                        }
                    }
                },
            ));
        }

        {
            let health = Arc::clone(&self.health);
            tasks.push(spawn_periodic(
                "health-sweeper",
                self.config.heartbeat_interval(),
                move || {
                    health.sweep(Instant::now());
                },
            ));
        }

        {
            let dedup = Arc::clone(&self.dedup);
            tasks.push(spawn_periodic(
                "dedup-sweeper",
                self.config.dedup_sweep_interval(),
                move || {
                    dedup.sweep(Instant::now());
                },
            ));
        }

        {
            let compactor = Arc::clone(&self.compactor);
            tasks.push(spawn_periodic(
                "compaction-scheduler",
                std::time::Duration::from_secs(1),
                move || {
                    if let Err(e) = compactor.maybe_run_scheduled() {
                        eprintln!("Warning: scheduled compaction failed: {}", e);
                    }
                },
            ));
        }

        if let Some(replicator) = &self.replicator {
            tasks.push(replicator.spawn_shipper());
        }
    }

    /// Stops and joins every background task.
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock().expect("task list poisoned");
        for task in tasks.drain(..) {
            task.stop();
        }
    }

    /// Stores a value under a key.
    ///
    /// ## Input
    /// - `expected_version`: optimistic check; mismatch yields
    ///   `VersionConflict` and nothing is appended
    /// - `client`: `(client_id, request_id)` for idempotent retries
    ///
    /// ## Error Conditions
    /// - NotLeader: mutation sent to a follower
    /// - ParseError: empty key
    /// - IoError: the append failed; nothing was acknowledged
    pub fn put(
        &self,
        key: &str,
        value: Value,
        expected_version: Option<u64>,
        client: Option<(&str, &str)>,
    ) -> StoreResult<PutOutcome> {
        self.require_leader("put")?;
        require_key(key)?;

        if let Some((client_id, request_id)) = client {
            if let DedupLookup::Hit(reply) = self.dedup.lookup(client_id, request_id, Operation::Set)
            {
                return Ok(PutOutcome::Written(reply));
            }
        }

        let sealed = {
            let _gate = self.write_gate.lock().expect("write gate poisoned");

            let current = self.keyspace.current_version(key);
            if let Some(expected) = expected_version {
                if current != Some(expected) {
                    return Ok(PutOutcome::VersionConflict {
                        current_version: current.unwrap_or(0),
                    });
                }
            }

            let version = current.map_or(1, |v| v + 1);
            let mut entry = LogEntry::set(key, value).with_version(version);
            if let Some((client_id, request_id)) = client {
                entry = entry.with_client(client_id, request_id);
            }

            let id = self.wal.append(entry.clone())?;
            let sealed = codec::seal(entry.with_id(id));
            self.keyspace.apply(&sealed);
            sealed
        };

        let reply = WriteReply {
            status: "ok".to_string(),
            id: sealed.id,
            key: Some(key.to_string()),
            version: sealed.version,
        };

        if let Some((client_id, request_id)) = client {
            self.dedup
                .record(client_id, request_id, Operation::Set, reply.clone());
        }
        if let Some(replicator) = &self.replicator {
            replicator.enqueue(sealed);
        }

        Ok(PutOutcome::Written(reply))
    }

    /// Removes a key. A later PUT starts a fresh version chain at 1.
    pub fn delete(
        &self,
        key: &str,
        client: Option<(&str, &str)>,
    ) -> StoreResult<DeleteOutcome> {
        self.require_leader("delete")?;
        require_key(key)?;

        if let Some((client_id, request_id)) = client {
            if let DedupLookup::Hit(reply) =
                self.dedup.lookup(client_id, request_id, Operation::Delete)
            {
                return Ok(DeleteOutcome::Deleted(reply));
            }
        }

        let sealed = {
            let _gate = self.write_gate.lock().expect("write gate poisoned");

            if self.keyspace.current_version(key).is_none() {
                return Ok(DeleteOutcome::NotFound);
            }

            let mut entry = LogEntry::delete(key);
            if let Some((client_id, request_id)) = client {
                entry = entry.with_client(client_id, request_id);
            }

            let id = self.wal.append(entry.clone())?;
            let sealed = codec::seal(entry.with_id(id));
            self.keyspace.apply(&sealed);
            sealed
        };

        let reply = WriteReply {
            status: "ok".to_string(),
            id: sealed.id,
            key: None,
            version: None,
        };

        if let Some((client_id, request_id)) = client {
            self.dedup
                .record(client_id, request_id, Operation::Delete, reply.clone());
        }
        if let Some(replicator) = &self.replicator {
            replicator.enqueue(sealed);
        }

        Ok(DeleteOutcome::Deleted(reply))
    }

    /// Reads the current value, or a retained historical version.
    pub fn get(&self, key: &str, version: Option<u64>) -> Option<ValueReply> {
        self.keyspace
            .get(key, version)
            .map(|(value, version)| ValueReply {
                key: key.to_string(),
                value,
                version,
            })
    }

    /// Retained history of a key.
    pub fn history(&self, key: &str) -> Option<HistoryReply> {
        let history = self.keyspace.history(key)?;
        Some(HistoryReply {
            key: key.to_string(),
            versions: history.iter().map(|(v, _)| *v).collect(),
            history: history
                .into_iter()
                .map(|(version, value)| HistoryVersion { version, value })
                .collect(),
        })
    }

    /// Retained version numbers of a key.
    pub fn versions(&self, key: &str) -> Option<VersionsReply> {
        let versions = self.keyspace.versions(key)?;
        let latest_version = *versions.last().expect("history never empty");
        Some(VersionsReply {
            key: key.to_string(),
            versions,
            latest_version,
        })
    }

    /// Segment listing.
    pub fn segments(&self) -> SegmentsReply {
        let segments: Vec<SegmentInfo> = self
            .wal
            .segments()
            .into_iter()
            .map(|meta| SegmentInfo {
                path: meta.path.display().to_string(),
                size: meta.size_bytes,
                is_active: meta.is_active,
            })
            .collect();

        SegmentsReply {
            total_segments: segments.len(),
            segments,
            max_segment_size: self.wal.max_segment_size(),
        }
    }

    /// Idempotent-receiver counters.
    pub fn dedup_stats(&self) -> DedupStats {
        self.dedup.stats()
    }

    /// Cluster health as seen by this node.
    pub fn cluster_status(&self) -> ClusterStatusReply {
        let leader_id = self.config.leader.as_ref().map(|peer| peer.id.clone());
        let mut leader = None;
        let mut peers = Vec::new();

        for (id, record) in self.health.snapshot() {
            let info = PeerStatusInfo {
                id: id.clone(),
                url: record.url.clone(),
                status: record.status,
                last_heartbeat: record.last_heartbeat_at.map(|at| at.to_rfc3339()),
                seconds_since_last_heartbeat: record
                    .last_heartbeat
                    .map(|at| at.elapsed().as_secs()),
            };
            if Some(&id) == leader_id.as_ref() {
                leader = Some(info);
            } else {
                peers.push(info);
            }
        }

        ClusterStatusReply {
            node_id: self.config.node_id.clone(),
            role: self.config.role,
            leader,
            peers,
        }
    }

    /// Triggers a compaction pass now.
    pub fn run_compaction(&self) -> StoreResult<CompactionRunReply> {
        match self.compactor.run()? {
            RunOutcome::Completed(run) => Ok(CompactionRunReply {
                status: "ok".to_string(),
                segments_compacted: run.segments_compacted,
                entries_removed: run.entries_removed,
            }),
            RunOutcome::Busy => Ok(CompactionRunReply {
                status: "busy".to_string(),
                segments_compacted: 0,
                entries_removed: 0,
            }),
        }
    }

    /// Compaction configuration and run history.
    pub fn compaction_status(&self) -> CompactionStatus {
        self.compactor.status()
    }

    /// Reconfigures the compaction scheduler.
    pub fn configure_compaction(
        &self,
        enabled: Option<bool>,
        interval_secs: Option<u64>,
    ) -> ConfigureReply {
        ConfigureReply {
            status: "ok".to_string(),
            changes: self.compactor.configure(enabled, interval_secs),
        }
    }

    /// Highest log id on this node.
    pub fn last_id(&self) -> Option<u64> {
        self.wal.last_id()
    }

    pub fn node_id(&self) -> &str {
        &self.config.node_id
    }

    pub fn role(&self) -> NodeRole {
        self.config.role
    }

    fn require_leader(&self, operation: &str) -> StoreResult<()> {
        if self.config.role != NodeRole::Leader {
            return Err(StoreError::NotLeader {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }
}

impl ReplicationEndpoint for Node {
    /// Accepts one replicated entry from the leader.
    fn handle_push(&self, entry: LogEntry) -> StoreResult<PushOutcome> {
        match &self.receiver {
            Some(receiver) => receiver.receive_entry(entry),
            None => Err(StoreError::NotFollower {
                operation: "replication_push".to_string(),
            }),
        }
    }

    /// Serves a contiguous entry range for follower catch-up.
    fn handle_range(&self, from_id: u64, to_id: u64) -> StoreResult<Vec<LogEntry>> {
        if self.config.role != NodeRole::Leader {
            return Err(StoreError::NotLeader {
                operation: "replication_range".to_string(),
            });
        }
        self.wal.range(from_id, to_id)
    }

    /// Accepts a heartbeat from any configured peer.
    fn handle_heartbeat(&self, heartbeat: Heartbeat) -> StoreResult<HeartbeatAck> {
        self.health
            .record_heartbeat(&heartbeat.sender_id, Instant::now());
        Ok(HeartbeatAck {
            receiver_id: self.config.node_id.clone(),
            last_id: self.wal.last_id(),
        })
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Everyone this node exchanges heartbeats with: the configured peers
/// plus, on a follower, its leader.
fn all_peers(config: &NodeConfig) -> Vec<PeerConfig> {
    let mut peers = config.peers.clone();
    if let Some(leader) = &config.leader {
        if peers.iter().all(|peer| peer.id != leader.id) {
            peers.push(leader.clone());
        }
    }
    peers
}

fn require_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::ParseError {
            reason: "empty key".to_string(),
        });
    }
    Ok(())
}
