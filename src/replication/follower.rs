// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Follower-side replication receiver.
//!
//! Entries arrive in pushes from the leader and apply strictly in id
//! order. A push that would leave a gap triggers a range fetch for the
//! missing ids before the pushed entry is accepted; if the fetch fails
//! the push is answered with `Gap` and the follower catches up on its
//! next heartbeat instead.

use crate::config::PeerConfig;
use crate::error::StoreResult;
use crate::log::codec;
use crate::log::types::LogEntry;
use crate::log::wal::SegmentedWal;
use crate::replication::transport::{PeerTransport, PushOutcome};
use crate::store::keyspace::Keyspace;
use std::sync::Arc;
use std::time::Duration;

/// Entries per range-fetch request during bulk catch-up.
const CATCH_UP_CHUNK: u64 = 256;

/// Applies replicated entries on a follower.
pub struct ReplicaReceiver {
    wal: Arc<SegmentedWal>,
    keyspace: Arc<Keyspace>,
    transport: Arc<dyn PeerTransport>,
    leader: PeerConfig,
    deadline: Duration,
    lag_threshold: u64,
}

impl ReplicaReceiver {
    pub fn new(
        wal: Arc<SegmentedWal>,
        keyspace: Arc<Keyspace>,
        transport: Arc<dyn PeerTransport>,
        leader: PeerConfig,
        deadline: Duration,
        lag_threshold: u64,
    ) -> Self {
        Self {
            wal,
            keyspace,
            transport,
            leader,
            deadline,
            lag_threshold,
        }
    }

    /// Handles one pushed entry.
    ///
    /// ## Output
    /// - `Ack`: the entry (and any fetched predecessors) is applied
    /// - `Duplicate`: the id is at or below the local tail; not re-applied
    /// - `Gap`: missing predecessors could not be fetched right now
    ///
    /// ## Error Conditions
    /// - CorruptedLogEntry / ParseError: CRC or shape validation failed
    /// - IoError: local append failed
    pub fn receive_entry(&self, entry: LogEntry) -> StoreResult<PushOutcome> {
        codec::verify(&entry)?;

        let last_id = self.wal.last_id().unwrap_or(0);
        let expected = last_id + 1;

        if entry.id <= last_id {
            return Ok(PushOutcome::Duplicate { last_id });
        }

        if entry.id > expected {
            // Fill the gap before accepting the pushed entry.
            match self
                .transport
                .fetch_range(&self.leader, expected, entry.id - 1, self.deadline)
            {
                Ok(missing) => {
                    for predecessor in missing {
                        self.apply_one(predecessor)?;
                    }
                }
                Err(_) => {
                    return Ok(PushOutcome::Gap {
                        expected_id: expected,
                    });
                }
            }
        }

        self.apply_one(entry)?;
        Ok(PushOutcome::Ack {
            last_id: self.wal.last_id().unwrap_or(0),
        })
    }

    fn apply_one(&self, entry: LogEntry) -> StoreResult<()> {
        codec::verify(&entry)?;
        self.wal.append_replica(entry.clone())?;
        self.keyspace.apply(&entry);
        Ok(())
    }

    /// Whether the observed leader tail is far enough ahead to warrant a
    /// bulk fetch.
    pub fn is_lagging(&self, leader_last_id: u64) -> bool {
        let local = self.wal.last_id().unwrap_or(0);
        leader_last_id > local && leader_last_id - local > self.lag_threshold
    }

    /// Pulls everything up to the leader's tail in bounded chunks.
    /// Invoked from the heartbeat task when the lag threshold is crossed.
    ///
    /// ## Output
    /// - `Ok(applied)`: number of entries fetched and applied
    pub fn sync_with_leader(&self, leader_last_id: u64) -> StoreResult<usize> {
        let mut applied = 0;

        loop {
            let local = self.wal.last_id().unwrap_or(0);
            if local >= leader_last_id {
                return Ok(applied);
            }

            let from = local + 1;
            let to = leader_last_id.min(local + CATCH_UP_CHUNK);
            let entries = self
                .transport
                .fetch_range(&self.leader, from, to, self.deadline)?;
            if entries.is_empty() {
                return Ok(applied);
            }
            for entry in entries {
                self.apply_one(entry)?;
                applied += 1;
            }
        }
    }

    /// The leader this follower replicates from.
    pub fn leader(&self) -> &PeerConfig {
        &self.leader
    }
}
