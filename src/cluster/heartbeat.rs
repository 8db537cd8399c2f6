// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Heartbeat wire types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Periodic liveness message sent to every configured peer.
///
/// `last_id` lets the receiver judge its replication lag without an extra
/// round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    /// Node id of the sender.
    pub sender_id: String,

    /// Wall-clock send time.
    pub sent_at: DateTime<Utc>,

    /// Highest log id on the sender, if it has written anything.
    pub last_id: Option<u64>,
}

impl Heartbeat {
    pub fn new(sender_id: &str, last_id: Option<u64>) -> Self {
        Self {
            sender_id: sender_id.to_string(),
            sent_at: Utc::now(),
            last_id,
        }
    }
}

/// Acknowledgement returned by the receiving node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatAck {
    /// Node id of the receiver.
    pub receiver_id: String,

    /// Highest log id on the receiver.
    pub last_id: Option<u64>,
}
