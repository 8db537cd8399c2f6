// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Request/response contract exposed to the external transport.
//!
//! These are the only shapes the HTTP (or any other) binding sees;
//! everything internal stays behind the facade.

use crate::cluster::health::PeerStatus;
use crate::config::NodeRole;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reply to a successful mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteReply {
    pub status: String,

    /// Log id the mutation was appended under.
    pub id: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

/// Outcome of a PUT.
#[derive(Debug, Clone, PartialEq)]
pub enum PutOutcome {
    Written(WriteReply),

    /// The supplied expected version did not match; nothing was appended.
    VersionConflict { current_version: u64 },
}

/// Outcome of a DELETE.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    Deleted(WriteReply),
    NotFound,
}

/// Reply to a GET.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueReply {
    pub key: String,
    pub value: Value,
    pub version: u64,
}

/// One retained version in a history listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryVersion {
    pub version: u64,
    pub value: Value,
}

/// Reply to a history request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryReply {
    pub key: String,
    pub versions: Vec<u64>,
    pub history: Vec<HistoryVersion>,
}

/// Reply to a versions request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionsReply {
    pub key: String,
    pub versions: Vec<u64>,
    pub latest_version: u64,
}

/// One segment in the listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentInfo {
    pub path: String,
    pub size: u64,
    pub is_active: bool,
}

/// Reply to a segments request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentsReply {
    pub segments: Vec<SegmentInfo>,
    pub total_segments: usize,
    pub max_segment_size: u64,
}

/// Health line for one peer on the status surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerStatusInfo {
    pub id: String,
    pub url: String,
    pub status: PeerStatus,

    /// RFC 3339 time of the last heartbeat received, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds_since_last_heartbeat: Option<u64>,
}

/// Reply to a cluster status request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterStatusReply {
    pub node_id: String,
    pub role: NodeRole,

    /// The leader as seen from a follower; absent on the leader itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader: Option<PeerStatusInfo>,

    pub peers: Vec<PeerStatusInfo>,
}

/// Reply to a manual compaction trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompactionRunReply {
    pub status: String,
    pub segments_compacted: usize,
    pub entries_removed: usize,
}

/// Reply to a compaction configuration change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigureReply {
    pub status: String,
    pub changes: Vec<String>,
}
