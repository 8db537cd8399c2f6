// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Type definitions for the write-ahead log.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mutation kind carried by a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "SET")]
    Set,
    #[serde(rename = "DELETE")]
    Delete,
}

impl Operation {
    /// Wire spelling, as written into segment files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Set => "SET",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single record of the write-ahead log.
///
/// Entries are created once, appended by exactly one writer per node, and
/// never mutated afterwards. `id` is assigned by the leader and is strictly
/// increasing across the whole log. `crc` covers the canonical
/// serialisation of all other fields (see [`crate::log::codec`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonic log id, dense per node.
    pub id: u64,

    /// SET or DELETE.
    pub operation: Operation,

    /// Non-empty UTF-8 key.
    pub key: String,

    /// Payload for SET; absent for DELETE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// Per-key version stamped at SET time by the leader.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,

    /// Client identifier for idempotent retries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Request identifier for idempotent retries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// CRC32 (IEEE) of the canonical field serialisation.
    pub crc: u32,
}

impl LogEntry {
    /// Creates an unsealed SET entry. The id, version and CRC are stamped
    /// by the WAL on append.
    pub fn set(key: &str, value: Value) -> Self {
        Self {
            id: 0,
            operation: Operation::Set,
            key: key.to_string(),
            value: Some(value),
            version: None,
            client_id: None,
            request_id: None,
            crc: 0,
        }
    }

    /// Creates an unsealed DELETE entry.
    pub fn delete(key: &str) -> Self {
        Self {
            id: 0,
            operation: Operation::Delete,
            key: key.to_string(),
            value: None,
            version: None,
            client_id: None,
            request_id: None,
            crc: 0,
        }
    }

    /// Attaches client/request identifiers.
    pub fn with_client(mut self, client_id: &str, request_id: &str) -> Self {
        self.client_id = Some(client_id.to_string());
        self.request_id = Some(request_id.to_string());
        self
    }

    /// Fixes the log id (replica path).
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    /// Fixes the per-key version (SET path).
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }
}

/// Outcome counters from a full log replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Valid entries yielded.
    pub entries: usize,

    /// Invalid records skipped (malformed or CRC mismatch).
    pub skipped: usize,
}
