// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Node configuration.
//!
//! All tunables are carried in [`NodeConfig`] and handed to component
//! constructors explicitly. Configuration is loaded from a TOML file or
//! built in code; every field has a serde default matching the documented
//! default, so a minimal file only needs `node_id`, `role` and `data_dir`.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Role a node plays in the cluster. The leader is static; there is no
/// election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Leader,
    Follower,
}

/// A configured peer (follower from the leader's point of view, or the
/// leader from a follower's).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Stable peer identifier used in heartbeats and the health table.
    pub id: String,

    /// Transport address of the peer.
    pub url: String,
}

/// Compaction tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionSettings {
    /// Whether the background scheduler runs at all. Manual runs are
    /// always allowed.
    #[serde(default = "default_compaction_enabled")]
    pub enabled: bool,

    /// Scheduler cadence in seconds.
    #[serde(default = "default_compaction_interval")]
    pub interval_secs: u64,

    /// Floor for the cadence; shorter configured intervals are clamped up.
    #[serde(default = "default_min_compaction_interval")]
    pub min_interval_secs: u64,
}

impl Default for CompactionSettings {
    fn default() -> Self {
        Self {
            enabled: default_compaction_enabled(),
            interval_secs: default_compaction_interval(),
            min_interval_secs: default_min_compaction_interval(),
        }
    }
}

impl CompactionSettings {
    /// Effective scheduler interval with the floor applied.
    pub fn effective_interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(self.min_interval_secs))
    }
}

/// Full node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Stable identifier of this node.
    pub node_id: String,

    /// Leader or follower.
    pub role: NodeRole,

    /// Directory holding the WAL segments, lock file and swap manifest.
    pub data_dir: PathBuf,

    /// The leader peer. Required on followers, ignored on the leader.
    #[serde(default)]
    pub leader: Option<PeerConfig>,

    /// All other nodes this one talks to.
    #[serde(default)]
    pub peers: Vec<PeerConfig>,

    /// Segment roll threshold in bytes.
    #[serde(default = "default_max_segment_size")]
    pub max_segment_size: u64,

    /// Heartbeat emit cadence in seconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Age after which a silent peer is classified down.
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_secs: u64,

    /// Idempotent-receiver record lifetime.
    #[serde(default = "default_dedup_ttl")]
    pub dedup_ttl_secs: u64,

    /// Cadence of the dedup eviction sweep.
    #[serde(default = "default_dedup_sweep_interval")]
    pub dedup_sweep_interval_secs: u64,

    /// Prior versions retained per key.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Entry lag beyond which a follower bulk-fetches instead of waiting
    /// for individual pushes.
    #[serde(default = "default_lag_threshold")]
    pub replication_lag_threshold: u64,

    /// Deadline for outbound transport calls in milliseconds.
    #[serde(default = "default_transport_deadline")]
    pub transport_deadline_ms: u64,

    #[serde(default)]
    pub compaction: CompactionSettings,
}

fn default_max_segment_size() -> u64 {
    1024 * 1024
}

fn default_heartbeat_interval() -> u64 {
    10
}

fn default_heartbeat_timeout() -> u64 {
    30
}

fn default_dedup_ttl() -> u64 {
    3600
}

fn default_dedup_sweep_interval() -> u64 {
    60
}

fn default_history_limit() -> usize {
    16
}

fn default_lag_threshold() -> u64 {
    64
}

fn default_transport_deadline() -> u64 {
    2000
}

fn default_compaction_enabled() -> bool {
    true
}

fn default_compaction_interval() -> u64 {
    3600
}

fn default_min_compaction_interval() -> u64 {
    600
}

impl NodeConfig {
    /// Creates a leader configuration with all defaults.
    pub fn leader<P: Into<PathBuf>>(node_id: &str, data_dir: P) -> Self {
        Self::new(node_id, NodeRole::Leader, data_dir)
    }

    /// Creates a follower configuration with all defaults and the given
    /// leader address.
    pub fn follower<P: Into<PathBuf>>(node_id: &str, data_dir: P, leader: PeerConfig) -> Self {
        let mut config = Self::new(node_id, NodeRole::Follower, data_dir);
        config.leader = Some(leader);
        config
    }

    fn new<P: Into<PathBuf>>(node_id: &str, role: NodeRole, data_dir: P) -> Self {
        Self {
            node_id: node_id.to_string(),
            role,
            data_dir: data_dir.into(),
            leader: None,
            peers: Vec::new(),
            max_segment_size: default_max_segment_size(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            heartbeat_timeout_secs: default_heartbeat_timeout(),
            dedup_ttl_secs: default_dedup_ttl(),
            dedup_sweep_interval_secs: default_dedup_sweep_interval(),
            history_limit: default_history_limit(),
            replication_lag_threshold: default_lag_threshold(),
            transport_deadline_ms: default_transport_deadline(),
            compaction: CompactionSettings::default(),
        }
    }

    /// Loads and validates a configuration from a TOML file.
    ///
    /// ## Error Conditions
    /// - IoError: file unreadable
    /// - ParseError: invalid TOML
    /// - InvalidConfig: validation failure
    pub fn from_file(path: &Path) -> StoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| StoreError::IoError {
            operation: format!("read_config: {}", path.display()),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| StoreError::ParseError {
            reason: format!("invalid config TOML: {}", e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field constraints.
    pub fn validate(&self) -> StoreResult<()> {
        if self.node_id.is_empty() {
            return Err(StoreError::InvalidConfig {
                field: "node_id".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.max_segment_size == 0 {
            return Err(StoreError::InvalidConfig {
                field: "max_segment_size".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(StoreError::InvalidConfig {
                field: "heartbeat_interval_secs".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.heartbeat_timeout_secs < self.heartbeat_interval_secs {
            return Err(StoreError::InvalidConfig {
                field: "heartbeat_timeout_secs".to_string(),
                reason: "must be at least one heartbeat interval".to_string(),
            });
        }
        if self.role == NodeRole::Follower && self.leader.is_none() {
            return Err(StoreError::InvalidConfig {
                field: "leader".to_string(),
                reason: "followers must name their leader".to_string(),
            });
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_ttl_secs)
    }

    pub fn dedup_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.dedup_sweep_interval_secs)
    }

    pub fn transport_deadline(&self) -> Duration {
        Duration::from_millis(self.transport_deadline_ms)
    }
}
