// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! replikv - replicated key-value store on a segmented write-ahead log.
//!
//! A single static leader accepts mutations, appends them to a durable
//! CRC32-protected log, and ships them asynchronously to followers that
//! replay the same entries to reach the same state.
//!
//! ## Features
//!
//! - **Segmented WAL**: size-based rolling, flush-per-append durability,
//!   torn-tail recovery, corruption-skipping replay
//! - **Versioned Keyspace**: per-key version counters with bounded history
//! - **Idempotent Receiver**: TTL cache making client retries safe
//! - **Compaction**: latest-operation-per-key rewrite with a crash-safe
//!   manifest swap
//! - **Cluster Health**: heartbeat-driven healthy/down classification
//! - **Replication**: push with gap fill and bulk catch-up, keyed by
//!   monotonic log ids
//!
//! ## Quick Start
//!
//! ```no_run
//! use replikv::config::NodeConfig;
//! use replikv::replication::InMemoryHub;
//! use replikv::service::Node;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let config = NodeConfig::leader("leader", "/var/lib/replikv");
//! let node = Node::open(config, Arc::new(InMemoryHub::new()))?;
//! node.start();
//!
//! node.put("greeting", json!("hello"), None, None)?;
//! assert!(node.get("greeting", None).is_some());
//! # Ok::<(), replikv::StoreError>(())
//! ```
//!
//! ## Architecture
//!
//! replikv is organized into modules:
//!
//! - **log**: log entry codec and the segmented write-ahead log
//! - **store**: versioned in-memory keyspace rebuilt by replay
//! - **dedup**: idempotent-receiver deduplication cache
//! - **compact**: inactive-segment compaction with crash-safe swap
//! - **cluster**: peer health table and heartbeat types
//! - **replication**: leader shipper and follower receiver over a
//!   transport seam
//! - **service**: the node facade and its request/response contract
//! - **metrics**: lightweight operation timing
//! - **config**: node configuration with TOML loading
//! - **tasks**: background thread lifecycle

pub mod cluster;
pub mod compact;
pub mod config;
pub mod dedup;
pub mod error;
pub mod log;
pub mod metrics;
pub mod replication;
pub mod service;
pub mod store;
pub mod tasks;

#[cfg(test)]
mod config_test;
#[cfg(test)]
mod error_test;

// Re-export commonly used types
pub use cluster::{HealthTable, Heartbeat, HeartbeatAck, PeerStatus};
pub use compact::{CompactionRun, CompactionStatus, Compactor, RunOutcome};
pub use config::{NodeConfig, NodeRole, PeerConfig};
pub use dedup::{DedupCache, DedupStats};
pub use error::{StoreError, StoreResult};
pub use log::{LogEntry, Operation, SegmentedWal};
pub use metrics::{Metric, MetricUnit, MetricsCollector};
pub use replication::{InMemoryHub, PeerTransport, PushOutcome, ReplicationEndpoint};
pub use service::{Node, PutOutcome, WriteReply};
pub use store::Keyspace;
