// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Shared helpers for integration tests.

// Not every test target uses every helper.
#![allow(dead_code)]

use replikv::config::{NodeConfig, PeerConfig};
use replikv::replication::{InMemoryHub, PeerTransport, ReplicationEndpoint};
use replikv::service::types::{PutOutcome, WriteReply};
use replikv::service::Node;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const LEADER_ID: &str = "leader";
pub const FOLLOWER_ID: &str = "follower-1";

pub fn leader_peer() -> PeerConfig {
    PeerConfig {
        id: LEADER_ID.to_string(),
        url: "mem://leader".to_string(),
    }
}

pub fn follower_peer() -> PeerConfig {
    PeerConfig {
        id: FOLLOWER_ID.to_string(),
        url: "mem://follower-1".to_string(),
    }
}

/// Leader configuration with test-friendly intervals.
pub fn leader_config(data_dir: &Path) -> NodeConfig {
    let mut config = NodeConfig::leader(LEADER_ID, data_dir);
    config.peers = vec![follower_peer()];
    config.heartbeat_interval_secs = 1;
    config.heartbeat_timeout_secs = 3;
    config
}

/// Follower configuration with test-friendly intervals and an eager lag
/// threshold.
pub fn follower_config(data_dir: &Path) -> NodeConfig {
    let mut config = NodeConfig::follower(FOLLOWER_ID, data_dir, leader_peer());
    config.heartbeat_interval_secs = 1;
    config.heartbeat_timeout_secs = 3;
    config.replication_lag_threshold = 2;
    config
}

/// Opens a leader/follower pair wired through one in-memory hub.
pub fn create_cluster(
    leader_dir: &Path,
    follower_dir: &Path,
) -> (Arc<InMemoryHub>, Arc<Node>, Arc<Node>) {
    let hub = Arc::new(InMemoryHub::new());

    let leader = Arc::new(
        Node::open(
            leader_config(leader_dir),
            Arc::clone(&hub) as Arc<dyn PeerTransport>,
        )
        .expect("open leader"),
    );
    let follower = Arc::new(
        Node::open(
            follower_config(follower_dir),
            Arc::clone(&hub) as Arc<dyn PeerTransport>,
        )
        .expect("open follower"),
    );

    hub.register(LEADER_ID, Arc::clone(&leader) as Arc<dyn ReplicationEndpoint>);
    hub.register(
        FOLLOWER_ID,
        Arc::clone(&follower) as Arc<dyn ReplicationEndpoint>,
    );

    (hub, leader, follower)
}

/// Unwraps a successful PUT.
pub fn written(outcome: PutOutcome) -> WriteReply {
    match outcome {
        PutOutcome::Written(reply) => reply,
        other => panic!("Expected Written, got {:?}", other),
    }
}

/// Polls until `condition` holds or the timeout expires.
pub fn wait_for<F: Fn() -> bool>(what: &str, timeout: Duration, condition: F) {
    let deadline = Instant::now() + timeout;
    while !condition() {
        assert!(Instant::now() < deadline, "Timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(20));
    }
}
