// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Compaction integration tests.
//!
//! Drives compaction through the facade and verifies the keyspace is
//! indistinguishable before and after, across restarts included.

mod test_utils;

use replikv::config::NodeConfig;
use replikv::replication::{InMemoryHub, PeerTransport};
use replikv::service::Node;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use test_utils::*;

/// One entry per segment, so every write seals the previous one.
fn tiny_segment_leader(temp_dir: &TempDir) -> Node {
    let mut config = NodeConfig::leader(LEADER_ID, temp_dir.path());
    config.max_segment_size = 1;
    Node::open(
        config,
        Arc::new(InMemoryHub::new()) as Arc<dyn PeerTransport>,
    )
    .unwrap()
}

#[test]
fn test_compaction_drops_superseded_and_tombstones() {
    let temp_dir = TempDir::new().unwrap();
    let node = tiny_segment_leader(&temp_dir);

    written(node.put("k1", json!("a"), None, None).unwrap()); // id 1
    written(node.put("k2", json!("hello"), None, None).unwrap()); // id 2
    written(node.put("k1", json!("b"), None, None).unwrap()); // id 3
    node.delete("k2", None).unwrap(); // id 4
    written(node.put("k3", json!("n"), None, None).unwrap()); // id 5
    written(node.put("k1", json!("c"), None, None).unwrap()); // id 6, active

    let reply = node.run_compaction().unwrap();
    assert_eq!(reply.status, "ok");
    assert_eq!(reply.segments_compacted, 5);
    assert_eq!(reply.entries_removed, 4);

    let segments = node.segments();
    assert_eq!(segments.total_segments, 2);

    assert_eq!(node.get("k1", None).unwrap().value, json!("c"));
    assert_eq!(node.get("k1", None).unwrap().version, 3);
    assert!(node.get("k2", None).is_none());
    assert_eq!(node.get("k3", None).unwrap().value, json!("n"));
}

#[test]
fn test_keyspace_identical_after_compaction_and_restart() {
    let temp_dir = TempDir::new().unwrap();

    let expectations = {
        let node = tiny_segment_leader(&temp_dir);
        for i in 0..30 {
            written(
                node.put(&format!("key{}", i % 6), json!(i), None, None)
                    .unwrap(),
            );
        }
        node.delete("key5", None).unwrap();

        let before: Vec<_> = (0..6)
            .map(|i| node.get(&format!("key{}", i), None))
            .collect();

        let reply = node.run_compaction().unwrap();
        assert!(reply.entries_removed > 0);

        let after: Vec<_> = (0..6)
            .map(|i| node.get(&format!("key{}", i), None))
            .collect();
        assert_eq!(before, after, "Compaction changes nothing observable");
        after
    };

    // Restart replays the compacted segments.
    let node = tiny_segment_leader(&temp_dir);
    let replayed: Vec<_> = (0..6)
        .map(|i| node.get(&format!("key{}", i), None))
        .collect();
    assert_eq!(replayed, expectations);
    assert_eq!(node.last_id(), Some(31));
}

#[test]
fn test_repeated_compaction_converges() {
    let temp_dir = TempDir::new().unwrap();
    let node = tiny_segment_leader(&temp_dir);

    for i in 0..10 {
        written(node.put("only", json!(i), None, None).unwrap());
    }

    let first = node.run_compaction().unwrap();
    assert_eq!(first.entries_removed, 9, "Only the active entry's key survives");

    // Everything left is either compacted or active; a second pass finds
    // nothing more to remove.
    let second = node.run_compaction().unwrap();
    assert_eq!(second.entries_removed, 0);

    assert_eq!(node.get("only", None).unwrap().value, json!(9));
    assert_eq!(node.get("only", None).unwrap().version, 10);
}

#[test]
fn test_compaction_status_and_configuration() {
    let temp_dir = TempDir::new().unwrap();
    let node = tiny_segment_leader(&temp_dir);

    for i in 0..5 {
        written(node.put("k", json!(i), None, None).unwrap());
    }

    assert!(node.compaction_status().history.is_empty());
    node.run_compaction().unwrap();

    let status = node.compaction_status();
    assert_eq!(status.history.len(), 1);
    assert!(!status.running);
    assert_eq!(status.history[0].segments_compacted, 4);

    let reply = node.configure_compaction(Some(false), Some(1200));
    assert_eq!(reply.status, "ok");
    assert_eq!(reply.changes.len(), 2);

    let status = node.compaction_status();
    assert!(!status.enabled);
    assert_eq!(status.interval_secs, 1200);
}
