// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Tests for node configuration.

#[cfg(test)]
mod tests {
    use crate::config::{NodeConfig, NodeRole, PeerConfig};
    use crate::error::StoreError;
    use std::fs;
    use tempfile::TempDir;

    /// Test defaults match the documented knob values.
    #[test]
    fn test_defaults() {
        let config = NodeConfig::leader("leader", "/tmp/replikv");

        assert_eq!(config.max_segment_size, 1024 * 1024);
        assert_eq!(config.heartbeat_interval_secs, 10);
        assert_eq!(config.heartbeat_timeout_secs, 30);
        assert_eq!(config.dedup_ttl_secs, 3600);
        assert_eq!(config.history_limit, 16);
        assert!(config.compaction.enabled);
        assert_eq!(config.compaction.interval_secs, 3600);
        assert_eq!(config.compaction.min_interval_secs, 600);
        assert!(config.validate().is_ok());
    }

    /// Test a minimal TOML file loads with defaults filled in.
    #[test]
    fn test_from_file_minimal() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("node.toml");
        fs::write(
            &path,
            r#"
node_id = "leader"
role = "leader"
data_dir = "/var/lib/replikv"

[[peers]]
id = "follower-1"
url = "http://f1:7000"
"#,
        )
        .unwrap();

        let config = NodeConfig::from_file(&path).unwrap();
        assert_eq!(config.node_id, "leader");
        assert_eq!(config.role, NodeRole::Leader);
        assert_eq!(config.peers.len(), 1);
        assert_eq!(config.peers[0].id, "follower-1");
        assert_eq!(config.max_segment_size, 1024 * 1024);
    }

    /// Test a follower file naming its leader.
    #[test]
    fn test_from_file_follower() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("node.toml");
        fs::write(
            &path,
            r#"
node_id = "follower-1"
role = "follower"
data_dir = "/var/lib/replikv"
max_segment_size = 4096

[leader]
id = "leader"
url = "http://leader:7000"
"#,
        )
        .unwrap();

        let config = NodeConfig::from_file(&path).unwrap();
        assert_eq!(config.role, NodeRole::Follower);
        assert_eq!(config.leader.as_ref().unwrap().id, "leader");
        assert_eq!(config.max_segment_size, 4096);
    }

    /// Test invalid TOML is a parse error.
    #[test]
    fn test_from_file_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("node.toml");
        fs::write(&path, "node_id = [broken").unwrap();

        assert!(matches!(
            NodeConfig::from_file(&path),
            Err(StoreError::ParseError { .. })
        ));
    }

    /// Test validation rejects inconsistent values.
    #[test]
    fn test_validation() {
        let mut config = NodeConfig::leader("", "/tmp/x");
        assert!(matches!(
            config.validate(),
            Err(StoreError::InvalidConfig { ref field, .. }) if field == "node_id"
        ));

        config.node_id = "leader".to_string();
        config.max_segment_size = 0;
        assert!(config.validate().is_err());

        config.max_segment_size = 1024;
        config.heartbeat_timeout_secs = 1;
        assert!(config.validate().is_err(), "Timeout below one interval");

        // A follower must name its leader.
        let follower = NodeConfig {
            role: NodeRole::Follower,
            leader: None,
            ..NodeConfig::leader("follower-1", "/tmp/x")
        };
        assert!(follower.validate().is_err());

        let follower = NodeConfig::follower(
            "follower-1",
            "/tmp/x",
            PeerConfig {
                id: "leader".to_string(),
                url: "http://leader:7000".to_string(),
            },
        );
        assert!(follower.validate().is_ok());
    }

    /// Test the compaction interval floor is applied.
    #[test]
    fn test_compaction_interval_floor() {
        let mut config = NodeConfig::leader("leader", "/tmp/x");
        config.compaction.interval_secs = 30;
        assert_eq!(
            config.compaction.effective_interval().as_secs(),
            config.compaction.min_interval_secs
        );
    }
}
