// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Tests for the versioned keyspace.

#[cfg(test)]
mod tests {
    use crate::log::types::LogEntry;
    use crate::store::keyspace::{ApplyOutcome, Keyspace};
    use serde_json::json;

    fn set(keyspace: &Keyspace, key: &str, value: &str) -> u64 {
        let version = keyspace.current_version(key).map_or(1, |v| v + 1);
        let entry = LogEntry::set(key, json!(value)).with_version(version);
        match keyspace.apply(&entry) {
            ApplyOutcome::Applied { version } => version,
            other => panic!("Expected Applied, got {:?}", other),
        }
    }

    /// Test versions increment by exactly one per SET.
    #[test]
    fn test_set_increments_version() {
        let keyspace = Keyspace::new(16);

        assert_eq!(set(&keyspace, "config", "a"), 1);
        assert_eq!(set(&keyspace, "config", "b"), 2);
        assert_eq!(set(&keyspace, "config", "c"), 3);
        assert_eq!(keyspace.current_version("config"), Some(3));

        let (value, version) = keyspace.get("config", None).unwrap();
        assert_eq!(value, json!("c"));
        assert_eq!(version, 3);
    }

    /// Test a DELETE removes the key and a later SET restarts at
    /// version 1.
    #[test]
    fn test_delete_resets_version_chain() {
        let keyspace = Keyspace::new(16);
        set(&keyspace, "k", "v1");
        set(&keyspace, "k", "v2");

        assert_eq!(
            keyspace.apply(&LogEntry::delete("k")),
            ApplyOutcome::Deleted
        );
        assert_eq!(keyspace.get("k", None), None);
        assert_eq!(keyspace.current_version("k"), None);

        assert_eq!(set(&keyspace, "k", "fresh"), 1);
    }

    /// Test deleting an absent key reports Missing.
    #[test]
    fn test_delete_missing_key() {
        let keyspace = Keyspace::new(16);
        assert_eq!(
            keyspace.apply(&LogEntry::delete("ghost")),
            ApplyOutcome::Missing
        );
    }

    /// Test historical reads by version.
    #[test]
    fn test_get_historical_version() {
        let keyspace = Keyspace::new(16);
        set(&keyspace, "k", "one");
        set(&keyspace, "k", "two");
        set(&keyspace, "k", "three");

        assert_eq!(keyspace.get("k", Some(1)).unwrap().0, json!("one"));
        assert_eq!(keyspace.get("k", Some(2)).unwrap().0, json!("two"));
        assert_eq!(keyspace.get("k", Some(3)).unwrap().0, json!("three"));
        assert_eq!(keyspace.get("k", Some(4)), None);
    }

    /// Test history and versions listings.
    #[test]
    fn test_history_listing() {
        let keyspace = Keyspace::new(16);
        set(&keyspace, "k", "one");
        set(&keyspace, "k", "two");

        let history = keyspace.history("k").unwrap();
        assert_eq!(history, vec![(1, json!("one")), (2, json!("two"))]);
        assert_eq!(keyspace.versions("k").unwrap(), vec![1, 2]);
        assert_eq!(keyspace.history("missing"), None);
    }

    /// Test the history bound evicts the oldest versions but never the
    /// current one.
    #[test]
    fn test_history_bounded() {
        let keyspace = Keyspace::new(2);
        for i in 1..=5 {
            set(&keyspace, "k", &format!("v{}", i));
        }

        assert_eq!(keyspace.versions("k").unwrap(), vec![3, 4, 5]);
        assert_eq!(keyspace.get("k", Some(1)), None, "Evicted by the bound");
        assert_eq!(keyspace.get("k", Some(4)).unwrap().0, json!("v4"));
        assert_eq!(keyspace.get("k", Some(5)).unwrap().0, json!("v5"));
    }

    /// Test replaying the same entries twice produces the same keyspace.
    #[test]
    fn test_apply_deterministic() {
        let entries = vec![
            LogEntry::set("k1", json!("a")).with_id(1).with_version(1),
            LogEntry::set("k2", json!({"n": 1})).with_id(2).with_version(1),
            LogEntry::set("k1", json!("b")).with_id(3).with_version(2),
            LogEntry::delete("k2").with_id(4),
            LogEntry::set("k3", json!(42)).with_id(5).with_version(1),
        ];

        let build = || {
            let keyspace = Keyspace::new(16);
            for entry in &entries {
                keyspace.apply(entry);
            }
            keyspace
        };

        let first = build();
        let second = build();

        assert_eq!(first.len(), second.len());
        for key in ["k1", "k2", "k3"] {
            assert_eq!(first.get(key, None), second.get(key, None));
            assert_eq!(first.history(key), second.history(key));
        }
        assert_eq!(first.get("k2", None), None);
        assert_eq!(first.get("k1", None).unwrap(), (json!("b"), 2));
    }

    /// Test a SET with a null payload stores null rather than failing.
    #[test]
    fn test_set_null_payload() {
        let keyspace = Keyspace::new(16);
        let entry = LogEntry::set("k", json!(null)).with_version(1);
        assert_eq!(keyspace.apply(&entry), ApplyOutcome::Applied { version: 1 });
        assert_eq!(keyspace.get("k", None).unwrap(), (json!(null), 1));
    }
}
