// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Tests for the idempotent-receiver cache.

#[cfg(test)]
mod tests {
    use crate::dedup::cache::{DedupCache, DedupLookup};
    use crate::log::types::Operation;
    use std::time::{Duration, Instant};

    fn cache() -> DedupCache<String> {
        DedupCache::new(Duration::from_secs(3600))
    }

    /// Test a repeated request returns the stored reply.
    #[test]
    fn test_hit_returns_cached_reply() {
        let cache = cache();
        assert_eq!(cache.lookup("c1", "r1", Operation::Set), DedupLookup::Miss);

        cache.record("c1", "r1", Operation::Set, "reply-1".to_string());

        match cache.lookup("c1", "r1", Operation::Set) {
            DedupLookup::Hit(reply) => assert_eq!(reply, "reply-1"),
            other => panic!("Expected Hit, got {:?}", other),
        }
    }

    /// Test the same pair with a different operation is processed, not
    /// replayed.
    #[test]
    fn test_different_operation_is_new() {
        let cache = cache();
        cache.record("c1", "r1", Operation::Set, "set-reply".to_string());

        assert_eq!(
            cache.lookup("c1", "r1", Operation::Delete),
            DedupLookup::NewOperation
        );

        cache.record("c1", "r1", Operation::Delete, "delete-reply".to_string());
        match cache.lookup("c1", "r1", Operation::Delete) {
            DedupLookup::Hit(reply) => assert_eq!(reply, "delete-reply"),
            other => panic!("Expected Hit, got {:?}", other),
        }
    }

    /// Test sweep evicts expired records and counts itself.
    #[test]
    fn test_sweep_evicts_expired() {
        let cache = DedupCache::new(Duration::from_millis(10));
        cache.record("c1", "r1", Operation::Set, "x".to_string());
        cache.record("c2", "r2", Operation::Set, "y".to_string());

        std::thread::sleep(Duration::from_millis(30));
        let evicted = cache.sweep(Instant::now());
        assert_eq!(evicted, 2);
        assert_eq!(cache.lookup("c1", "r1", Operation::Set), DedupLookup::Miss);

        let stats = cache.stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.sweeps, 1);
    }

    /// Test counters split same-op and different-op duplicates.
    #[test]
    fn test_stats_counters() {
        let cache = cache();
        cache.record("c1", "r1", Operation::Set, "a".to_string());
        cache.record("c1", "r2", Operation::Set, "b".to_string());
        cache.record("c2", "r1", Operation::Set, "c".to_string());

        cache.lookup("c1", "r1", Operation::Set); // same-op duplicate
        cache.lookup("c1", "r1", Operation::Set); // same-op duplicate
        cache.lookup("c1", "r1", Operation::Delete); // different-op
        cache.lookup("c9", "r9", Operation::Set); // miss

        let stats = cache.stats();
        assert_eq!(stats.size, 3);
        assert_eq!(stats.distinct_clients, 2);
        assert_eq!(stats.distinct_request_ids, 2);
        assert_eq!(stats.recorded_total, 3);
        assert_eq!(stats.duplicates_same_operation, 2);
        assert_eq!(stats.duplicates_different_operation, 1);
        assert_eq!(stats.sweeps, 0);
    }

    /// Test an expired record behaves as a miss at lookup time.
    #[test]
    fn test_expired_record_is_miss() {
        let cache = DedupCache::new(Duration::from_millis(5));
        cache.record("c1", "r1", Operation::Set, "old".to_string());
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(cache.lookup("c1", "r1", Operation::Set), DedupLookup::Miss);
    }
}
