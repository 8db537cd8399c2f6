// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Tests for the metrics collector and aggregator.
//!
//! The collector is a process-wide singleton also fed by other tests
//! running in parallel, so assertions stick to uniquely named metrics.

#[cfg(test)]
mod tests {
    use crate::metrics::{calculate_stats, Metric, MetricUnit, MetricsCollector};
    use serial_test::serial;

    /// Test record and snapshot through the global singleton.
    #[test]
    #[serial]
    fn test_record_and_snapshot() {
        let collector = MetricsCollector::global();

        collector.record(Metric::new(
            "collector_probe_append",
            120.0,
            MetricUnit::Microseconds,
        ));
        collector.record(Metric::new(
            "collector_probe_append",
            80.0,
            MetricUnit::Microseconds,
        ));
        collector.record(
            Metric::new("collector_probe_push", 900.0, MetricUnit::Microseconds)
                .with_tag("peer", "follower-1"),
        );

        let appends = collector.snapshot("collector_probe_append");
        assert_eq!(appends.len(), 2);
        assert_eq!(appends[0].value, 120.0);
        assert_eq!(appends[0].unit, MetricUnit::Microseconds);

        let pushes = collector.snapshot("collector_probe_push");
        assert_eq!(pushes.len(), 1);
        assert_eq!(
            pushes[0].tags,
            vec![("peer".to_string(), "follower-1".to_string())]
        );

        collector.clear();
        assert!(collector.snapshot("collector_probe_append").is_empty());
    }

    /// Test aggregation statistics.
    #[test]
    fn test_calculate_stats() {
        let metrics: Vec<Metric> = (1..=100)
            .map(|i| Metric::new("op", i as f64, MetricUnit::Microseconds))
            .collect();

        let stats = calculate_stats(&metrics).unwrap();
        assert_eq!(stats.count, 100);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 100.0);
        assert_eq!(stats.avg, 50.5);
        assert_eq!(stats.p95, 95.0);

        assert!(calculate_stats(&[]).is_none());
    }
}
