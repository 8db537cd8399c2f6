// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Statistical aggregation over recorded metrics.

use super::types::Metric;

/// Summary statistics for one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub p95: f64,
}

/// Computes summary statistics over a set of observations.
///
/// Returns `None` when the set is empty.
pub fn calculate_stats(metrics: &[Metric]) -> Option<MetricStats> {
    if metrics.is_empty() {
        return None;
    }

    let mut values: Vec<f64> = metrics.iter().map(|m| m.value).collect();
    values.sort_by(|a, b| a.partial_cmp(b).expect("metric values are finite"));

    let count = values.len();
    let sum: f64 = values.iter().sum();

    Some(MetricStats {
        count,
        min: values[0],
        max: values[count - 1],
        avg: sum / count as f64,
        p95: percentile(&values, 95.0),
    })
}

/// Nearest-rank percentile over sorted values.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
