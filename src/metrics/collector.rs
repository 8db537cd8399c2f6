// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Global metrics collector singleton.
//!
//! A bounded in-memory buffer of observations. Hot paths record into it
//! with a short write lock; diagnostics read a snapshot. When the buffer
//! is full the oldest observations are dropped.

use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use super::types::Metric;

/// Observations retained before the oldest are dropped.
const BUFFER_LIMIT: usize = 4096;

/// Global singleton instance.
static METRICS_COLLECTOR: Lazy<Arc<MetricsCollector>> =
    Lazy::new(|| Arc::new(MetricsCollector::new()));

/// Thread-safe metrics collector.
pub struct MetricsCollector {
    buffer: RwLock<VecDeque<Metric>>,
}

impl MetricsCollector {
    fn new() -> Self {
        Self {
            buffer: RwLock::new(VecDeque::with_capacity(BUFFER_LIMIT)),
        }
    }

    /// Returns the global singleton instance.
    pub fn global() -> Arc<Self> {
        Arc::clone(&METRICS_COLLECTOR)
    }

    /// Records an observation, dropping the oldest one when full.
    pub fn record(&self, metric: Metric) {
        let mut buffer = self.buffer.write().expect("metrics lock poisoned");
        if buffer.len() >= BUFFER_LIMIT {
            buffer.pop_front();
        }
        buffer.push_back(metric);
    }

    /// Copies out the observations for a metric name.
    pub fn snapshot(&self, name: &str) -> Vec<Metric> {
        self.buffer
            .read()
            .expect("metrics lock poisoned")
            .iter()
            .filter(|m| m.name == name)
            .cloned()
            .collect()
    }

    /// Current number of buffered observations.
    pub fn len(&self) -> usize {
        self.buffer.read().expect("metrics lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discards all buffered observations. Intended for tests.
    pub fn clear(&self) {
        self.buffer.write().expect("metrics lock poisoned").clear();
    }
}
