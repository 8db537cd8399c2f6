// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Metric types and units.

use chrono::{DateTime, Utc};

/// Unit a metric value is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricUnit {
    Microseconds,
    Milliseconds,
    Bytes,
    Count,
}

impl MetricUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Microseconds => "us",
            Self::Milliseconds => "ms",
            Self::Bytes => "bytes",
            Self::Count => "count",
        }
    }
}

/// A single recorded observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    /// Metric name, e.g. `wal_append`.
    pub name: String,

    /// Observed value.
    pub value: f64,

    /// Unit of the value.
    pub unit: MetricUnit,

    /// Free-form tags, e.g. `("peer", "follower-1")`.
    pub tags: Vec<(String, String)>,

    /// Wall-clock time of the observation.
    pub recorded_at: DateTime<Utc>,
}

impl Metric {
    /// Creates a metric stamped with the current time.
    pub fn new(name: &str, value: f64, unit: MetricUnit) -> Self {
        Self {
            name: name.to_string(),
            value,
            unit,
            tags: Vec::new(),
            recorded_at: Utc::now(),
        }
    }

    /// Attaches a tag.
    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.push((key.to_string(), value.to_string()));
        self
    }
}
