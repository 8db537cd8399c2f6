// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Idempotent-receiver deduplication cache.

pub mod cache;

#[cfg(test)]
mod cache_test;

// Re-export public API
pub use cache::{DedupCache, DedupLookup, DedupStats};
