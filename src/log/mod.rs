// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Segmented, CRC32-protected write-ahead log.
//!
//! - **types**: log entry and operation definitions
//! - **codec**: line codec with canonical-form CRC32 validation
//! - **segment**: segment naming and discovery
//! - **wal**: the segmented log (append, roll, replay, range, swap)
//! - **manifest**: crash-safe compaction swap manifest

pub mod codec;
pub mod manifest;
pub mod segment;
pub mod types;
pub mod wal;

#[cfg(test)]
mod manifest_test;

// Re-export public API
pub use manifest::{ManifestRename, SwapManifest, MANIFEST_FILE};
pub use segment::{segment_file_name, SegmentMeta};
pub use types::{LogEntry, Operation, ReplayReport};
pub use wal::{read_segment, ReplayIter, SegmentedWal};
