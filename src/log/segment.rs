// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Segment file naming and discovery.
//!
//! Segments live directly in the node's data directory and are named
//! `wal.log.segment.<n>` with `n` starting at 1 and densely numbered.
//! Exactly one segment, the highest `n`, is active at any time.

use crate::error::{StoreError, StoreResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Prefix shared by all segment files.
pub const SEGMENT_PREFIX: &str = "wal.log.segment.";

/// Prefix for staged compaction output awaiting the swap.
pub const COMPACT_PREFIX: &str = "wal.log.compact.";

static SEGMENT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^wal\.log\.segment\.([0-9]+)$").expect("static regex"));

/// Metadata describing one segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentMeta {
    /// 1-based sequence number, dense after compaction.
    pub sequence: u64,

    /// Absolute path of the segment file.
    pub path: PathBuf,

    /// File size in bytes.
    pub size_bytes: u64,

    /// Whether this is the tail segment receiving appends.
    pub is_active: bool,
}

/// File name for the segment with the given sequence number.
pub fn segment_file_name(sequence: u64) -> String {
    format!("{}{}", SEGMENT_PREFIX, sequence)
}

/// Parses a segment sequence number out of a file name.
///
/// Returns `None` for anything that is not a segment file.
pub fn parse_sequence(file_name: &str) -> Option<u64> {
    let captures = SEGMENT_NAME.captures(file_name)?;
    captures.get(1)?.as_str().parse().ok()
}

/// Lists segment files in a directory, sorted by sequence number.
///
/// ## Error Conditions
/// - IoError: directory unreadable
/// - CorruptedLogEntry: duplicate or non-dense numbering
pub fn list_segment_files(dir: &Path) -> StoreResult<Vec<(u64, PathBuf)>> {
    let mut segments = Vec::new();

    let entries = std::fs::read_dir(dir).map_err(|e| StoreError::IoError {
        operation: format!("read_segment_dir: {}", dir.display()),
        reason: e.to_string(),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| StoreError::IoError {
            operation: "read_segment_dir_entry".to_string(),
            reason: e.to_string(),
        })?;
        let name = entry.file_name();
        if let Some(sequence) = parse_sequence(&name.to_string_lossy()) {
            segments.push((sequence, entry.path()));
        }
    }

    segments.sort_by_key(|(sequence, _)| *sequence);

    for (index, (sequence, path)) in segments.iter().enumerate() {
        let expected = index as u64 + 1;
        if *sequence != expected {
            return Err(StoreError::IoError {
                operation: format!("scan_segments: {}", path.display()),
                reason: format!(
                    "segment numbering not dense: expected {}, found {}",
                    expected, sequence
                ),
            });
        }
    }

    Ok(segments)
}
