// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Log entry codec with CRC32 validation.
//!
//! A segment file holds one JSON object per line, newline-terminated. The
//! CRC32 (IEEE) is computed over a canonical pipe-joined serialisation of
//! the fields rather than the JSON text, so field order in the JSON object
//! never affects the checksum:
//!
//! ```text
//! id|OPERATION|key[|value][|version][|client_id][|request_id]
//! ```
//!
//! Optional fields are omitted entirely when absent (no empty slots),
//! numbers are plain decimal, and `value` uses compact `serde_json`
//! serialisation. A JSON `null` payload and an absent payload canonicalise
//! identically, which keeps the checksum stable across a decode/encode
//! round trip.

use crate::error::{StoreError, StoreResult};
use crate::log::types::LogEntry;
use crc32fast::Hasher;

/// Canonical byte serialisation used as CRC input.
pub fn canonical_bytes(entry: &LogEntry) -> Vec<u8> {
    let mut data = format!("{}|{}|{}", entry.id, entry.operation, entry.key);

    if let Some(value) = entry.value.as_ref().filter(|v| !v.is_null()) {
        data.push('|');
        // Value is already a parsed tree; to_string cannot fail on it.
        data.push_str(&value.to_string());
    }
    if let Some(version) = entry.version {
        data.push('|');
        data.push_str(&version.to_string());
    }
    if let Some(client_id) = &entry.client_id {
        data.push('|');
        data.push_str(client_id);
    }
    if let Some(request_id) = &entry.request_id {
        data.push('|');
        data.push_str(request_id);
    }

    data.into_bytes()
}

/// CRC32 over the canonical serialisation, `crc` field excluded.
pub fn compute_crc(entry: &LogEntry) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&canonical_bytes(entry));
    hasher.finalize()
}

/// Stamps a fresh CRC onto the entry.
///
/// The append path always reseals, so a stale or missing CRC supplied by
/// the caller is corrected before anything reaches disk. Read paths never
/// call this; mismatches there are surfaced, not repaired.
pub fn seal(mut entry: LogEntry) -> LogEntry {
    entry.crc = compute_crc(&entry);
    entry
}

/// Encodes a sealed entry as one newline-terminated JSON line.
///
/// ## Error Conditions
/// - SerializationError: the payload cannot be serialised
pub fn encode_line(entry: &LogEntry) -> StoreResult<String> {
    let mut line =
        serde_json::to_string(entry).map_err(|e| StoreError::SerializationError {
            reason: e.to_string(),
        })?;
    line.push('\n');
    Ok(line)
}

/// Decodes and validates one log line.
///
/// ## Output
/// - `Ok(LogEntry)`: well-formed record with matching CRC
///
/// ## Error Conditions
/// - ParseError: malformed JSON or an empty key
/// - CorruptedLogEntry: well-formed record whose CRC32 does not match
pub fn decode_line(line: &str) -> StoreResult<LogEntry> {
    let entry: LogEntry =
        serde_json::from_str(line.trim_end_matches('\n')).map_err(|e| StoreError::ParseError {
            reason: format!("invalid log line: {}", e),
        })?;

    if entry.key.is_empty() {
        return Err(StoreError::ParseError {
            reason: "empty key".to_string(),
        });
    }

    let actual = compute_crc(&entry);
    if actual != entry.crc {
        return Err(StoreError::CorruptedLogEntry {
            line: 0,
            reason: format!("CRC32 mismatch: expected {:08X}, got {:08X}", entry.crc, actual),
        });
    }

    Ok(entry)
}

/// Validates a structured entry received from a peer without re-encoding.
///
/// ## Error Conditions
/// - ParseError: empty key
/// - CorruptedLogEntry: CRC32 mismatch
pub fn verify(entry: &LogEntry) -> StoreResult<()> {
    if entry.key.is_empty() {
        return Err(StoreError::ParseError {
            reason: "empty key".to_string(),
        });
    }
    let actual = compute_crc(entry);
    if actual != entry.crc {
        return Err(StoreError::CorruptedLogEntry {
            line: 0,
            reason: format!("CRC32 mismatch: expected {:08X}, got {:08X}", entry.crc, actual),
        });
    }
    Ok(())
}
