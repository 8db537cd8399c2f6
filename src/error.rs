// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Error types for replikv operations.
//!
//! Provides structured error handling with detailed context for debugging.
//! Negative outcomes that are part of the normal protocol (version
//! conflicts, missing keys, duplicate requests, replication gaps) are
//! modelled as tagged results in their owning modules, not as errors.

use std::fmt;

/// Standard Result type for all replikv operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error types for replikv operations.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// I/O error during file operations.
    IoError { operation: String, reason: String },

    /// Log line could not be parsed (malformed JSON or missing fields).
    ParseError { reason: String },

    /// Corrupted log entry (CRC32 mismatch or inconsistent fields).
    CorruptedLogEntry { line: usize, reason: String },

    /// Replica append received an id that is not the next expected one.
    IdOutOfOrder { expected: u64, got: u64 },

    /// Requested range extends beyond the end of the log.
    RangeUnavailable { from_id: u64, to_id: u64, last_id: u64 },

    /// WAL directory is locked by another process.
    WalLocked { path: String },

    /// Serialisation error.
    SerializationError { reason: String },

    /// Compaction swap manifest corrupted (unrecoverable at startup).
    ManifestCorrupted { path: String, reason: String },

    /// Configuration value rejected during validation.
    InvalidConfig { field: String, reason: String },

    /// Mutation attempted on a node that is not the leader.
    NotLeader { operation: String },

    /// Replication traffic received by a node that is not a follower.
    NotFollower { operation: String },

    /// Peer did not answer within the deadline or refused the connection.
    PeerUnavailable { peer: String, reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoError { operation, reason } => {
                write!(f, "I/O error during '{}': {}", operation, reason)
            }
            Self::ParseError { reason } => {
                write!(f, "Parse error: {}", reason)
            }
            Self::CorruptedLogEntry { line, reason } => {
                write!(f, "Corrupted log entry at line {}: {}", line, reason)
            }
            Self::IdOutOfOrder { expected, got } => {
                write!(f, "Log id out of order: expected {}, got {}", expected, got)
            }
            Self::RangeUnavailable {
                from_id,
                to_id,
                last_id,
            } => {
                write!(
                    f,
                    "Range {}..{} unavailable (log ends at {})",
                    from_id, to_id, last_id
                )
            }
            Self::WalLocked { path } => {
                write!(f, "WAL directory locked by another process: {}", path)
            }
            Self::SerializationError { reason } => {
                write!(f, "Serialisation error: {}", reason)
            }
            Self::ManifestCorrupted { path, reason } => {
                write!(f, "Compaction manifest '{}' corrupted: {}", path, reason)
            }
            Self::InvalidConfig { field, reason } => {
                write!(f, "Invalid configuration '{}': {}", field, reason)
            }
            Self::NotLeader { operation } => {
                write!(f, "Operation '{}' requires the leader role", operation)
            }
            Self::NotFollower { operation } => {
                write!(f, "Operation '{}' requires the follower role", operation)
            }
            Self::PeerUnavailable { peer, reason } => {
                write!(f, "Peer '{}' unavailable: {}", peer, reason)
            }
        }
    }
}

impl std::error::Error for StoreError {}
