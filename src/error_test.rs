// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Tests for error display formatting.

#[cfg(test)]
mod tests {
    use crate::error::StoreError;

    #[test]
    fn test_display_carries_context() {
        let error = StoreError::IoError {
            operation: "append_entry".to_string(),
            reason: "disk full".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "I/O error during 'append_entry': disk full"
        );

        let error = StoreError::IdOutOfOrder {
            expected: 4,
            got: 9,
        };
        assert_eq!(error.to_string(), "Log id out of order: expected 4, got 9");

        let error = StoreError::CorruptedLogEntry {
            line: 12,
            reason: "CRC32 mismatch".to_string(),
        };
        assert!(error.to_string().contains("line 12"));
    }

    #[test]
    fn test_error_trait_object() {
        let error: Box<dyn std::error::Error> = Box::new(StoreError::NotLeader {
            operation: "put".to_string(),
        });
        assert!(error.to_string().contains("leader role"));
    }
}
