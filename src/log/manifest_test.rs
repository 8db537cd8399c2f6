// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Tests for the compaction swap manifest.

#[cfg(test)]
mod tests {
    use crate::error::StoreError;
    use crate::log::manifest::{recover, ManifestRename, SwapManifest, MANIFEST_FILE};
    use std::fs;
    use tempfile::TempDir;
    use uuid::Uuid;

    /// Inactive segments 1..3 compacted to a single replacement; the
    /// active segment 4 shifts down to 2. Names in `remove` never collide
    /// with a rename target; the builder guarantees that.
    fn sample_manifest() -> SwapManifest {
        SwapManifest {
            run_id: Uuid::new_v4(),
            remove: vec!["wal.log.segment.3".to_string()],
            install: vec![ManifestRename {
                from: "wal.log.compact.run.1".to_string(),
                to: "wal.log.segment.1".to_string(),
            }],
            renumber: vec![ManifestRename {
                from: "wal.log.segment.4".to_string(),
                to: "wal.log.segment.2".to_string(),
            }],
        }
    }

    fn stage_files(dir: &TempDir) {
        fs::write(dir.path().join("wal.log.segment.1"), b"old-1\n").unwrap();
        fs::write(dir.path().join("wal.log.segment.2"), b"old-2\n").unwrap();
        fs::write(dir.path().join("wal.log.segment.3"), b"old-3\n").unwrap();
        fs::write(dir.path().join("wal.log.segment.4"), b"active\n").unwrap();
        fs::write(dir.path().join("wal.log.compact.run.1"), b"compacted\n").unwrap();
    }

    /// Test a full swap: install over an old name, renumber the active
    /// segment down, delete the leftovers, drop the manifest.
    #[test]
    fn test_execute_full_swap() {
        let temp_dir = TempDir::new().unwrap();
        stage_files(&temp_dir);

        let manifest = sample_manifest();
        manifest.persist(temp_dir.path()).unwrap();
        manifest.execute(temp_dir.path()).unwrap();

        assert_eq!(
            fs::read(temp_dir.path().join("wal.log.segment.1")).unwrap(),
            b"compacted\n"
        );
        assert_eq!(
            fs::read(temp_dir.path().join("wal.log.segment.2")).unwrap(),
            b"active\n"
        );
        assert!(!temp_dir.path().join("wal.log.segment.3").exists());
        assert!(!temp_dir.path().join("wal.log.segment.4").exists());
        assert!(!temp_dir.path().join("wal.log.compact.run.1").exists());
        assert!(!temp_dir.path().join(MANIFEST_FILE).exists());
    }

    /// Test re-executing a completed swap is a no-op (crash after the
    /// renames, before the manifest removal).
    #[test]
    fn test_execute_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        stage_files(&temp_dir);

        let manifest = sample_manifest();
        manifest.persist(temp_dir.path()).unwrap();
        manifest.execute(temp_dir.path()).unwrap();

        // Crash simulation: the manifest reappears and is replayed.
        manifest.persist(temp_dir.path()).unwrap();
        manifest.execute(temp_dir.path()).unwrap();

        assert_eq!(
            fs::read(temp_dir.path().join("wal.log.segment.1")).unwrap(),
            b"compacted\n"
        );
        assert_eq!(
            fs::read(temp_dir.path().join("wal.log.segment.2")).unwrap(),
            b"active\n"
        );
    }

    /// Test recovery rolls a pending manifest forward.
    #[test]
    fn test_recover_rolls_forward() {
        let temp_dir = TempDir::new().unwrap();
        stage_files(&temp_dir);
        sample_manifest().persist(temp_dir.path()).unwrap();

        assert!(recover(temp_dir.path()).unwrap());
        assert_eq!(
            fs::read(temp_dir.path().join("wal.log.segment.1")).unwrap(),
            b"compacted\n"
        );
        assert!(!temp_dir.path().join(MANIFEST_FILE).exists());
    }

    /// Test staged files without a manifest are rolled back by deletion.
    #[test]
    fn test_recover_discards_orphan_staging() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("wal.log.segment.1"), b"live\n").unwrap();
        fs::write(temp_dir.path().join("wal.log.compact.dead.1"), b"x\n").unwrap();

        assert!(!recover(temp_dir.path()).unwrap());
        assert!(!temp_dir.path().join("wal.log.compact.dead.1").exists());
        assert!(temp_dir.path().join("wal.log.segment.1").exists());
    }

    /// Test a corrupt manifest is an unrecoverable startup error.
    #[test]
    fn test_corrupt_manifest_fatal() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(MANIFEST_FILE), b"{not json").unwrap();

        match recover(temp_dir.path()) {
            Err(StoreError::ManifestCorrupted { .. }) => {}
            other => panic!("Expected ManifestCorrupted, got {:?}", other),
        }
    }
}
