// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Crash-safe compaction swap manifest.
//!
//! The compaction swap replaces the inactive segments with freshly written
//! replacements and renumbers whatever remains. The manifest is persisted
//! and synced before the first rename, and every step is idempotent, so a
//! crash at any point recovers to the post-swap configuration by replaying
//! the manifest; staged files without a manifest recover to the pre-swap
//! configuration by discarding them.
//!
//! Step order matters: installs and renumbers delete the old occupant of
//! their target name themselves, so recovery can tell an already-installed
//! replacement (source gone, target present) from an old segment that
//! still has to be removed. Names in `remove` must never collide with a
//! rename target; the builder in `wal::rename_sequence` guarantees that.

use crate::error::{StoreError, StoreResult};
use crate::log::segment::COMPACT_PREFIX;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Manifest file name inside the data directory.
pub const MANIFEST_FILE: &str = "compaction.manifest";

/// One rename step of the swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestRename {
    pub from: String,
    pub to: String,
}

/// Persisted description of one compaction swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapManifest {
    /// Compaction run this swap belongs to.
    pub run_id: Uuid,

    /// Old segment file names to delete (those not overwritten by a
    /// rename target).
    pub remove: Vec<String>,

    /// Staged replacement files to move onto segment names 1..k.
    pub install: Vec<ManifestRename>,

    /// Surviving segments shifted down to k+1.. in ascending order.
    pub renumber: Vec<ManifestRename>,
}

impl SwapManifest {
    /// Persists the manifest and flushes it to disk.
    ///
    /// Must complete before the first rename of the swap.
    pub fn persist(&self, dir: &Path) -> StoreResult<()> {
        let path = dir.join(MANIFEST_FILE);
        let json =
            serde_json::to_string_pretty(self).map_err(|e| StoreError::SerializationError {
                reason: e.to_string(),
            })?;

        let mut file = File::create(&path).map_err(|e| StoreError::IoError {
            operation: format!("create_manifest: {}", path.display()),
            reason: e.to_string(),
        })?;
        file.write_all(json.as_bytes())
            .map_err(|e| StoreError::IoError {
                operation: "write_manifest".to_string(),
                reason: e.to_string(),
            })?;
        file.sync_all().map_err(|e| StoreError::IoError {
            operation: "sync_manifest".to_string(),
            reason: e.to_string(),
        })?;

        Ok(())
    }

    /// Loads a manifest if one exists.
    ///
    /// ## Error Conditions
    /// - ManifestCorrupted: the file exists but cannot be parsed. This is
    ///   an unrecoverable startup error; the operator must intervene.
    pub fn load(dir: &Path) -> StoreResult<Option<Self>> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| StoreError::IoError {
            operation: format!("read_manifest: {}", path.display()),
            reason: e.to_string(),
        })?;

        let manifest =
            serde_json::from_str(&content).map_err(|e| StoreError::ManifestCorrupted {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        Ok(Some(manifest))
    }

    /// Executes (or re-executes) every step of the swap, then removes the
    /// manifest. Idempotent: steps already completed are detected and
    /// skipped.
    pub fn execute(&self, dir: &Path) -> StoreResult<()> {
        for step in self.install.iter().chain(self.renumber.iter()) {
            apply_rename(dir, step)?;
        }

        for name in &self.remove {
            let path = dir.join(name);
            if path.exists() {
                fs::remove_file(&path).map_err(|e| StoreError::IoError {
                    operation: format!("remove_segment: {}", path.display()),
                    reason: e.to_string(),
                })?;
            }
        }

        let manifest_path = dir.join(MANIFEST_FILE);
        if manifest_path.exists() {
            fs::remove_file(&manifest_path).map_err(|e| StoreError::IoError {
                operation: "remove_manifest".to_string(),
                reason: e.to_string(),
            })?;
        }

        Ok(())
    }
}

fn apply_rename(dir: &Path, step: &ManifestRename) -> StoreResult<()> {
    if step.from == step.to {
        return Ok(());
    }

    let from = dir.join(&step.from);
    let to = dir.join(&step.to);

    if from.exists() {
        if to.exists() {
            fs::remove_file(&to).map_err(|e| StoreError::IoError {
                operation: format!("remove_old_segment: {}", to.display()),
                reason: e.to_string(),
            })?;
        }
        fs::rename(&from, &to).map_err(|e| StoreError::IoError {
            operation: format!("rename_segment: {} -> {}", from.display(), to.display()),
            reason: e.to_string(),
        })?;
        return Ok(());
    }

    if to.exists() {
        // Already applied before a crash.
        return Ok(());
    }

    Err(StoreError::ManifestCorrupted {
        path: dir.join(MANIFEST_FILE).display().to_string(),
        reason: format!("neither '{}' nor '{}' exists", step.from, step.to),
    })
}

/// Startup recovery for the swap.
///
/// With a manifest present the swap is rolled forward; without one, staged
/// `wal.log.compact.*` leftovers are rolled back by deletion. Returns
/// whether a manifest was replayed.
pub fn recover(dir: &Path) -> StoreResult<bool> {
    let replayed = match SwapManifest::load(dir)? {
        Some(manifest) => {
            manifest.execute(dir)?;
            true
        }
        None => false,
    };

    for entry in fs::read_dir(dir).map_err(|e| StoreError::IoError {
        operation: format!("read_dir_for_recovery: {}", dir.display()),
        reason: e.to_string(),
    })? {
        let entry = entry.map_err(|e| StoreError::IoError {
            operation: "read_dir_entry_for_recovery".to_string(),
            reason: e.to_string(),
        })?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(COMPACT_PREFIX) {
            fs::remove_file(entry.path()).map_err(|e| StoreError::IoError {
                operation: format!("remove_stale_compaction_file: {}", name),
                reason: e.to_string(),
            })?;
        }
    }

    Ok(replayed)
}

/// Staging path for compaction output, unique per run.
pub fn staging_path(dir: &Path, run_id: Uuid, index: usize) -> PathBuf {
    dir.join(format!("{}{}.{}", COMPACT_PREFIX, run_id, index))
}
