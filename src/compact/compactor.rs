// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Compaction of inactive segments.
//!
//! A run folds the inactive segments down to the latest operation per
//! key, drops entries superseded by the active segment along with DELETE
//! tombstones whose key never reappears, and installs the result through
//! the WAL's crash-safe swap. Survivors keep their original ids and CRCs
//! byte-for-byte, so a replay after compaction reconstructs the same
//! keyspace as before.
//!
//! Runs are single-flight; appends to the active segment continue
//! throughout and are only excluded during the final swap.

use crate::config::CompactionSettings;
use crate::error::{StoreError, StoreResult};
use crate::log::codec;
use crate::log::manifest::staging_path;
use crate::log::types::{LogEntry, Operation};
use crate::log::wal::{read_segment, SegmentedWal};
use crate::metrics::{Metric, MetricUnit, MetricsCollector};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use uuid::Uuid;

/// Completed runs retained for the status surface.
const HISTORY_LIMIT: usize = 32;

/// Record of one completed compaction run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompactionRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub segments_compacted: usize,
    pub entries_removed: usize,
}

/// Result of asking for a run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(CompactionRun),
    /// Another run is in flight.
    Busy,
}

/// Current configuration and bounded run history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompactionStatus {
    pub enabled: bool,
    pub interval_secs: u64,
    pub min_interval_secs: u64,
    pub running: bool,
    pub history: Vec<CompactionRun>,
}

/// Single-flight compactor over one WAL.
pub struct Compactor {
    wal: Arc<SegmentedWal>,
    settings: RwLock<CompactionSettings>,
    running: AtomicBool,
    last_run: Mutex<Option<Instant>>,
    history: Mutex<VecDeque<CompactionRun>>,
}

impl Compactor {
    pub fn new(wal: Arc<SegmentedWal>, settings: CompactionSettings) -> Self {
        Self {
            wal,
            settings: RwLock::new(settings),
            running: AtomicBool::new(false),
            last_run: Mutex::new(None),
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Runs one compaction pass now, regardless of the scheduler state.
    ///
    /// ## Output
    /// - `Ok(RunOutcome::Completed)`: pass finished; counters inside
    /// - `Ok(RunOutcome::Busy)`: another pass holds the single-flight flag
    pub fn run(&self) -> StoreResult<RunOutcome> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(RunOutcome::Busy);
        }

        let result = self.run_locked();
        self.running.store(false, Ordering::SeqCst);

        let run = result?;
        *self.last_run.lock().expect("compactor lock poisoned") = Some(Instant::now());
        {
            let mut history = self.history.lock().expect("compactor lock poisoned");
            if history.len() >= HISTORY_LIMIT {
                history.pop_front();
            }
            history.push_back(run.clone());
        }

        MetricsCollector::global().record(Metric::new(
            "compaction_run",
            run.duration_ms as f64,
            MetricUnit::Milliseconds,
        ));

        Ok(RunOutcome::Completed(run))
    }

    fn run_locked(&self) -> StoreResult<CompactionRun> {
        let started = Instant::now();
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();

        let segments = self.wal.segments();
        let (inactive, active): (Vec<_>, Vec<_>) =
            segments.into_iter().partition(|meta| !meta.is_active);

        if inactive.is_empty() {
            return Ok(CompactionRun {
                run_id,
                started_at,
                duration_ms: started.elapsed().as_millis() as u64,
                segments_compacted: 0,
                entries_removed: 0,
            });
        }

        // Snapshot the inactive contents and fold down to the latest
        // operation per key. Survivors keep their original id and crc.
        let mut total_entries = 0usize;
        let mut latest: HashMap<String, LogEntry> = HashMap::new();
        for meta in &inactive {
            let (entries, report) = read_segment(&meta.path)?;
            total_entries += report.entries;
            for entry in entries {
                latest.insert(entry.key.clone(), entry);
            }
        }

        // Keys that reappear in the active segment are superseded there,
        // so their inactive entries can go; a DELETE whose key never
        // reappears is a tombstone for a key that stays gone. Either way
        // only SETs of keys untouched by the active segment survive.
        let active_keys: HashSet<String> = match active.first() {
            Some(meta) => read_segment(&meta.path)?
                .0
                .into_iter()
                .map(|entry| entry.key)
                .collect(),
            None => HashSet::new(),
        };

        let mut survivors: Vec<LogEntry> = latest
            .into_values()
            .filter(|entry| {
                entry.operation == Operation::Set && !active_keys.contains(&entry.key)
            })
            .collect();
        survivors.sort_by_key(|entry| entry.id);

        let staged = self.write_staged(run_id, &survivors)?;
        let replaced: Vec<String> = inactive
            .iter()
            .map(|meta| {
                meta.path
                    .file_name()
                    .map(|f| f.to_string_lossy().to_string())
                    .unwrap_or_default()
            })
            .collect();

        self.wal.rename_sequence(run_id, &staged, &replaced)?;

        Ok(CompactionRun {
            run_id,
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
            segments_compacted: inactive.len(),
            entries_removed: total_entries - survivors.len(),
        })
    }

    /// Writes survivors into size-bounded staging files, flushed before
    /// the swap may begin.
    fn write_staged(&self, run_id: Uuid, survivors: &[LogEntry]) -> StoreResult<Vec<PathBuf>> {
        let max_size = self.wal.max_segment_size();
        let mut staged: Vec<PathBuf> = Vec::new();
        let mut current: Option<(File, PathBuf, u64)> = None;

        for entry in survivors {
            let line = codec::encode_line(entry)?;
            let record_len = line.len() as u64;

            let needs_new = match &current {
                None => true,
                Some((_, _, size)) => *size > 0 && *size + record_len > max_size,
            };
            if needs_new {
                if let Some((file, _, _)) = current.take() {
                    sync_staged(&file)?;
                }
                let path = staging_path(self.wal.dir(), run_id, staged.len() + 1);
                let file = File::create(&path).map_err(|e| StoreError::IoError {
                    operation: format!("create_staged_segment: {}", path.display()),
                    reason: e.to_string(),
                })?;
                staged.push(path.clone());
                current = Some((file, path, 0));
            }

            let (file, path, size) = current.as_mut().expect("staging file open");
            file.write_all(line.as_bytes())
                .map_err(|e| StoreError::IoError {
                    operation: format!("write_staged_segment: {}", path.display()),
                    reason: e.to_string(),
                })?;
            *size += record_len;
        }

        if let Some((file, _, _)) = current.take() {
            sync_staged(&file)?;
        }

        Ok(staged)
    }

    /// Scheduler hook: runs a pass when enabled, due, and there is
    /// anything inactive to compact.
    pub fn maybe_run_scheduled(&self) -> StoreResult<Option<RunOutcome>> {
        let settings = self.settings.read().expect("compactor lock poisoned").clone();
        if !settings.enabled {
            return Ok(None);
        }

        let due = match *self.last_run.lock().expect("compactor lock poisoned") {
            None => true,
            Some(at) => at.elapsed() >= settings.effective_interval(),
        };
        if !due {
            return Ok(None);
        }

        let has_inactive = self.wal.segments().iter().any(|meta| !meta.is_active);
        if !has_inactive {
            return Ok(None);
        }

        self.run().map(Some)
    }

    /// Applies configuration changes, reporting what changed.
    pub fn configure(&self, enabled: Option<bool>, interval_secs: Option<u64>) -> Vec<String> {
        let mut settings = self.settings.write().expect("compactor lock poisoned");
        let mut changes = Vec::new();

        if let Some(enabled) = enabled {
            if settings.enabled != enabled {
                settings.enabled = enabled;
                changes.push(format!("enabled: {}", enabled));
            }
        }
        if let Some(interval) = interval_secs {
            let clamped = interval.max(settings.min_interval_secs);
            if settings.interval_secs != clamped {
                settings.interval_secs = clamped;
                changes.push(format!("interval_secs: {}", clamped));
            }
        }

        changes
    }

    /// Current configuration plus bounded run history.
    pub fn status(&self) -> CompactionStatus {
        let settings = self.settings.read().expect("compactor lock poisoned");
        let history = self.history.lock().expect("compactor lock poisoned");

        CompactionStatus {
            enabled: settings.enabled,
            interval_secs: settings.interval_secs,
            min_interval_secs: settings.min_interval_secs,
            running: self.running.load(Ordering::SeqCst),
            history: history.iter().cloned().collect(),
        }
    }
}

fn sync_staged(file: &File) -> StoreResult<()> {
    file.sync_all().map_err(|e| StoreError::IoError {
        operation: "flush_staged_segment".to_string(),
        reason: e.to_string(),
    })
}
