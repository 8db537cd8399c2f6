// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Segmented write-ahead log.
//!
//! An append-only log split across numbered segment files with size-based
//! rolling. Appends go to the single active segment and are flushed before
//! the call returns; replay walks every segment in order and skips (but
//! counts) corrupt records. Startup recovery truncates a torn tail record
//! and rolls an interrupted compaction swap forward or back via the
//! manifest.
//!
//! ## Locking
//!
//! The inner state sits behind an `RwLock`. `append` is the only mutator
//! under normal operation; `replay` and `range` snapshot the segment list
//! under a read lock and then stream from the files. The compaction swap
//! (`rename_sequence`) takes the write lock, so it excludes appends only
//! for the duration of the renames. A `fs2` advisory lock on `wal.lock`
//! keeps a second process out of the directory entirely.

use crate::error::{StoreError, StoreResult};
use crate::log::codec;
use crate::log::manifest::{self, SwapManifest};
use crate::log::segment::{self, SegmentMeta};
use crate::log::types::{LogEntry, ReplayReport};
use crate::metrics::{Metric, MetricUnit, MetricsCollector};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Instant;
use uuid::Uuid;

/// Lock file name inside the data directory.
const LOCK_FILE: &str = "wal.lock";

#[derive(Debug)]
struct WalInner {
    sealed: Vec<SegmentMeta>,
    active_seq: u64,
    active_path: PathBuf,
    active_file: File,
    active_size: u64,
    last_id: Option<u64>,
    recovery: ReplayReport,
}

/// Segmented write-ahead log rooted in one data directory.
#[derive(Debug)]
pub struct SegmentedWal {
    dir: PathBuf,
    max_segment_size: u64,
    inner: RwLock<WalInner>,
    // Held for the lifetime of the handle; released on drop.
    _dir_lock: File,
}

impl SegmentedWal {
    /// Opens (or creates) the log in `dir`.
    ///
    /// Recovery order: replay any pending compaction swap manifest, drop
    /// stale staged files, truncate a torn tail on the active segment,
    /// then scan all segments for `last_id` and corruption counts.
    ///
    /// ## Error Conditions
    /// - WalLocked: another process holds the directory
    /// - ManifestCorrupted: unrecoverable swap manifest
    /// - IoError: directory or segment unreadable
    pub fn open<P: AsRef<Path>>(dir: P, max_segment_size: u64) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();

        std::fs::create_dir_all(&dir).map_err(|e| StoreError::IoError {
            operation: format!("create_data_dir: {}", dir.display()),
            reason: e.to_string(),
        })?;

        let lock_path = dir.join(LOCK_FILE);
        let dir_lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| StoreError::IoError {
                operation: format!("create_lock_file: {}", lock_path.display()),
                reason: e.to_string(),
            })?;
        dir_lock
            .try_lock_exclusive()
            .map_err(|_| StoreError::WalLocked {
                path: dir.display().to_string(),
            })?;

        manifest::recover(&dir)?;

        let mut files = segment::list_segment_files(&dir)?;
        if files.is_empty() {
            let path = dir.join(segment::segment_file_name(1));
            open_segment_file(&path)?;
            files.push((1, path));
        }

        let (active_seq, active_path) = files.last().cloned().expect("at least one segment");
        truncate_torn_tail(&active_path)?;

        let mut sealed = Vec::new();
        let mut last_id = None;
        let mut recovery = ReplayReport::default();

        for (sequence, path) in &files {
            let (entries, report) = read_segment(path)?;
            recovery.entries += report.entries;
            recovery.skipped += report.skipped;
            if let Some(entry) = entries.last() {
                last_id = Some(entry.id);
            }
            if *sequence != active_seq {
                sealed.push(SegmentMeta {
                    sequence: *sequence,
                    path: path.clone(),
                    size_bytes: file_size(path)?,
                    is_active: false,
                });
            }
        }

        let active_file = open_segment_file(&active_path)?;
        let active_size = file_size(&active_path)?;

        Ok(Self {
            dir,
            max_segment_size,
            inner: RwLock::new(WalInner {
                sealed,
                active_seq,
                active_path,
                active_file,
                active_size,
                last_id,
                recovery,
            }),
            _dir_lock: dir_lock,
        })
    }

    /// Appends an entry on the leader path: assigns the next id, stamps
    /// the CRC, rolls the segment if needed, writes and flushes.
    ///
    /// ## Output
    /// - `Ok(id)`: the id assigned to the entry
    pub fn append(&self, mut entry: LogEntry) -> StoreResult<u64> {
        let mut inner = self.inner.write().expect("wal lock poisoned");
        entry.id = inner.last_id.map_or(1, |id| id + 1);
        self.append_locked(&mut inner, entry)
    }

    /// Appends an entry on the replica path: the id must be exactly
    /// `last_id + 1`.
    ///
    /// ## Error Conditions
    /// - IdOutOfOrder: the entry does not continue the log
    pub fn append_replica(&self, entry: LogEntry) -> StoreResult<u64> {
        let mut inner = self.inner.write().expect("wal lock poisoned");
        let expected = inner.last_id.map_or(1, |id| id + 1);
        if entry.id != expected {
            return Err(StoreError::IdOutOfOrder {
                expected,
                got: entry.id,
            });
        }
        self.append_locked(&mut inner, entry)
    }

    fn append_locked(&self, inner: &mut WalInner, entry: LogEntry) -> StoreResult<u64> {
        let started = Instant::now();
        let id = entry.id;
        let sealed = codec::seal(entry);
        let line = codec::encode_line(&sealed)?;
        let record_len = line.len() as u64;

        // A roll never splits a record: if this record does not fit, seal
        // the active segment first. An oversized record in an empty
        // segment is written anyway.
        if inner.active_size > 0 && inner.active_size + record_len > self.max_segment_size {
            self.roll(inner)?;
        }

        inner
            .active_file
            .write_all(line.as_bytes())
            .map_err(|e| StoreError::IoError {
                operation: format!("append_entry: {}", inner.active_path.display()),
                reason: e.to_string(),
            })?;
        inner.active_file.sync_all().map_err(|e| StoreError::IoError {
            operation: format!("flush_segment: {}", inner.active_path.display()),
            reason: e.to_string(),
        })?;

        inner.active_size += record_len;
        inner.last_id = Some(id);

        MetricsCollector::global().record(Metric::new(
            "wal_append",
            started.elapsed().as_micros() as f64,
            MetricUnit::Microseconds,
        ));

        Ok(id)
    }

    fn roll(&self, inner: &mut WalInner) -> StoreResult<()> {
        inner.sealed.push(SegmentMeta {
            sequence: inner.active_seq,
            path: inner.active_path.clone(),
            size_bytes: inner.active_size,
            is_active: false,
        });

        let next_seq = inner.active_seq + 1;
        let next_path = self.dir.join(segment::segment_file_name(next_seq));
        let next_file = open_segment_file(&next_path)?;

        inner.active_seq = next_seq;
        inner.active_path = next_path;
        inner.active_file = next_file;
        inner.active_size = 0;

        Ok(())
    }

    /// Highest id written, if any.
    pub fn last_id(&self) -> Option<u64> {
        self.inner.read().expect("wal lock poisoned").last_id
    }

    /// All segments in order; the final one is active.
    pub fn segments(&self) -> Vec<SegmentMeta> {
        let inner = self.inner.read().expect("wal lock poisoned");
        let mut segments = inner.sealed.clone();
        segments.push(SegmentMeta {
            sequence: inner.active_seq,
            path: inner.active_path.clone(),
            size_bytes: inner.active_size,
            is_active: true,
        });
        segments
    }

    /// Corruption counters observed during the startup scan.
    pub fn recovery_report(&self) -> ReplayReport {
        self.inner.read().expect("wal lock poisoned").recovery
    }

    /// Configured roll threshold in bytes.
    pub fn max_segment_size(&self) -> u64 {
        self.max_segment_size
    }

    /// Data directory this log lives in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lazily replays every segment in id order.
    ///
    /// Invalid records are skipped and counted on the iterator's report,
    /// never yielded. The iterator is independent of the live handle and
    /// can be restarted by calling `replay` again.
    pub fn replay(&self) -> ReplayIter {
        let files: Vec<PathBuf> = {
            let inner = self.inner.read().expect("wal lock poisoned");
            inner
                .sealed
                .iter()
                .map(|meta| meta.path.clone())
                .chain(std::iter::once(inner.active_path.clone()))
                .collect()
        };
        ReplayIter::new(files)
    }

    /// Replays everything into memory, returning the entries and the
    /// corruption counters.
    pub fn replay_collect(&self) -> (Vec<LogEntry>, ReplayReport) {
        let mut iter = self.replay();
        let mut entries = Vec::new();
        for entry in iter.by_ref() {
            entries.push(entry);
        }
        (entries, iter.report())
    }

    /// Returns the contiguous entries with ids in `[from_id, to_id]`.
    ///
    /// ## Error Conditions
    /// - RangeUnavailable: the range is empty, inverted, or extends past
    ///   the end of the log
    pub fn range(&self, from_id: u64, to_id: u64) -> StoreResult<Vec<LogEntry>> {
        let last_id = self.last_id().unwrap_or(0);
        if from_id == 0 || from_id > to_id || to_id > last_id {
            return Err(StoreError::RangeUnavailable {
                from_id,
                to_id,
                last_id,
            });
        }

        let mut entries = Vec::new();
        for entry in self.replay() {
            if entry.id > to_id {
                break;
            }
            if entry.id >= from_id {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Installs the result of a compaction run: staged replacement files
    /// become segments `1..=k`, surviving segments are renumbered to
    /// `k+1..`, and the replaced inactive segments disappear. Used only by
    /// the compactor.
    ///
    /// The swap is crash-safe: a manifest is persisted before the first
    /// rename and replayed at the next open if the process dies mid-swap.
    pub fn rename_sequence(
        &self,
        run_id: Uuid,
        staged: &[PathBuf],
        replaced: &[String],
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("wal lock poisoned");

        for name in replaced {
            let known = inner
                .sealed
                .iter()
                .any(|meta| file_name(&meta.path) == *name);
            if !known {
                return Err(StoreError::IoError {
                    operation: "rename_sequence".to_string(),
                    reason: format!("segment '{}' is not sealed", name),
                });
            }
        }

        let k = staged.len() as u64;
        let install: Vec<manifest::ManifestRename> = staged
            .iter()
            .enumerate()
            .map(|(index, path)| manifest::ManifestRename {
                from: file_name(path),
                to: segment::segment_file_name(index as u64 + 1),
            })
            .collect();

        // Everything not replaced (segments sealed after the snapshot,
        // plus the active segment) shifts down to k+1.. in order.
        let mut renumber = Vec::new();
        let mut next_seq = k + 1;
        let mut new_sealed = Vec::new();
        for meta in &inner.sealed {
            let name = file_name(&meta.path);
            if replaced.contains(&name) {
                continue;
            }
            let new_name = segment::segment_file_name(next_seq);
            renumber.push(manifest::ManifestRename {
                from: name,
                to: new_name.clone(),
            });
            new_sealed.push(SegmentMeta {
                sequence: next_seq,
                path: self.dir.join(&new_name),
                size_bytes: meta.size_bytes,
                is_active: false,
            });
            next_seq += 1;
        }
        let active_name = file_name(&inner.active_path);
        let new_active_name = segment::segment_file_name(next_seq);
        renumber.push(manifest::ManifestRename {
            from: active_name,
            to: new_active_name.clone(),
        });

        let targets: Vec<String> = install
            .iter()
            .chain(renumber.iter())
            .map(|step| step.to.clone())
            .collect();
        let remove: Vec<String> = replaced
            .iter()
            .filter(|name| !targets.contains(name))
            .cloned()
            .collect();

        let swap = SwapManifest {
            run_id,
            remove,
            install,
            renumber,
        };
        swap.persist(&self.dir)?;
        swap.execute(&self.dir)?;

        // Refresh in-memory state. The open handle to the active segment
        // survives the rename; only its path and number change.
        let mut installed = Vec::new();
        for (index, _) in staged.iter().enumerate() {
            let sequence = index as u64 + 1;
            let path = self.dir.join(segment::segment_file_name(sequence));
            installed.push(SegmentMeta {
                sequence,
                path: path.clone(),
                size_bytes: file_size(&path)?,
                is_active: false,
            });
        }
        installed.extend(new_sealed);

        inner.sealed = installed;
        inner.active_seq = next_seq;
        inner.active_path = self.dir.join(new_active_name);

        Ok(())
    }
}

/// Lazy replay over a fixed snapshot of segment files.
pub struct ReplayIter {
    files: Vec<PathBuf>,
    next_file: usize,
    current: Option<std::io::Lines<BufReader<File>>>,
    current_path: Option<PathBuf>,
    line_no: usize,
    report: ReplayReport,
}

impl ReplayIter {
    fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            next_file: 0,
            current: None,
            current_path: None,
            line_no: 0,
            report: ReplayReport::default(),
        }
    }

    /// Counters accumulated so far (complete once the iterator is
    /// exhausted).
    pub fn report(&self) -> ReplayReport {
        self.report
    }

    fn advance_file(&mut self) -> bool {
        while self.next_file < self.files.len() {
            let path = self.files[self.next_file].clone();
            self.next_file += 1;
            match File::open(&path) {
                Ok(file) => {
                    self.current = Some(BufReader::new(file).lines());
                    self.current_path = Some(path);
                    self.line_no = 0;
                    return true;
                }
                Err(e) => {
                    eprintln!("Warning: cannot open segment {}: {}", path.display(), e);
                }
            }
        }
        false
    }
}

impl Iterator for ReplayIter {
    type Item = LogEntry;

    fn next(&mut self) -> Option<LogEntry> {
        loop {
            if self.current.is_none() && !self.advance_file() {
                return None;
            }

            match self.current.as_mut().and_then(|lines| lines.next()) {
                None => {
                    self.current = None;
                    continue;
                }
                Some(Err(e)) => {
                    if let Some(path) = &self.current_path {
                        eprintln!("Warning: read error in {}: {}", path.display(), e);
                    }
                    self.current = None;
                    continue;
                }
                Some(Ok(line)) => {
                    self.line_no += 1;
                    if line.trim().is_empty() {
                        continue;
                    }
                    match codec::decode_line(&line) {
                        Ok(entry) => {
                            self.report.entries += 1;
                            return Some(entry);
                        }
                        Err(e) => {
                            self.report.skipped += 1;
                            if let Some(path) = &self.current_path {
                                eprintln!(
                                    "Warning: skipping record in {} line {}: {}",
                                    path.display(),
                                    self.line_no,
                                    e
                                );
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Decodes one segment file, skipping and counting invalid records.
pub fn read_segment(path: &Path) -> StoreResult<(Vec<LogEntry>, ReplayReport)> {
    let file = File::open(path).map_err(|e| StoreError::IoError {
        operation: format!("open_segment: {}", path.display()),
        reason: e.to_string(),
    })?;

    let mut entries = Vec::new();
    let mut report = ReplayReport::default();

    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| StoreError::IoError {
            operation: format!("read_segment: {}", path.display()),
            reason: e.to_string(),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        match codec::decode_line(&line) {
            Ok(entry) => {
                entries.push(entry);
                report.entries += 1;
            }
            Err(_) => report.skipped += 1,
        }
    }

    Ok((entries, report))
}

/// Truncates a torn tail record: a final line without its newline, or a
/// final complete line that fails to decode. Earlier corrupt lines are
/// left in place for replay to skip.
fn truncate_torn_tail(path: &Path) -> StoreResult<()> {
    let bytes = std::fs::read(path).map_err(|e| StoreError::IoError {
        operation: format!("read_segment_for_recovery: {}", path.display()),
        reason: e.to_string(),
    })?;
    if bytes.is_empty() {
        return Ok(());
    }

    let truncate_at = if *bytes.last().expect("non-empty") != b'\n' {
        // Short write: drop the unterminated suffix.
        Some(bytes.iter().rposition(|b| *b == b'\n').map_or(0, |p| p + 1))
    } else {
        let body = &bytes[..bytes.len() - 1];
        let last_start = body.iter().rposition(|b| *b == b'\n').map_or(0, |p| p + 1);
        let last_line = String::from_utf8_lossy(&bytes[last_start..]);
        match codec::decode_line(&last_line) {
            Ok(_) => None,
            Err(_) => Some(last_start),
        }
    };

    if let Some(offset) = truncate_at {
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| StoreError::IoError {
                operation: format!("open_segment_for_truncation: {}", path.display()),
                reason: e.to_string(),
            })?;
        file.set_len(offset as u64).map_err(|e| StoreError::IoError {
            operation: format!("truncate_torn_tail: {}", path.display()),
            reason: e.to_string(),
        })?;
        file.sync_all().map_err(|e| StoreError::IoError {
            operation: "flush_truncation".to_string(),
            reason: e.to_string(),
        })?;
    }

    Ok(())
}

fn open_segment_file(path: &Path) -> StoreResult<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .read(true)
        .open(path)
        .map_err(|e| StoreError::IoError {
            operation: format!("open_segment: {}", path.display()),
            reason: e.to_string(),
        })
}

fn file_size(path: &Path) -> StoreResult<u64> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| StoreError::IoError {
            operation: format!("stat_segment: {}", path.display()),
            reason: e.to_string(),
        })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default()
}
