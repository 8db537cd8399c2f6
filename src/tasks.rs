// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Background task lifecycle.
//!
//! Long-lived work (heartbeats, sweeps, compaction scheduling, the
//! replication shipper) runs on plain threads carrying a shared stop
//! flag. Threads poll the flag between units of work, so a shutdown
//! request is observed within one poll interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// How often sleeping tasks re-check their stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Handle to one background thread.
pub struct TaskHandle {
    label: String,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TaskHandle {
    /// Wraps an already-spawned thread and its stop flag.
    pub fn new(label: &str, stop: Arc<AtomicBool>, handle: JoinHandle<()>) -> Self {
        Self {
            label: label.to_string(),
            stop,
            handle: Some(handle),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Signals the thread to stop and joins it.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Spawns a thread that runs `tick` once per `interval` until stopped.
///
/// The first tick fires immediately; afterwards the thread sleeps in
/// short slices so it can observe a stop request promptly.
pub fn spawn_periodic<F>(label: &str, interval: Duration, mut tick: F) -> TaskHandle
where
    F: FnMut() + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let handle = std::thread::spawn(move || {
        let mut last_tick: Option<Instant> = None;
        while !stop_flag.load(Ordering::SeqCst) {
            let due = match last_tick {
                None => true,
                Some(at) => at.elapsed() >= interval,
            };
            if due {
                tick();
                last_tick = Some(Instant::now());
            }
            std::thread::sleep(POLL_INTERVAL.min(interval));
        }
    });

    TaskHandle::new(label, stop, handle)
}
