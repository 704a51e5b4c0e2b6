//! Shared copy statistics

use crate::fs::EntryKind;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Point-in-time copy of the pipeline counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Regular files handed to workers
    pub regular_files: u64,
    /// FIFOs handed to workers
    pub fifo_files: u64,
    /// Directories below the source root
    pub directories: u64,
    /// Other entries (symlinks, devices, sockets) handed to workers
    pub other_files: u64,
    /// Bytes written by successful copies
    pub total_bytes: u64,
    /// Tasks whose copy completed
    pub files_copied: u64,
    /// Entries skipped because an open failed
    pub skipped: u64,
    /// Tasks dropped without a completed copy
    pub abandoned: u64,
}

impl StatsSnapshot {
    /// Total entries handed to workers
    pub fn enqueued(&self) -> u64 {
        self.regular_files + self.fifo_files + self.other_files
    }
}

/// Counters shared by the manager and the workers
///
/// Every update takes the same lock; it is never held across I/O.
#[derive(Debug, Default)]
pub struct CopyStatistics {
    counters: Mutex<StatsSnapshot>,
}

impl CopyStatistics {
    /// Create zeroed statistics
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StatsSnapshot> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count an entry accepted by the queue
    pub fn record_entry(&self, kind: EntryKind) {
        let mut counters = self.lock();
        match kind {
            EntryKind::Regular => counters.regular_files += 1,
            EntryKind::Fifo => counters.fifo_files += 1,
            EntryKind::Other => counters.other_files += 1,
        }
    }

    /// Count a directory below the source root
    pub fn record_directory(&self) {
        self.lock().directories += 1;
    }

    /// Credit a completed copy
    pub fn record_copy(&self, bytes: u64) {
        let mut counters = self.lock();
        counters.total_bytes += bytes;
        counters.files_copied += 1;
    }

    /// Count an entry whose handles could not be opened
    pub fn record_skipped(&self) {
        self.lock().skipped += 1;
    }

    /// Count a task dropped without a completed copy
    pub fn record_abandoned(&self) {
        self.lock().abandoned += 1;
    }

    /// Read all counters at once
    pub fn snapshot(&self) -> StatsSnapshot {
        *self.lock()
    }
}
