//! # Status Log
//!
//! Human-readable, timestamped record of connection events and failures,
//! written from both the network runtime and the UI thread and shown by the
//! panel. It is never consulted for control flow.

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Default number of entries kept before the oldest are discarded.
pub const DEFAULT_STATUS_CAPACITY: usize = 256;

/// One row of the status log.
#[derive(Debug, Clone)]
pub struct StatusEntry {
    pub at: DateTime<Local>,
    pub text: String,
}

impl fmt::Display for StatusEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.at.format("%H:%M:%S"), self.text)
    }
}

/// Bounded append-only log with an "updated since last look" flag.
pub struct StatusLog {
    entries: Mutex<VecDeque<StatusEntry>>,
    capacity: usize,
    updated: AtomicBool,
}

impl StatusLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity,
            updated: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<StatusEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a row stamped with the current local time.
    pub fn record(&self, text: impl Into<String>) {
        let entry = StatusEntry {
            at: Local::now(),
            text: text.into(),
        };
        {
            let mut entries = self.lock();
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
        self.updated.store(true, Ordering::Release);
    }

    pub fn snapshot(&self) -> Vec<StatusEntry> {
        self.lock().iter().cloned().collect()
    }

    /// Returns whether anything was recorded since the previous call.
    pub fn take_updated(&self) -> bool {
        self.updated.swap(false, Ordering::AcqRel)
    }

    /// All rows, oldest first, one per line.
    pub fn readable(&self) -> String {
        self.lock()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for StatusLog {
    fn default() -> Self {
        Self::new(DEFAULT_STATUS_CAPACITY)
    }
}
