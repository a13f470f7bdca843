//! Scan metrics.
//!
//! Four monotonically increasing counters updated with relaxed atomic adds
//! from every worker. Counters are independently atomic, not transactional:
//! read a [`MetricsSnapshot`] after scanning completes for consistent totals.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Shared scan counters. A file is counted either scanned or skipped, never
/// both.
#[derive(Debug, Default)]
pub struct ScanMetrics {
    files_scanned: AtomicU64,
    files_skipped: AtomicU64,
    bytes_scanned: AtomicU64,
    matches_found: AtomicU64,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one successfully scanned file and the bytes it contributed.
    pub(crate) fn record_scanned(&self, bytes: u64) {
        self.files_scanned.fetch_add(1, Ordering::Relaxed);
        self.bytes_scanned.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records one skipped file (binary, empty, oversized, or unreadable).
    pub(crate) fn record_skipped(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records matches emitted for one file.
    pub(crate) fn record_matches(&self, count: u64) {
        self.matches_found.fetch_add(count, Ordering::Relaxed);
    }

    /// Returns the current counter values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_scanned: self.files_scanned.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            bytes_scanned: self.bytes_scanned.load(Ordering::Relaxed),
            matches_found: self.matches_found.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the scan counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub files_scanned: u64,
    pub files_skipped: u64,
    pub bytes_scanned: u64,
    pub matches_found: u64,
}
