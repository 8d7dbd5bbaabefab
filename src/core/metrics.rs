use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::Serialize;

/// Live metrics of one job run.
///
/// Counters are monotonic and only ever incremented by the job's own loop;
/// monitors sample them concurrently, so everything is stored in atomics.
/// Timestamps are kept as milliseconds since the Unix epoch, zero meaning
/// "not set yet".
#[derive(Debug, Default)]
pub struct JobMetrics {
    start_millis: AtomicU64,
    end_millis: AtomicU64,
    read_count: AtomicU64,
    write_count: AtomicU64,
    filter_count: AtomicU64,
    error_count: AtomicU64,
}

impl JobMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn mark_start(&self) {
        self.start_millis.store(epoch_millis(), Ordering::Relaxed);
    }

    pub(crate) fn mark_end(&self) {
        self.end_millis.store(epoch_millis(), Ordering::Relaxed);
    }

    /// Increments the read count and returns the new total, which doubles
    /// as the sequence number of the record that was just read.
    pub(crate) fn inc_read_count(&self) -> u64 {
        self.read_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn inc_filter_count(&self) {
        self.filter_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the error count by `count` and returns the new total for
    /// the caller's threshold check.
    pub(crate) fn add_error_count(&self, count: u64) -> u64 {
        self.error_count.fetch_add(count, Ordering::Relaxed) + count
    }

    pub(crate) fn add_write_count(&self, count: u64) {
        self.write_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn read_count(&self) -> u64 {
        self.read_count.load(Ordering::Relaxed)
    }

    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    pub fn filter_count(&self) -> u64 {
        self.filter_count.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn start_time(&self) -> Option<SystemTime> {
        from_millis(self.start_millis.load(Ordering::Relaxed))
    }

    pub fn end_time(&self) -> Option<SystemTime> {
        from_millis(self.end_millis.load(Ordering::Relaxed))
    }

    /// Freezes the current values into a plain snapshot.
    pub fn snapshot(&self) -> JobMetricsSnapshot {
        JobMetricsSnapshot {
            read_count: self.read_count(),
            write_count: self.write_count(),
            filter_count: self.filter_count(),
            error_count: self.error_count(),
            start_time: self.start_time(),
            end_time: self.end_time(),
        }
    }
}

/// Point-in-time view of [`JobMetrics`], as embedded in a job report.
#[derive(Debug, Clone, Serialize)]
pub struct JobMetricsSnapshot {
    pub read_count: u64,
    pub write_count: u64,
    pub filter_count: u64,
    pub error_count: u64,
    pub start_time: Option<SystemTime>,
    pub end_time: Option<SystemTime>,
}

impl JobMetricsSnapshot {
    /// Wall-clock duration of the run, if it has both started and ended.
    pub fn duration(&self) -> Option<Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => end.duration_since(start).ok(),
            _ => None,
        }
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn from_millis(millis: u64) -> Option<SystemTime> {
    if millis == 0 {
        None
    } else {
        Some(UNIX_EPOCH + Duration::from_millis(millis))
    }
}
