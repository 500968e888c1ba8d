use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process lifetime counters, reported when the scheduler stops
#[derive(Debug, Default)]
pub struct Stats {
    lines_read: AtomicU64,
    batches_written: AtomicU64,
    batches_delivered: AtomicU64,
    bytes_delivered: AtomicU64,
    delivery_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub lines_read: u64,
    pub batches_written: u64,
    pub batches_delivered: u64,
    pub bytes_delivered: u64,
    pub delivery_failures: u64,
}

impl Stats {
    pub fn record_lines(&self, lines: u64) {
        self.lines_read.fetch_add(lines, Ordering::Relaxed);
    }

    pub fn record_batch_written(&self) {
        self.batches_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery(&self, bytes: u64) {
        self.batches_delivered.fetch_add(1, Ordering::Relaxed);
        self.bytes_delivered.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            batches_delivered: self.batches_delivered.load(Ordering::Relaxed),
            bytes_delivered: self.bytes_delivered.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} lines read, {} batches written, {} delivered ({} bytes), {} failed attempts",
            self.lines_read,
            self.batches_written,
            self.batches_delivered,
            self.bytes_delivered,
            self.delivery_failures
        )
    }
}
