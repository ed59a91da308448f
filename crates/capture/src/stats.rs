use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every stage of one pipeline.
#[derive(Debug, Default)]
pub struct PipelineStats {
    requested: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    stale: AtomicU64,
    cancelled: AtomicU64,
    faults: AtomicU64,
    forced: AtomicU64,
}

/// Point-in-time copy of `PipelineStats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// `request_capture` calls, accepted or not.
    pub requested: u64,
    /// Requests refused at dispatch.
    pub dropped: u64,
    pub delivered: u64,
    /// Requests discarded because the render target changed or the copy failed.
    pub stale: u64,
    pub cancelled: u64,
    pub faults: u64,
    /// Copies aborted when teardown ran out of time.
    pub forced: u64,
}

impl PipelineStats {
    pub(crate) fn record_requested(&self) {
        self.requested.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale(&self) {
        self.stale.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_forced(&self, count: u64) {
        self.forced.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requested: self.requested.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            forced: self.forced.load(Ordering::Relaxed),
        }
    }
}
