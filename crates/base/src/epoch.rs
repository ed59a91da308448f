use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// A shared generation counter used to cancel in-flight work.
///
/// Work items record the epoch current at creation. Advancing the epoch (on
/// teardown or restart) makes every earlier item stale, and each stage drops
/// stale items on its own the next time it looks at them.
#[derive(Clone, Debug)]
pub struct Epoch {
    value: Arc<AtomicU64>,
}

impl Default for Epoch {
    fn default() -> Self {
        Self::new()
    }
}

impl Epoch {
    pub fn new() -> Self {
        Self {
            value: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn current(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    /// Advance to the next epoch and return it.
    pub fn advance(&self) -> u64 {
        self.value.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        epoch == self.current()
    }
}
