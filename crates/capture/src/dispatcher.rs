use {
    crate::*,
    base::Epoch,
    std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

/// Entry point used by a sensor once per tick.
///
/// Decides whether a tick's frame is captured or dropped and numbers every
/// request. Dropping never blocks: when `max_in_flight` captures are
/// outstanding the tick is skipped and its sequence number is reported to the
/// delivery channel as skipped.
pub struct FrameDispatcher {
    sensor: SensorId,
    queue: ReadbackQueue,
    delivery: DeliverySender,
    target: Arc<dyn RenderTarget>,
    lease: TargetLease,
    epoch: Epoch,
    faulted: Arc<AtomicBool>,
    stats: Arc<PipelineStats>,
    last_tick: Option<u64>,
}

impl FrameDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        sensor: SensorId,
        queue: ReadbackQueue,
        delivery: DeliverySender,
        target: Arc<dyn RenderTarget>,
        lease: TargetLease,
        epoch: Epoch,
        faulted: Arc<AtomicBool>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            sensor,
            queue,
            delivery,
            target,
            lease,
            epoch,
            faulted,
            stats,
            last_tick: None,
        }
    }

    /// Request a capture of the render target's current contents.
    pub fn request_capture(&mut self, tick: Tick) -> Result<u64, Dropped> {
        if let Some(last) = self.last_tick {
            if tick.index <= last {
                log::warn!(
                    "{}: tick {} does not advance past tick {}",
                    self.sensor,
                    tick.index,
                    last
                );
            }
        }
        self.last_tick = Some(tick.index);
        self.stats.record_requested();

        let sequence = self.delivery.allocate();
        let reason = if self.faulted.load(Ordering::Acquire) {
            DropReason::Faulted
        } else {
            let snapshot = TargetSnapshot::leased(Arc::clone(&self.target), &self.lease);
            let epoch = self.epoch.current();
            let request = CaptureRequest::new(self.sensor, sequence, tick, snapshot, epoch);
            if self.queue.try_enqueue(request) {
                log::debug!(
                    "{}: tick {} dispatched as frame {}",
                    self.sensor,
                    tick.index,
                    sequence
                );
                return Ok(sequence);
            }
            if self.queue.is_closed() {
                DropReason::Stopped
            } else {
                DropReason::QueueFull
            }
        };

        self.stats.record_dropped();
        self.delivery.skip(sequence, SkipReason::Dropped(reason));
        log::debug!("{}: tick {} dropped ({})", self.sensor, tick.index, reason);
        Err(Dropped {
            tick: tick.index,
            sequence,
            reason,
        })
    }

    /// Refuse every later request with `DropReason::Stopped` and let the
    /// worker drain what is already queued.
    pub fn close(&mut self) {
        self.queue.close();
    }

    pub fn sensor(&self) -> SensorId {
        self.sensor
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Snapshots of the render target still held by requests.
    pub fn outstanding_snapshots(&self) -> usize {
        self.lease.outstanding()
    }

    /// Captures dispatched and not yet delivered or discarded.
    pub fn in_flight(&self) -> usize {
        self.queue.in_flight()
    }
}
