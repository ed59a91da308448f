use {
    crate::*,
    base::{Epoch, Vec2},
    image::{Image, PixelFormat},
    std::{
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
        thread::{self, JoinHandle},
        time::Duration,
    },
    tokio::task::JoinSet,
};

/// Everything the transfer worker shares with the rest of its pipeline.
pub struct WorkerContext {
    pub sensor: SensorId,
    pub delivery: DeliverySender,
    pub epoch: Epoch,
    pub stats: Arc<PipelineStats>,
    pub faulted: Arc<AtomicBool>,
    pub copy_timeout: Duration,
    pub drain_timeout: Duration,
    /// Size and format the pipeline was configured for.
    pub expected_size: Vec2<usize>,
    pub expected_format: PixelFormat,
}

impl WorkerContext {
    fn discard(&self, sequence: u64, reason: SkipReason) {
        match reason {
            SkipReason::Cancelled => self.stats.record_cancelled(),
            SkipReason::StaleTarget => self.stats.record_stale(),
            SkipReason::Dropped(_) => self.stats.record_dropped(),
        }
        self.delivery.skip(sequence, reason);
    }
}

/// How the worker loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerExit {
    /// Copies still running at shutdown that finished within the drain timeout.
    pub drained: usize,
    /// Copies aborted because the drain timeout ran out.
    pub forced: usize,
}

/// Render-side thread that turns capture requests into frames.
///
/// The thread runs a single-threaded tokio runtime. Each dequeued request
/// issues one copy; copies complete concurrently (up to the queue capacity),
/// so results may reach the delivery channel out of order.
pub struct PixelTransferWorker {
    handle: Option<JoinHandle<WorkerExit>>,
}

impl PixelTransferWorker {
    pub fn spawn(
        receiver: ReadbackReceiver,
        context: WorkerContext,
    ) -> Result<Self, CaptureError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        let handle = thread::Builder::new()
            .name(format!("pixel-transfer-{}", context.sensor.0))
            .spawn(move || runtime.block_on(run(receiver, Arc::new(context))))?;
        Ok(Self {
            handle: Some(handle),
        })
    }

    /// Wait for the worker to finish. The queue must be closed first.
    pub fn join(mut self) -> Result<WorkerExit, CaptureError> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| CaptureError::Defect("pixel transfer worker panicked".to_string())),
            None => Ok(WorkerExit::default()),
        }
    }
}

impl Drop for PixelTransferWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

async fn run(mut receiver: ReadbackReceiver, context: Arc<WorkerContext>) -> WorkerExit {
    log::debug!("{}: pixel transfer worker started", context.sensor);
    let mut copies = JoinSet::new();
    loop {
        tokio::select! {
            in_flight = receiver.dequeue() => match in_flight {
                Some(in_flight) => issue(&context, in_flight, &mut copies),
                None => break,
            },
            Some(joined) = copies.join_next(), if !copies.is_empty() => {
                // the task's pending frame was resolved when it unwound
                if let Err(error) = joined {
                    log::error!("{}: copy task failed: {}", context.sensor, error);
                }
            }
        }
    }
    let exit = drain(&context, &mut copies).await;
    log::debug!(
        "{}: pixel transfer worker stopped ({} drained, {} forced)",
        context.sensor,
        exit.drained,
        exit.forced
    );
    exit
}

fn issue(context: &Arc<WorkerContext>, in_flight: InFlight, copies: &mut JoinSet<()>) {
    let InFlight { request, slot } = in_flight;
    if let Err(reason) = admit(context, &request) {
        // free the slot before the consumer can observe the skip
        drop(slot);
        context.discard(request.sequence(), reason);
        return;
    }
    copies.spawn(complete(Arc::clone(context), request, slot));
}

fn admit(context: &WorkerContext, request: &CaptureRequest) -> Result<(), SkipReason> {
    let sequence = request.sequence();
    if request.is_cancelled(&context.epoch) {
        return Err(SkipReason::Cancelled);
    }
    let snapshot = request.snapshot();
    if let Err(error) = snapshot.check() {
        log::warn!("{}: frame {} not copied: {}", context.sensor, sequence, error);
        return Err(SkipReason::StaleTarget);
    }
    if snapshot.size() != context.expected_size || snapshot.format() != context.expected_format {
        log::warn!(
            "{}: frame {} not copied: target is {} {}, pipeline expects {} {} until restarted",
            context.sensor,
            sequence,
            snapshot.size(),
            snapshot.format(),
            context.expected_size,
            context.expected_format
        );
        return Err(SkipReason::StaleTarget);
    }
    Ok(())
}

/// Resolves one sequence number exactly once and owns its in-flight slot
/// until then.
///
/// A copy task that ends without resolving its frame (it panicked, or was
/// aborted by teardown) reports the frame as cancelled or stale when dropped,
/// so delivery never waits for it.
struct Pending {
    context: Arc<WorkerContext>,
    sequence: u64,
    epoch: u64,
    slot: InFlightSlot,
    resolved: bool,
}

impl Pending {
    fn new(context: Arc<WorkerContext>, request: &CaptureRequest, slot: InFlightSlot) -> Self {
        Self {
            context,
            sequence: request.sequence(),
            epoch: request.epoch(),
            slot,
            resolved: false,
        }
    }

    fn release_slot(&mut self) -> InFlightSlot {
        std::mem::replace(&mut self.slot, InFlightSlot::untracked())
    }

    fn discard(mut self, reason: SkipReason) {
        self.resolved = true;
        drop(self.release_slot());
        self.context.discard(self.sequence, reason);
    }

    /// Mark the frame as handled and hand over its slot.
    fn resolve(mut self) -> InFlightSlot {
        self.resolved = true;
        self.release_slot()
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        drop(self.release_slot());
        if self.context.epoch.is_current(self.epoch) {
            log::warn!(
                "{}: copy of frame {} ended without a result",
                self.context.sensor,
                self.sequence
            );
            self.context.discard(self.sequence, SkipReason::StaleTarget);
        } else {
            self.context.discard(self.sequence, SkipReason::Cancelled);
        }
    }
}

async fn complete(context: Arc<WorkerContext>, request: CaptureRequest, slot: InFlightSlot) {
    let sequence = request.sequence();
    let pending = Pending::new(Arc::clone(&context), &request, slot);
    let readback = request.snapshot().copy();
    let data = match tokio::time::timeout(context.copy_timeout, readback).await {
        Ok(Ok(data)) => data,
        Ok(Err(error)) => {
            log::warn!("{}: readback of frame {} failed: {}", context.sensor, sequence, error);
            pending.discard(SkipReason::StaleTarget);
            return;
        }
        Err(_) => {
            log::warn!(
                "{}: readback of frame {} timed out after {:?}",
                context.sensor,
                sequence,
                context.copy_timeout
            );
            pending.discard(SkipReason::StaleTarget);
            return;
        }
    };

    // the fence has passed; recheck everything that may have changed meanwhile
    if request.is_cancelled(&context.epoch) {
        pending.discard(SkipReason::Cancelled);
        return;
    }
    if let Err(error) = request.snapshot().check() {
        log::warn!("{}: frame {} discarded: {}", context.sensor, sequence, error);
        pending.discard(SkipReason::StaleTarget);
        return;
    }

    let snapshot = request.snapshot();
    let image = Image::new(snapshot.size(), data, snapshot.format());
    match Frame::new(request.sensor(), sequence, request.tick(), image) {
        Ok(frame) => {
            log::debug!("{}: frame {} ready", context.sensor, sequence);
            let slot = pending.resolve();
            if !context.delivery.push(frame, slot) {
                log::debug!("{}: consumer gone, frame {} released", context.sensor, sequence);
            }
        }
        Err(error) => {
            log::error!("{}: {}", context.sensor, error);
            context.faulted.store(true, Ordering::Release);
            context.stats.record_fault();
            drop(pending.resolve());
            context.delivery.fault(sequence, error);
        }
    }
}

async fn drain(context: &WorkerContext, copies: &mut JoinSet<()>) -> WorkerExit {
    let running = copies.len();
    if running == 0 {
        return WorkerExit::default();
    }
    let wait_all = async {
        while copies.join_next().await.is_some() {}
    };
    if tokio::time::timeout(context.drain_timeout, wait_all).await.is_ok() {
        return WorkerExit {
            drained: running,
            forced: 0,
        };
    }
    let forced = copies.len();
    log::warn!(
        "{}: {} copies still running after {:?}, aborting",
        context.sensor,
        forced,
        context.drain_timeout
    );
    copies.abort_all();
    while copies.join_next().await.is_some() {}
    context.stats.record_forced(forced as u64);
    WorkerExit {
        drained: running - forced,
        forced,
    }
}
