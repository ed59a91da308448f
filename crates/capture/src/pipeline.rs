use {
    crate::*,
    base::Epoch,
    std::{
        sync::{Arc, atomic::AtomicBool},
        time::{Duration, Instant},
    },
};

/// Outcome of tearing a pipeline down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TeardownReport {
    /// Sequence numbers dispatched but not yet resolved for the consumer.
    pub outstanding: u64,
    /// Requests discarded because of the teardown.
    pub cancelled: u64,
    /// Copies aborted after the drain timeout.
    pub forced: usize,
    pub elapsed: Duration,
}

/// A running capture pipeline for one sensor: dispatcher, readback queue,
/// transfer worker thread and delivery channel.
pub struct CapturePipeline {
    sensor: SensorId,
    config: CaptureConfig,
    target: Arc<dyn RenderTarget>,
    epoch: Epoch,
    stats: Arc<PipelineStats>,
    dispatcher: FrameDispatcher,
    worker: Option<PixelTransferWorker>,
    delivery: DeliveryChannel,
    finished: bool,
}

impl CapturePipeline {
    /// Validate `config` against `target` and start the transfer worker.
    ///
    /// # Errors
    ///
    /// Returns `FatalConfig` if the configuration is invalid or the render
    /// target does not have the configured size and format. Nothing is
    /// started in that case.
    pub fn start(
        sensor: SensorId,
        config: CaptureConfig,
        target: Arc<dyn RenderTarget>,
    ) -> Result<Self, CaptureError> {
        config.validate()?;
        if !target.is_valid() {
            return Err(CaptureError::FatalConfig(format!("{sensor}: render target is not valid")));
        }
        if target.size() != config.size() || target.format() != config.format() {
            return Err(CaptureError::FatalConfig(format!(
                "{sensor}: render target is {} {}, configured {} {}",
                target.size(),
                target.format(),
                config.size(),
                config.format()
            )));
        }

        let epoch = Epoch::new();
        let stats = Arc::new(PipelineStats::default());
        let faulted = Arc::new(AtomicBool::new(false));
        let (queue, receiver) = readback_queue(config.max_in_flight());
        let (delivery_sender, delivery) = delivery_channel(Arc::clone(&stats));

        let worker = PixelTransferWorker::spawn(
            receiver,
            WorkerContext {
                sensor,
                delivery: delivery_sender.clone(),
                epoch: epoch.clone(),
                stats: Arc::clone(&stats),
                faulted: Arc::clone(&faulted),
                copy_timeout: config.copy_timeout(),
                drain_timeout: config.drain_timeout(),
                expected_size: config.size(),
                expected_format: config.format(),
            },
        )?;
        let dispatcher = FrameDispatcher::new(
            sensor,
            queue,
            delivery_sender,
            Arc::clone(&target),
            TargetLease::default(),
            epoch.clone(),
            faulted,
            Arc::clone(&stats),
        );

        log::info!(
            "{sensor}: capture pipeline started ({} {}, max {} in flight)",
            config.size(),
            config.format(),
            config.max_in_flight()
        );
        Ok(Self {
            sensor,
            config,
            target,
            epoch,
            stats,
            dispatcher,
            worker: Some(worker),
            delivery,
            finished: false,
        })
    }

    pub fn sensor(&self) -> SensorId {
        self.sensor
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    /// See `FrameDispatcher::request_capture`.
    pub fn request_capture(&mut self, tick: Tick) -> Result<u64, Dropped> {
        self.dispatcher.request_capture(tick)
    }

    pub async fn pop(&mut self) -> Result<Option<Frame>, CaptureError> {
        self.delivery.pop().await
    }

    pub fn blocking_pop(&mut self) -> Result<Option<Frame>, CaptureError> {
        self.delivery.blocking_pop()
    }

    pub fn try_pop(&mut self) -> Result<Option<Frame>, CaptureError> {
        self.delivery.try_pop()
    }

    pub fn delivery(&mut self) -> &mut DeliveryChannel {
        &mut self.delivery
    }

    /// Cancel outstanding requests, drain the worker and release the render target.
    ///
    /// Waits at most the drain timeout for running copies, then aborts them.
    ///
    /// # Errors
    ///
    /// Returns `Defect` if a request still references the render target
    /// afterwards, or if the worker panicked.
    pub fn teardown(mut self) -> Result<TeardownReport, CaptureError> {
        self.shutdown()
    }

    /// Tear down and start again with a new configuration on the same target.
    pub fn restart(self, config: CaptureConfig) -> Result<(Self, TeardownReport), CaptureError> {
        let sensor = self.sensor;
        let target = Arc::clone(&self.target);
        let report = self.teardown()?;
        Ok((Self::start(sensor, config, target)?, report))
    }

    fn shutdown(&mut self) -> Result<TeardownReport, CaptureError> {
        if self.finished {
            return Ok(TeardownReport::default());
        }
        self.finished = true;
        let started = Instant::now();
        let outstanding = self.delivery.outstanding();
        let cancelled_before = self.stats.snapshot().cancelled;

        self.epoch.advance();
        // the worker drains the queue and exits once it is closed
        self.dispatcher.close();
        let exit = match self.worker.take() {
            Some(worker) => worker.join()?,
            None => WorkerExit::default(),
        };

        let report = TeardownReport {
            outstanding,
            cancelled: self.stats.snapshot().cancelled - cancelled_before,
            forced: exit.forced,
            elapsed: started.elapsed(),
        };
        let leaked = self.dispatcher.outstanding_snapshots();
        if leaked > 0 {
            return Err(CaptureError::Defect(format!(
                "{}: {} capture requests still reference the render target after teardown",
                self.sensor, leaked
            )));
        }
        log::info!(
            "{}: capture pipeline stopped ({} outstanding, {} cancelled, {} forced, {:?})",
            self.sensor,
            report.outstanding,
            report.cancelled,
            report.forced,
            report.elapsed
        );
        Ok(report)
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        if let Err(error) = self.shutdown() {
            log::error!("{}: teardown failed: {}", self.sensor, error);
        }
    }
}
