use {
    crate::*,
    image::Image,
    std::{collections::HashMap, path::Path, sync::Arc},
};

/// Receives delivered frames, in sequence order.
///
/// A slow publisher throttles its pipeline: frames it has not taken keep
/// their in-flight slots.
pub trait FramePublisher: Send {
    fn on_frame_ready(&mut self, frame: Frame);
}

impl<F: FnMut(Frame) + Send> FramePublisher for F {
    fn on_frame_ready(&mut self, frame: Frame) {
        self(frame)
    }
}

/// Lifecycle shared by every capturing sensor.
pub trait Sensor {
    /// Replace the configuration. Only allowed before the sensor starts.
    fn configure(&mut self, config: CaptureConfig) -> Result<(), CaptureError>;

    /// Called once per simulation tick.
    fn on_tick(&mut self, tick: Tick) -> Result<TickOutcome, CaptureError>;

    fn teardown(&mut self) -> Result<TeardownReport, CaptureError>;
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    /// Sequence number of this tick's capture, or why it was dropped.
    pub capture: Result<u64, Dropped>,
    /// Frames handed to the publisher during the tick.
    pub published: usize,
}

/// Sensor that captures a render target every tick and publishes the frames.
///
/// All setters must be called before `begin_play`.
pub struct SceneCaptureSensor<P: FramePublisher> {
    id: SensorId,
    config: CaptureConfig,
    target: Arc<dyn RenderTarget>,
    publisher: P,
    pipeline: Option<CapturePipeline>,
}

impl<P: FramePublisher> SceneCaptureSensor<P> {
    pub fn new(id: SensorId, target: Arc<dyn RenderTarget>, publisher: P) -> Self {
        Self {
            id,
            config: CaptureConfig::default(),
            target,
            publisher,
            pipeline: None,
        }
    }

    pub fn id(&self) -> SensorId {
        self.id
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }

    pub fn stats(&self) -> Option<StatsSnapshot> {
        self.pipeline.as_ref().map(|pipeline| pipeline.stats())
    }

    fn ensure_stopped(&self) -> Result<(), CaptureError> {
        if self.pipeline.is_some() {
            return Err(CaptureError::AlreadyStarted);
        }
        Ok(())
    }

    /// Apply sensor attributes, see `CaptureConfig::with_attributes`.
    pub fn set(&mut self, attributes: &HashMap<String, String>) -> Result<(), CaptureError> {
        self.ensure_stopped()?;
        self.config = self.config.clone().with_attributes(attributes)?;
        Ok(())
    }

    pub fn set_image_size(&mut self, width: u32, height: u32) -> Result<(), CaptureError> {
        self.ensure_stopped()?;
        self.config = self.config.clone().with_size(width, height);
        Ok(())
    }

    pub fn image_width(&self) -> u32 {
        self.config.width()
    }

    pub fn image_height(&self) -> u32 {
        self.config.height()
    }

    pub fn enable_post_processing_effects(&mut self, enable: bool) -> Result<(), CaptureError> {
        self.ensure_stopped()?;
        self.config = self.config.clone().with_post_processing(enable);
        Ok(())
    }

    pub fn are_post_processing_effects_enabled(&self) -> bool {
        self.config.post_processing()
    }

    pub fn set_fov_angle(&mut self, fov_angle: f32) -> Result<(), CaptureError> {
        self.ensure_stopped()?;
        self.config = self.config.clone().with_fov_angle(fov_angle);
        Ok(())
    }

    pub fn fov_angle(&self) -> f32 {
        self.config.fov_angle()
    }

    /// Start capturing. Configuration errors surface here, before any capture.
    pub fn begin_play(&mut self) -> Result<(), CaptureError> {
        self.ensure_stopped()?;
        let pipeline =
            CapturePipeline::start(self.id, self.config.clone(), Arc::clone(&self.target))?;
        self.pipeline = Some(pipeline);
        Ok(())
    }

    /// Stop capturing. Frames not yet published are discarded.
    pub fn end_play(&mut self) -> Result<TeardownReport, CaptureError> {
        match self.pipeline.take() {
            Some(pipeline) => pipeline.teardown(),
            None => Ok(TeardownReport::default()),
        }
    }

    /// Publish every frame that is already complete, without waiting.
    pub fn publish_ready(&mut self) -> Result<usize, CaptureError> {
        let pipeline = self.pipeline.as_mut().ok_or(CaptureError::NotStarted)?;
        let mut published = 0;
        while let Some(frame) = pipeline.try_pop()? {
            self.publisher.on_frame_ready(frame);
            published += 1;
        }
        Ok(published)
    }

    /// Debug readback of the current render target contents.
    pub fn read_pixels(&self) -> Result<Image, CaptureError> {
        read_pixels(self.target.as_ref())
    }

    /// Debug readback of the current render target contents, written to disk.
    pub fn save_capture_to_disk(&self, path: impl AsRef<Path>) -> Result<(), CaptureError> {
        save_pixels_to_disk(self.target.as_ref(), path)
    }

    fn tick_synchronous(&mut self, tick: Tick) -> Result<TickOutcome, CaptureError> {
        let pipeline = self.pipeline.as_mut().ok_or(CaptureError::NotStarted)?;
        let capture = pipeline.request_capture(tick);
        let mut published = 0;
        if let Ok(sequence) = capture {
            // wait for this tick's frame; earlier frames come first
            while let Some(frame) = pipeline.blocking_pop()? {
                let done = frame.sequence() >= sequence;
                self.publisher.on_frame_ready(frame);
                published += 1;
                if done {
                    break;
                }
            }
        }
        Ok(TickOutcome { capture, published })
    }

    fn tick_asynchronous(&mut self, tick: Tick) -> Result<TickOutcome, CaptureError> {
        let published = self.publish_ready()?;
        let pipeline = self.pipeline.as_mut().ok_or(CaptureError::NotStarted)?;
        let capture = pipeline.request_capture(tick);
        Ok(TickOutcome { capture, published })
    }
}

impl<P: FramePublisher> Sensor for SceneCaptureSensor<P> {
    fn configure(&mut self, config: CaptureConfig) -> Result<(), CaptureError> {
        self.ensure_stopped()?;
        self.config = config;
        Ok(())
    }

    /// Never fails because of a single frame: drops, stale targets and
    /// cancellations show up in the outcome or the stats. Errors mean the
    /// sensor is not running or the pipeline hit a defect.
    fn on_tick(&mut self, tick: Tick) -> Result<TickOutcome, CaptureError> {
        match self.config.delivery() {
            DeliveryMode::Synchronous => self.tick_synchronous(tick),
            DeliveryMode::Asynchronous => self.tick_asynchronous(tick),
        }
    }

    fn teardown(&mut self) -> Result<TeardownReport, CaptureError> {
        self.end_play()
    }
}
