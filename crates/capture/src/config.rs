use {
    crate::*,
    base::Vec2,
    image::PixelFormat,
    std::{collections::HashMap, str::FromStr, time::Duration},
};

/// Largest accepted render target edge, in pixels.
pub const MAX_IMAGE_DIMENSION: u32 = 16384;

/// Upper bound for `max_in_flight`.
pub const MAX_IN_FLIGHT_LIMIT: usize = 16;

/// How a sensor hands frames to its publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Dispatch, then wait for this tick's frame before the tick returns.
    #[default]
    Synchronous,
    /// Publish whatever has already completed, then dispatch. Never waits.
    Asynchronous,
}

impl FromStr for DeliveryMode {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sync" | "synchronous" | "true" => Ok(DeliveryMode::Synchronous),
            "async" | "asynchronous" | "false" => Ok(DeliveryMode::Asynchronous),
            other => Err(CaptureError::FatalConfig(format!("unknown delivery mode '{other}'"))),
        }
    }
}

/// Configuration for a capture pipeline. Fixed once the pipeline starts.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureConfig {
    width: u32,
    height: u32,
    format: PixelFormat,
    max_in_flight: usize,
    copy_timeout: Duration,
    drain_timeout: Duration,
    fov_angle: f32,
    post_processing: bool,
    delivery: DeliveryMode,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            format: PixelFormat::Bgra8,
            max_in_flight: 1,
            copy_timeout: Duration::from_secs(2),
            drain_timeout: Duration::from_millis(500),
            fov_angle: 90.0,
            post_processing: true,
            delivery: DeliveryMode::Synchronous,
        }
    }
}

impl CaptureConfig {
    /// Set the image width in pixels.
    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    /// Set the image height in pixels.
    pub fn with_height(mut self, height: u32) -> Self {
        self.height = height;
        self
    }

    pub fn with_size(self, width: u32, height: u32) -> Self {
        self.with_width(width).with_height(height)
    }

    /// Set the pixel format read back from the render target.
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Set how many captures may be outstanding at once.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Set how long a single GPU copy may take before the frame is discarded.
    pub fn with_copy_timeout(mut self, copy_timeout: Duration) -> Self {
        self.copy_timeout = copy_timeout;
        self
    }

    /// Set how long teardown waits for outstanding copies before aborting them.
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Set the horizontal field of view in degrees.
    pub fn with_fov_angle(mut self, fov_angle: f32) -> Self {
        self.fov_angle = fov_angle;
        self
    }

    /// Enable or disable the scene's post-processing effects.
    pub fn with_post_processing(mut self, enabled: bool) -> Self {
        self.post_processing = enabled;
        self
    }

    pub fn with_delivery(mut self, delivery: DeliveryMode) -> Self {
        self.delivery = delivery;
        self
    }

    // Getters
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> Vec2<usize> {
        Vec2::new(self.width as usize, self.height as usize)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn copy_timeout(&self) -> Duration {
        self.copy_timeout
    }

    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    pub fn fov_angle(&self) -> f32 {
        self.fov_angle
    }

    pub fn post_processing(&self) -> bool {
        self.post_processing
    }

    pub fn delivery(&self) -> DeliveryMode {
        self.delivery
    }

    /// Bytes in one frame: width * height * bytes-per-pixel.
    pub fn frame_len(&self) -> usize {
        self.size().area() * self.format.bytes_per_pixel()
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::FatalConfig(format!(
                "image size {}x{} must be non-zero",
                self.width, self.height
            )));
        }
        if self.width > MAX_IMAGE_DIMENSION || self.height > MAX_IMAGE_DIMENSION {
            return Err(CaptureError::FatalConfig(format!(
                "image size {}x{} exceeds {MAX_IMAGE_DIMENSION}",
                self.width, self.height
            )));
        }
        if self.max_in_flight == 0 || self.max_in_flight > MAX_IN_FLIGHT_LIMIT {
            return Err(CaptureError::FatalConfig(format!(
                "max_in_flight {} must be in 1..={MAX_IN_FLIGHT_LIMIT}",
                self.max_in_flight
            )));
        }
        if !(self.fov_angle > 0.0 && self.fov_angle < 180.0) {
            return Err(CaptureError::FatalConfig(format!(
                "field of view {} must be between 0 and 180 degrees",
                self.fov_angle
            )));
        }
        if self.copy_timeout.is_zero() || self.drain_timeout.is_zero() {
            return Err(CaptureError::FatalConfig(
                "copy and drain timeouts must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Build a configuration from sensor attributes, starting at the defaults.
    pub fn from_attributes(attributes: &HashMap<String, String>) -> Result<Self, CaptureError> {
        Self::default().with_attributes(attributes)
    }

    /// Apply sensor attributes on top of this configuration.
    ///
    /// Recognized keys: `image_size_x`, `image_size_y`, `fov`,
    /// `enable_postprocess_effects`, `pixel_format`, `max_in_flight`,
    /// `copy_timeout_ms`, `drain_timeout_ms`, `sync_mode`. Other keys are ignored.
    pub fn with_attributes(
        mut self,
        attributes: &HashMap<String, String>,
    ) -> Result<Self, CaptureError> {
        for (key, value) in attributes {
            match key.as_str() {
                "image_size_x" => self.width = parse_attribute(key, value)?,
                "image_size_y" => self.height = parse_attribute(key, value)?,
                "fov" => self.fov_angle = parse_attribute(key, value)?,
                "enable_postprocess_effects" => self.post_processing = parse_flag(key, value)?,
                "pixel_format" => {
                    self.format = PixelFormat::from_name(value).ok_or_else(|| {
                        CaptureError::FatalConfig(format!("unknown pixel format '{value}'"))
                    })?
                }
                "max_in_flight" => self.max_in_flight = parse_attribute(key, value)?,
                "copy_timeout_ms" => {
                    self.copy_timeout = Duration::from_millis(parse_attribute(key, value)?)
                }
                "drain_timeout_ms" => {
                    self.drain_timeout = Duration::from_millis(parse_attribute(key, value)?)
                }
                "sync_mode" => self.delivery = value.parse()?,
                _ => log::debug!("ignoring capture attribute '{key}'"),
            }
        }
        Ok(self)
    }
}

fn parse_attribute<T: FromStr>(key: &str, value: &str) -> Result<T, CaptureError> {
    value
        .trim()
        .parse()
        .map_err(|_| CaptureError::FatalConfig(format!("invalid value '{value}' for '{key}'")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, CaptureError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(CaptureError::FatalConfig(format!(
            "invalid flag '{value}' for '{key}'"
        ))),
    }
}
