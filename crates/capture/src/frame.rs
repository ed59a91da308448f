use {
    crate::*,
    base::Vec2,
    image::{Image, PixelFormat},
    std::fmt,
};

/// Identity of a capturing sensor, stamped into every request and frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SensorId(pub u32);

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sensor#{}", self.0)
    }
}

/// One simulation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub index: u64,
    /// Simulation time in seconds.
    pub time: f64,
}

impl Tick {
    pub fn new(index: u64, time: f64) -> Self {
        Self { index, time }
    }

    /// Tick `index` of a fixed-step simulation.
    pub fn at_rate(index: u64, delta_seconds: f64) -> Self {
        Self::new(index, index as f64 * delta_seconds)
    }
}

/// A captured frame. The buffer is owned exclusively by the frame; dropping
/// the frame releases it.
#[derive(Debug)]
pub struct Frame {
    sensor: SensorId,
    sequence: u64,
    tick: Tick,
    image: Image,
}

impl Frame {
    /// Wrap a readback buffer.
    ///
    /// A buffer whose length disagrees with its size and format is a
    /// `Defect`, never a truncated frame.
    pub fn new(
        sensor: SensorId,
        sequence: u64,
        tick: Tick,
        image: Image,
    ) -> Result<Self, CaptureError> {
        if !image.is_consistent() {
            return Err(CaptureError::Defect(format!(
                "{sensor} frame {sequence}: {} {} buffer has {} bytes, expected {}",
                image.size,
                image.format,
                image.data.len(),
                image::expected_len(image.size, image.format)
                    .map(|len| len.to_string())
                    .unwrap_or_else(|| "overflow".to_string())
            )));
        }
        Ok(Self {
            sensor,
            sequence,
            tick,
            image,
        })
    }

    pub fn sensor(&self) -> SensorId {
        self.sensor
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Simulation time of the tick that requested this frame.
    pub fn timestamp(&self) -> f64 {
        self.tick.time
    }

    pub fn size(&self) -> Vec2<usize> {
        self.image.size
    }

    pub fn width(&self) -> usize {
        self.image.width()
    }

    pub fn height(&self) -> usize {
        self.image.height()
    }

    pub fn format(&self) -> PixelFormat {
        self.image.format
    }

    pub fn data(&self) -> &[u8] {
        &self.image.data
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn into_image(self) -> Image {
        self.image
    }
}
