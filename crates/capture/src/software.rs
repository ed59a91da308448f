use {
    crate::*,
    base::Vec2,
    image::{Image, PixelFormat},
    std::{
        sync::{
            Mutex,
            atomic::{AtomicBool, AtomicU64, Ordering},
        },
        time::Duration,
    },
};

struct SoftwareState {
    image: Image,
    pass: u64,
    latency: Duration,
}

/// A render target living in host memory.
///
/// Copies take the pixels of the last finished `render` pass at issue time and
/// resolve after the configured latency, which stands in for GPU copy time.
pub struct SoftwareTarget {
    state: Mutex<SoftwareState>,
    generation: AtomicU64,
    valid: AtomicBool,
}

impl SoftwareTarget {
    pub fn new(size: Vec2<usize>, format: PixelFormat) -> Result<Self, CaptureError> {
        check_size(size)?;
        Ok(Self {
            state: Mutex::new(SoftwareState {
                image: Image::zeroed(size, format)?,
                pass: 0,
                latency: Duration::ZERO,
            }),
            generation: AtomicU64::new(1),
            valid: AtomicBool::new(true),
        })
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).latency = latency;
    }

    /// Run one render pass. `draw` receives the target image and the pass number.
    pub fn render(&self, draw: impl FnOnce(&mut Image, u64)) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.pass += 1;
        let pass = state.pass;
        draw(&mut state.image, pass);
    }

    /// Number of finished render passes.
    pub fn pass(&self) -> u64 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).pass
    }

    /// Recreate the backing storage at a new size. In-flight copies become stale.
    pub fn resize(&self, size: Vec2<usize>) -> Result<(), CaptureError> {
        check_size(size)?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.image = Image::zeroed(size, state.image.format)?;
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Release the backing storage. Every later copy fails.
    pub fn release(&self) {
        self.valid.store(false, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

fn check_size(size: Vec2<usize>) -> Result<(), CaptureError> {
    if size.is_empty() {
        return Err(CaptureError::FatalConfig(format!("render target size {size} is empty")));
    }
    Ok(())
}

impl RenderTarget for SoftwareTarget {
    fn size(&self) -> Vec2<usize> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).image.size
    }

    fn format(&self) -> PixelFormat {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).image.format
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    fn copy_region_to_host(&self, region: Region) -> Readback {
        let copied = if self.is_valid() {
            let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state
                .image
                .crop(region.origin, region.size)
                .map(|image| (image.data, state.latency))
                .map_err(CaptureError::from)
        } else {
            Err(CaptureError::StaleTarget("render target released".to_string()))
        };
        Box::pin(async move {
            let (data, latency) = copied?;
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            Ok(data)
        })
    }
}
