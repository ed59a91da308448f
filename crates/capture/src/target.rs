use {
    crate::*,
    base::Vec2,
    futures_core::future::BoxFuture,
    image::PixelFormat,
    std::sync::Arc,
};

/// Completion of a GPU-to-host copy. Resolves once the render pass that
/// produced the copied contents has finished and the bytes are in host memory.
pub type Readback = BoxFuture<'static, Result<Vec<u8>, CaptureError>>;

/// A rectangle of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub origin: Vec2<usize>,
    pub size: Vec2<usize>,
}

impl Region {
    pub fn new(origin: Vec2<usize>, size: Vec2<usize>) -> Self {
        Self { origin, size }
    }

    /// The whole target.
    pub fn full(size: Vec2<usize>) -> Self {
        Self::new(Vec2::new(0, 0), size)
    }

    /// Bytes a tightly packed copy of this region occupies.
    pub fn byte_len(&self, format: PixelFormat) -> Option<usize> {
        image::expected_len(self.size, format)
    }
}

/// GPU-resident render target the renderer writes into every tick.
///
/// Implementations must not copy synchronously inside `copy_region_to_host`;
/// the returned future carries the fence.
pub trait RenderTarget: Send + Sync {
    fn size(&self) -> Vec2<usize>;

    fn format(&self) -> PixelFormat;

    /// Changes whenever the backing storage is recreated (resize, release).
    fn generation(&self) -> u64;

    fn is_valid(&self) -> bool {
        true
    }

    /// Issue a copy of `region` into host memory.
    fn copy_region_to_host(&self, region: Region) -> Readback;
}

/// Reference count over every snapshot a pipeline hands out. Once the worker
/// has exited the count must be back to one.
#[derive(Debug, Clone, Default)]
pub(crate) struct TargetLease(Arc<()>);

impl TargetLease {
    pub(crate) fn outstanding(&self) -> usize {
        Arc::strong_count(&self.0) - 1
    }
}

/// The render target as it was when a capture was dispatched.
///
/// The snapshot keeps the target alive until the copy completes; the copy is
/// only trusted if the target still has the same generation, size and format.
#[derive(Clone)]
pub struct TargetSnapshot {
    target: Arc<dyn RenderTarget>,
    generation: u64,
    size: Vec2<usize>,
    format: PixelFormat,
    _lease: TargetLease,
}

impl TargetSnapshot {
    pub fn new(target: Arc<dyn RenderTarget>) -> Self {
        Self::leased(target, &TargetLease::default())
    }

    pub(crate) fn leased(target: Arc<dyn RenderTarget>, lease: &TargetLease) -> Self {
        Self {
            generation: target.generation(),
            size: target.size(),
            format: target.format(),
            target,
            _lease: lease.clone(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn size(&self) -> Vec2<usize> {
        self.size
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn region(&self) -> Region {
        Region::full(self.size)
    }

    /// Fails with `StaleTarget` if the target was released, resized or
    /// recreated since the snapshot was taken.
    pub fn check(&self) -> Result<(), CaptureError> {
        if !self.target.is_valid() {
            return Err(CaptureError::StaleTarget("render target released".to_string()));
        }
        let generation = self.target.generation();
        if generation != self.generation {
            return Err(CaptureError::StaleTarget(format!(
                "render target generation {} became {}",
                self.generation, generation
            )));
        }
        let (size, format) = (self.target.size(), self.target.format());
        if size != self.size || format != self.format {
            return Err(CaptureError::StaleTarget(format!(
                "render target changed from {} {} to {} {}",
                self.size, self.format, size, format
            )));
        }
        Ok(())
    }

    pub(crate) fn copy(&self) -> Readback {
        self.target.copy_region_to_host(self.region())
    }
}

impl std::fmt::Debug for TargetSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetSnapshot")
            .field("target", &"<dyn RenderTarget>")
            .field("generation", &self.generation)
            .field("size", &self.size)
            .field("format", &self.format)
            .finish()
    }
}
