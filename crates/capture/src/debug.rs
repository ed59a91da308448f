use {
    crate::*,
    image::Image,
    std::{path::Path, time::Duration},
};

/// Upper bound on how long the debug readbacks wait for the GPU.
pub const DEBUG_READBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Read the whole render target into memory, blocking until the copy completes.
///
/// Diagnostics only: this bypasses the capture pipeline and stalls the caller.
/// Must not be called from async code.
pub fn read_pixels(target: &dyn RenderTarget) -> Result<Image, CaptureError> {
    if !target.is_valid() {
        return Err(CaptureError::StaleTarget("render target released".to_string()));
    }
    let (size, format, generation) = (target.size(), target.format(), target.generation());
    let readback = target.copy_region_to_host(Region::full(size));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    // the timer has to be created inside the runtime
    let data = runtime
        .block_on(async { tokio::time::timeout(DEBUG_READBACK_TIMEOUT, readback).await })
        .map_err(|_| CaptureError::Timeout(DEBUG_READBACK_TIMEOUT))??;

    if target.generation() != generation {
        return Err(CaptureError::StaleTarget(
            "render target recreated during readback".to_string(),
        ));
    }
    Image::try_new(size, data, format).map_err(|error| CaptureError::Defect(error.to_string()))
}

/// Read the render target and write it to `path` (PNG or BMP by extension).
///
/// Diagnostics only, see `read_pixels`.
pub fn save_pixels_to_disk(
    target: &dyn RenderTarget,
    path: impl AsRef<Path>,
) -> Result<(), CaptureError> {
    let path = path.as_ref();
    let image = read_pixels(target)?;
    image::save_image(&image, path)?;
    log::info!("saved {} {} capture to {}", image.size, image.format, path.display());
    Ok(())
}
