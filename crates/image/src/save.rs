use {
    crate::*,
    crates_image::{ExtendedColorType, ImageBuffer, ImageFormat, Luma},
    std::path::Path,
};

fn output_format(path: &Path) -> Result<ImageFormat, ImageError> {
    match ImageFormat::from_path(path) {
        Ok(format @ (ImageFormat::Png | ImageFormat::Bmp)) => Ok(format),
        Ok(other) => Err(ImageError::Format(format!(
            "unsupported output format {other:?} for {}",
            path.display()
        ))),
        Err(_) => Err(ImageError::Format(format!(
            "cannot infer output format from {}",
            path.display()
        ))),
    }
}

/// Write an image to disk, choosing PNG or BMP by file extension.
///
/// Color formats are stored as RGBA8, `R8` as 8-bit gray, `R16` as 16-bit gray
/// (PNG only) and `R32Float` as gray normalized to the image's value range.
pub fn save_image(image: &Image, path: impl AsRef<Path>) -> Result<(), ImageError> {
    let path = path.as_ref();
    let format = output_format(path)?;
    if !image.is_consistent() {
        return Err(ImageError::Size(format!(
            "{} {} image has {} bytes",
            image.size,
            image.format,
            image.data.len()
        )));
    }
    let (width, height) = (image.width() as u32, image.height() as u32);

    match image.format {
        PixelFormat::Bgra8 => crates_image::save_buffer_with_format(
            path,
            &swap_red_blue(&image.data),
            width,
            height,
            ExtendedColorType::Rgba8,
            format,
        )?,
        PixelFormat::Rgba8 => crates_image::save_buffer_with_format(
            path,
            &image.data,
            width,
            height,
            ExtendedColorType::Rgba8,
            format,
        )?,
        PixelFormat::R8 => crates_image::save_buffer_with_format(
            path,
            &image.data,
            width,
            height,
            ExtendedColorType::L8,
            format,
        )?,
        PixelFormat::R16 => {
            if format != ImageFormat::Png {
                return Err(ImageError::Format("16-bit gray can only be saved as png".to_string()));
            }
            let values: Vec<u16> = image
                .data
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            let buffer = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(width, height, values)
                .ok_or_else(|| {
                    ImageError::Size("16-bit buffer does not match dimensions".to_string())
                })?;
            buffer.save_with_format(path, format)?;
        }
        PixelFormat::R32Float => crates_image::save_buffer_with_format(
            path,
            &r32f_to_gray(&image.data),
            width,
            height,
            ExtendedColorType::L8,
            format,
        )?,
    }
    Ok(())
}
