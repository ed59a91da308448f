use {crate::*, base::Vec2};

/// Number of bytes a tightly packed image of `size` and `format` occupies.
pub fn expected_len(size: Vec2<usize>, format: PixelFormat) -> Option<usize> {
    size.x
        .checked_mul(size.y)?
        .checked_mul(format.bytes_per_pixel())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub size: Vec2<usize>,
    pub data: Vec<u8>,
    pub format: PixelFormat,
}

impl Image {
    /// Wrap a buffer without checking its length.
    pub fn new(size: Vec2<usize>, data: Vec<u8>, format: PixelFormat) -> Self {
        Self { size, data, format }
    }

    /// Wrap a buffer, rejecting any length that does not match `size` and `format`.
    pub fn try_new(
        size: Vec2<usize>,
        data: Vec<u8>,
        format: PixelFormat,
    ) -> Result<Self, ImageError> {
        let expected = expected_len(size, format)
            .ok_or_else(|| ImageError::Size(format!("{size} {format} image overflows usize")))?;
        if data.len() != expected {
            return Err(ImageError::Size(format!(
                "{size} {format} image needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self { size, data, format })
    }

    pub fn zeroed(size: Vec2<usize>, format: PixelFormat) -> Result<Self, ImageError> {
        let len = expected_len(size, format)
            .ok_or_else(|| ImageError::Size(format!("{size} {format} image overflows usize")))?;
        Ok(Self::new(size, vec![0u8; len], format))
    }

    pub fn width(&self) -> usize {
        self.size.x
    }

    pub fn height(&self) -> usize {
        self.size.y
    }

    pub fn stride(&self) -> usize {
        self.size.x * self.format.bytes_per_pixel()
    }

    pub fn is_consistent(&self) -> bool {
        expected_len(self.size, self.format) == Some(self.data.len())
    }

    /// Copy out the `size` block starting at `origin`.
    pub fn crop(&self, origin: Vec2<usize>, size: Vec2<usize>) -> Result<Image, ImageError> {
        if !self.is_consistent() {
            return Err(ImageError::Size(format!(
                "cannot crop inconsistent {} {} image of {} bytes",
                self.size,
                self.format,
                self.data.len()
            )));
        }
        if !self.size.contains_region(origin, size) {
            return Err(ImageError::Size(format!(
                "region {size} at ({}, {}) exceeds {}",
                origin.x, origin.y, self.size
            )));
        }
        if origin == Vec2::new(0, 0) && size == self.size {
            return Ok(self.clone());
        }
        let bpp = self.format.bytes_per_pixel();
        let stride = self.stride();
        let row_len = size.x * bpp;
        let mut data = Vec::with_capacity(row_len * size.y);
        for row in origin.y..origin.y + size.y {
            let start = row * stride + origin.x * bpp;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }
        Ok(Image::new(size, data, self.format))
    }
}
