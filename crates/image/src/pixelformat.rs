use std::fmt;

/// Layout of one pixel in a render target or captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 8-bit blue, green, red, alpha. Color cameras.
    #[default]
    Bgra8,
    Rgba8,
    /// Single 8-bit channel. Semantic segmentation labels.
    R8,
    /// Single 16-bit little-endian channel.
    R16,
    /// Single 32-bit little-endian float. Linear depth.
    R32Float,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 5] = [
        PixelFormat::Bgra8,
        PixelFormat::Rgba8,
        PixelFormat::R8,
        PixelFormat::R16,
        PixelFormat::R32Float,
    ];

    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 | PixelFormat::R32Float => 4,
            PixelFormat::R16 => 2,
            PixelFormat::R8 => 1,
        }
    }

    /// Parse a configuration name such as `bgra8` or `r32f` (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "bgra8" | "bgra" => Some(PixelFormat::Bgra8),
            "rgba8" | "rgba" => Some(PixelFormat::Rgba8),
            "r8" => Some(PixelFormat::R8),
            "r16" => Some(PixelFormat::R16),
            "r32f" | "r32float" => Some(PixelFormat::R32Float),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PixelFormat::Bgra8 => "bgra8",
            PixelFormat::Rgba8 => "rgba8",
            PixelFormat::R8 => "r8",
            PixelFormat::R16 => "r16",
            PixelFormat::R32Float => "r32f",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
