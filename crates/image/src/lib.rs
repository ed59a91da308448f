//! Pixel buffers for captured frames.
//!
//! An `Image` is a tightly packed row-major buffer (no row padding) whose
//! length always matches `width * height * bytes_per_pixel` for its format.

mod bgra;
pub use bgra::*;

mod error;
pub use error::*;

mod image;
pub use image::*;

mod pixelformat;
pub use pixelformat::*;

mod save;
pub use save::*;
