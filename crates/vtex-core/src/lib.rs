//! # vtex-core
//!
//! Core types for texture processing.
//!
//! This crate holds everything that works on pixels in memory, with no file
//! I/O:
//!
//! - [`PixelFormat`], [`PixelFormatDescriptor`] - the closed pixel format registry
//! - [`convert`] - the pixel conversion matrix, mip downscale, normalize, swizzles
//! - [`Image`], [`CubeFace`] - one decoded mip/face plane and its region operations
//! - [`Rect`] - region type for copy/insert
//!
//! ## Crate Structure
//!
//! ```text
//! vtex-core (this crate)
//!    ^
//!    |
//!    +-- vtex-io (containers, codecs, ImageSystem)
//!           ^
//!           |
//!           +-- vtex-cli
//! ```
//!
//! ## Example
//!
//! ```rust
//! use vtex_core::prelude::*;
//!
//! let img = Image::create(4, 4, PixelFormat::Rgb888).unwrap();
//! let rgba = convert::convert_image(&img, PixelFormat::Rgba8888).unwrap();
//! assert_eq!(rgba.data_size(), 64);
//!
//! let mips = rgba.create_mipmaps(false).unwrap();
//! assert_eq!(mips.len(), 3);
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

pub mod convert;
pub mod error;
pub mod format;
pub mod image;
pub mod rect;

// Re-exports for convenience
pub use error::{Error, Result};
pub use format::{
    GpuCapabilities, GpuTextureFormat, PixelFormat, PixelFormatDescriptor, FORMAT_COUNT,
};
pub use image::{CubeFace, Image, CUBE_FACE_COUNT, MAX_DIMENSION};
pub use rect::Rect;

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```
/// use vtex_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::convert;
    pub use crate::error::{Error, Result};
    pub use crate::format::{self, PixelFormat, PixelFormatDescriptor};
    pub use crate::image::{CubeFace, Image};
    pub use crate::rect::Rect;
}
