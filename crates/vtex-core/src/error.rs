//! Error types for vtex-core operations.
//!
//! The conversion matrix keeps a boolean contract (a pair is either in the
//! table or it is not); everything built on top of it, most notably the
//! [`Image`](crate::image::Image) operations, reports failures through the
//! [`Error`] enum defined here.
//!
//! # Usage
//!
//! ```rust
//! use vtex_core::{Error, PixelFormat, Result};
//!
//! fn require_same(a: PixelFormat, b: PixelFormat) -> Result<()> {
//!     if a != b {
//!         return Err(Error::format_mismatch(a, b));
//!     }
//!     Ok(())
//! }
//!
//! assert!(require_same(PixelFormat::Rgba8888, PixelFormat::A8).is_err());
//! ```
//!
//! # Dependencies
//!
//! - [`thiserror`] - derive macro for the error implementation
//!
//! # Used By
//!
//! - [`crate::image::Image`] - region copy/insert, flips, rotations
//! - [`crate::convert`] - whole-image conversion helpers
//! - `vtex-io` - wrapped inside `IoError`

use crate::format::PixelFormat;
use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while manipulating texture images in memory.
///
/// # Categories
///
/// - **Geometry**: [`InvalidRegion`](Error::InvalidRegion), [`InvalidDimensions`](Error::InvalidDimensions)
/// - **Format**: [`FormatMismatch`](Error::FormatMismatch), [`UnsupportedFormat`](Error::UnsupportedFormat),
///   [`ConversionUnsupported`](Error::ConversionUnsupported)
/// - **Buffers**: [`BufferTooSmall`](Error::BufferTooSmall)
#[derive(Debug, Error)]
pub enum Error {
    /// Region of interest does not intersect the image at all.
    #[error("region ({rx}, {ry}, {rw}x{rh}) is outside image {width}x{height}")]
    InvalidRegion {
        /// Region X origin
        rx: u32,
        /// Region Y origin
        ry: u32,
        /// Region width
        rw: u32,
        /// Region height
        rh: u32,
        /// Image width
        width: u32,
        /// Image height
        height: u32,
    },

    /// Two images taking part in one operation have different pixel formats.
    ///
    /// Region operations never convert implicitly.
    #[error("pixel format mismatch: expected {expected}, got {got}")]
    FormatMismatch {
        /// Format of the destination
        expected: PixelFormat,
        /// Format of the source
        got: PixelFormat,
    },

    /// Invalid image dimensions.
    ///
    /// Zero-sized images, sizes above 65535, or a shape the operation
    /// cannot handle (rotation of a non-square image).
    #[error("invalid dimensions: {width}x{height} ({reason})")]
    InvalidDimensions {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
        /// Reason why dimensions are invalid
        reason: String,
    },

    /// Pixel format is not supported for this operation.
    ///
    /// Block-compressed formats cannot be flipped, rotated or cropped per pixel.
    #[error("unsupported pixel format {format} for {operation}")]
    UnsupportedFormat {
        /// Offending format
        format: PixelFormat,
        /// Operation name
        operation: &'static str,
    },

    /// No conversion path exists between two pixel formats.
    #[error("conversion from {from} to {to} is not supported")]
    ConversionUnsupported {
        /// Source format
        from: PixelFormat,
        /// Destination format
        to: PixelFormat,
    },

    /// A caller-provided buffer is shorter than the pixel data requires.
    #[error("buffer holds {got} bytes, {required} required")]
    BufferTooSmall {
        /// Bytes required
        required: usize,
        /// Bytes provided
        got: usize,
    },

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Creates an [`Error::InvalidRegion`] error.
    #[inline]
    pub fn invalid_region(rx: u32, ry: u32, rw: u32, rh: u32, width: u32, height: u32) -> Self {
        Self::InvalidRegion {
            rx,
            ry,
            rw,
            rh,
            width,
            height,
        }
    }

    /// Creates an [`Error::FormatMismatch`] error.
    #[inline]
    pub fn format_mismatch(expected: PixelFormat, got: PixelFormat) -> Self {
        Self::FormatMismatch { expected, got }
    }

    /// Creates an [`Error::InvalidDimensions`] error.
    #[inline]
    pub fn invalid_dimensions(width: u32, height: u32, reason: impl Into<String>) -> Self {
        Self::InvalidDimensions {
            width,
            height,
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::UnsupportedFormat`] error.
    #[inline]
    pub fn unsupported_format(format: PixelFormat, operation: &'static str) -> Self {
        Self::UnsupportedFormat { format, operation }
    }

    /// Creates an [`Error::ConversionUnsupported`] error.
    #[inline]
    pub fn conversion_unsupported(from: PixelFormat, to: PixelFormat) -> Self {
        Self::ConversionUnsupported { from, to }
    }

    /// Creates an [`Error::Other`] error.
    #[inline]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Returns `true` if this is a geometry-related error.
    #[inline]
    pub fn is_geometry_error(&self) -> bool {
        matches!(self, Self::InvalidRegion { .. } | Self::InvalidDimensions { .. })
    }

    /// Returns `true` if the error comes from a missing conversion path.
    #[inline]
    pub fn is_conversion_error(&self) -> bool {
        matches!(self, Self::ConversionUnsupported { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_region() {
        let err = Error::invalid_region(100, 50, 8, 8, 80, 60);
        let msg = err.to_string();
        assert!(msg.contains("100"));
        assert!(msg.contains("80x60"));
        assert!(err.is_geometry_error());
    }

    #[test]
    fn test_format_mismatch() {
        let err = Error::format_mismatch(PixelFormat::Rgba8888, PixelFormat::Rgb565);
        let msg = err.to_string();
        assert!(msg.contains("RGBA8888"));
        assert!(msg.contains("RGB565"));
        assert!(!err.is_geometry_error());
    }

    #[test]
    fn test_conversion_unsupported() {
        let err = Error::conversion_unsupported(PixelFormat::Pvr4, PixelFormat::Etc1);
        assert!(err.is_conversion_error());
        assert!(err.to_string().contains("PVR4"));
    }
}
