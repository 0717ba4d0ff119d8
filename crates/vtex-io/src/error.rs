//! Error types for container I/O.
//!
//! Every load/save/info entry point reports one [`IoError`]. Callers that
//! only care about the category match on [`IoError::kind`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use vtex_core::PixelFormat;

/// Category of an [`IoError`], without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The file does not exist or cannot be opened.
    FileNotFound,
    /// A read returned short or the underlying handle failed.
    ReadFailed,
    /// The destination could not be created or written.
    WriteFailed,
    /// Magic or header does not match any known container.
    FormatUnrecognized,
    /// Known container, unsupported pixel encoding or feature.
    FormatUnsupported,
    /// Zero or absurd width/height.
    DimensionInvalid,
    /// No conversion path between two pixel formats.
    ConversionUnsupported,
}

/// Container I/O error.
#[derive(Debug, Error)]
pub enum IoError {
    /// File missing.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Short read or truncated payload.
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// Destination could not be written.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// Header mismatch.
    #[error("unrecognized format: {0}")]
    FormatUnrecognized(String),

    /// Recognized container, unsupported content.
    #[error("unsupported: {0}")]
    FormatUnsupported(String),

    /// Invalid dimensions in a header or an image set.
    #[error("invalid dimensions {width}x{height}: {reason}")]
    DimensionInvalid {
        /// Width
        width: u32,
        /// Height
        height: u32,
        /// What is wrong with them
        reason: String,
    },

    /// No conversion path between two formats.
    #[error("conversion from {from} to {to} is not supported")]
    ConversionUnsupported {
        /// Source format
        from: PixelFormat,
        /// Destination format
        to: PixelFormat,
    },

    /// Raw I/O error from the file handle.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error raised by an in-memory image operation.
    #[error(transparent)]
    Core(#[from] vtex_core::Error),
}

impl IoError {
    /// Projects the error onto its taxonomy category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FileNotFound(_) => ErrorKind::FileNotFound,
            Self::ReadFailed(_) => ErrorKind::ReadFailed,
            Self::WriteFailed(_) => ErrorKind::WriteFailed,
            Self::FormatUnrecognized(_) => ErrorKind::FormatUnrecognized,
            Self::FormatUnsupported(_) => ErrorKind::FormatUnsupported,
            Self::DimensionInvalid { .. } => ErrorKind::DimensionInvalid,
            Self::ConversionUnsupported { .. } => ErrorKind::ConversionUnsupported,
            Self::Io(e) if e.kind() == io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            Self::Io(_) => ErrorKind::ReadFailed,
            Self::Core(vtex_core::Error::ConversionUnsupported { .. }) => {
                ErrorKind::ConversionUnsupported
            }
            Self::Core(vtex_core::Error::InvalidDimensions { .. }) => ErrorKind::DimensionInvalid,
            Self::Core(_) => ErrorKind::FormatUnsupported,
        }
    }

    /// Wraps a failed write into [`IoError::WriteFailed`].
    pub fn write_failed(err: impl std::fmt::Display) -> Self {
        Self::WriteFailed(err.to_string())
    }

    /// Wraps a failed read into [`IoError::ReadFailed`].
    pub fn read_failed(err: impl std::fmt::Display) -> Self {
        Self::ReadFailed(err.to_string())
    }

    /// Creates a [`IoError::DimensionInvalid`].
    pub fn dimension_invalid(width: u32, height: u32, reason: impl Into<String>) -> Self {
        Self::DimensionInvalid {
            width,
            height,
            reason: reason.into(),
        }
    }

    /// Creates a [`IoError::ConversionUnsupported`].
    pub fn conversion_unsupported(from: PixelFormat, to: PixelFormat) -> Self {
        Self::ConversionUnsupported { from, to }
    }

    /// Returns true when another codec may still recognize the source.
    ///
    /// Used by content sniffing to decide whether to keep probing.
    pub fn is_format_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::FormatUnrecognized)
    }
}

/// Result type for container I/O.
pub type IoResult<T> = Result<T, IoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_file_not_found() {
        let err = IoError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.kind(), ErrorKind::FileNotFound);

        let err = IoError::from(io::Error::new(io::ErrorKind::UnexpectedEof, "short"));
        assert_eq!(err.kind(), ErrorKind::ReadFailed);
    }

    #[test]
    fn core_errors_keep_their_category() {
        let err = IoError::from(vtex_core::Error::conversion_unsupported(
            PixelFormat::Pvr4,
            PixelFormat::Etc1,
        ));
        assert_eq!(err.kind(), ErrorKind::ConversionUnsupported);

        let err = IoError::from(vtex_core::Error::invalid_dimensions(0, 4, "zero width"));
        assert_eq!(err.kind(), ErrorKind::DimensionInvalid);
    }

    #[test]
    fn display_includes_payload() {
        let err = IoError::dimension_invalid(0, 16, "zero width");
        assert_eq!(err.to_string(), "invalid dimensions 0x16: zero width");
    }
}
