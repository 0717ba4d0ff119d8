//! Adobe Photoshop documents, read-only.
//!
//! Only the flattened composite is decoded, as RGBA8888. RGB and grayscale
//! documents are accepted; other color modes are refused.

use std::io::Read;

use psd::{ColorMode, Psd};
use tracing::debug;
use vtex_core::{Image, PixelFormat};

use crate::codec::ImageCodec;
use crate::detect::ImageFormat;
use crate::error::{IoError, IoResult};
use crate::file::ImageSource;
use crate::info::{ImageInfo, ImageQuality, LoadingParams};

/// PSD codec. Writing always fails with `FormatUnsupported`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PsdCodec;

impl PsdCodec {
    /// Creates the codec.
    pub fn new() -> Self {
        Self
    }

    fn parse(&self, src: &mut dyn ImageSource) -> IoResult<Psd> {
        src.rewind_to_start()?;
        let mut bytes = Vec::new();
        src.read_to_end(&mut bytes)?;
        src.rewind_to_start()?;
        let psd = Psd::from_bytes(&bytes).map_err(|e| IoError::ReadFailed(format!("PSD: {e}")))?;
        match psd.color_mode() {
            ColorMode::Rgb | ColorMode::Grayscale => Ok(psd),
            mode => Err(IoError::FormatUnsupported(format!("PSD color mode {mode:?}"))),
        }
    }
}

impl ImageCodec for PsdCodec {
    fn format(&self) -> ImageFormat {
        ImageFormat::Psd
    }

    fn supported_formats(&self) -> &'static [PixelFormat] {
        &[]
    }

    fn get_info(&self, src: &mut dyn ImageSource) -> IoResult<ImageInfo> {
        let total = src.size()?;
        let psd = self.parse(src)?;
        Ok(ImageInfo {
            width: psd.width(),
            height: psd.height(),
            format: PixelFormat::Rgba8888,
            data_size: total,
            mipmaps_count: 1,
            face_count: 1,
        })
    }

    fn decode(&self, src: &mut dyn ImageSource, params: &LoadingParams) -> IoResult<Vec<Image>> {
        let psd = self.parse(src)?;
        let (width, height) = (psd.width(), psd.height());
        debug!(width, height, layers = psd.layers().len(), "decoding PSD composite");
        let image = Image::from_vec(width, height, PixelFormat::Rgba8888, psd.rgba())?
            .with_mipmap_level(params.first_mipmap_index);
        Ok(vec![image])
    }

    fn encode_to_vec(&self, _images: &[Image], _quality: ImageQuality) -> IoResult<Vec<u8>> {
        Err(IoError::FormatUnsupported("PSD files cannot be written".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn writing_is_refused() {
        let image = Image::create(1, 1, PixelFormat::Rgba8888).unwrap();
        let err = PsdCodec.encode_to_vec(&[image], ImageQuality::MAX).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::FormatUnsupported);
        assert!(!PsdCodec.supports_format(PixelFormat::Rgba8888));
    }

    #[test]
    fn sniffed_by_signature() {
        assert!(PsdCodec.can_process(&mut Cursor::new(b"8BPS\0\x01\0\0".to_vec())));
        assert!(!PsdCodec.can_process(&mut Cursor::new(b"DDS \0\0\0\0".to_vec())));
    }
}
