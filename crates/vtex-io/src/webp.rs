//! WebP via the `image` crate.
//!
//! Decodes to RGB888 or RGBA8888. Encoding is lossless only, so the
//! quality argument of `encode` is not used.

use std::io::BufReader;

use image::codecs::webp::{WebPDecoder, WebPEncoder};
use image::{ColorType, DynamicImage, ImageDecoder, ImageReader};
use tracing::debug;
use vtex_core::{Image, PixelFormat};

use crate::codec::{ImageCodec, ensure_writable, single_image};
use crate::detect::ImageFormat;
use crate::error::{IoError, IoResult};
use crate::file::ImageSource;
use crate::info::{ImageInfo, ImageQuality, LoadingParams};

const SUPPORTED_FORMATS: &[PixelFormat] = &[PixelFormat::Rgba8888, PixelFormat::Rgb888];

/// WebP writer options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebpWriterOptions {
    /// Lossless compression. Lossy encoding is not available and is
    /// refused. Default: true.
    pub lossless: bool,
}

impl Default for WebpWriterOptions {
    fn default() -> Self {
        Self { lossless: true }
    }
}

/// WebP codec.
#[derive(Debug, Clone, Default)]
pub struct WebpCodec {
    options: WebpWriterOptions,
}

impl WebpCodec {
    /// Creates a codec with default writer options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a codec with custom writer options.
    pub fn with_options(options: WebpWriterOptions) -> Self {
        Self { options }
    }
}

fn decode_error(e: image::ImageError) -> IoError {
    IoError::ReadFailed(format!("WebP: {e}"))
}

impl ImageCodec for WebpCodec {
    fn format(&self) -> ImageFormat {
        ImageFormat::WebP
    }

    fn supported_formats(&self) -> &'static [PixelFormat] {
        SUPPORTED_FORMATS
    }

    fn get_info(&self, src: &mut dyn ImageSource) -> IoResult<ImageInfo> {
        src.rewind_to_start()?;
        let header = WebPDecoder::new(BufReader::new(&mut *src))
            .map(|decoder| (decoder.dimensions(), decoder.color_type()))
            .map_err(decode_error);
        let total = src.size()?;
        src.rewind_to_start()?;
        let ((width, height), color) = header?;
        let format = match color {
            ColorType::Rgb8 => PixelFormat::Rgb888,
            _ => PixelFormat::Rgba8888,
        };
        Ok(ImageInfo {
            width,
            height,
            format,
            data_size: total,
            mipmaps_count: 1,
            face_count: 1,
        })
    }

    fn decode(&self, src: &mut dyn ImageSource, params: &LoadingParams) -> IoResult<Vec<Image>> {
        src.rewind_to_start()?;
        let decoded = ImageReader::with_format(BufReader::new(&mut *src), image::ImageFormat::WebP)
            .decode()
            .map_err(decode_error);
        let decoded = match decoded {
            Ok(img) => img,
            Err(e) => {
                src.rewind_to_start()?;
                return Err(e);
            }
        };

        let (width, height) = (decoded.width(), decoded.height());
        let (format, data) = match decoded {
            DynamicImage::ImageRgb8(rgb) => (PixelFormat::Rgb888, rgb.into_raw()),
            DynamicImage::ImageRgba8(rgba) => (PixelFormat::Rgba8888, rgba.into_raw()),
            other => (PixelFormat::Rgba8888, other.to_rgba8().into_raw()),
        };
        debug!(width, height, %format, "decoded WebP");

        let image = Image::from_vec(width, height, format, data)?.with_mipmap_level(params.first_mipmap_index);
        Ok(vec![image])
    }

    fn encode_to_vec(&self, images: &[Image], _quality: ImageQuality) -> IoResult<Vec<u8>> {
        let image = single_image(self, images)?;
        ensure_writable(self, image.format)?;
        if !self.options.lossless {
            return Err(IoError::FormatUnsupported("lossy WebP encoding".into()));
        }

        let data = image.data().to_vec();
        let dynamic = match image.format {
            PixelFormat::Rgb888 => image::RgbImage::from_raw(image.width, image.height, data).map(DynamicImage::ImageRgb8),
            _ => image::RgbaImage::from_raw(image.width, image.height, data).map(DynamicImage::ImageRgba8),
        }
        .ok_or_else(|| IoError::write_failed("pixel buffer does not match the image size"))?;

        let mut buffer = Vec::new();
        dynamic
            .write_with_encoder(WebPEncoder::new_lossless(&mut buffer))
            .map_err(IoError::write_failed)?;
        Ok(buffer)
    }
}
