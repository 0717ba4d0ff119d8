//! JPEG/JFIF.
//!
//! Decoding goes through `jpeg-decoder`, encoding through `jpeg-encoder`.
//!
//! - grayscale decodes to A8, RGB and CMYK decode to RGB888
//! - RGB888 and A8 can be written
//! - the [`ImageQuality`] passed to `encode` is the JPEG quality
//!
//! # Example
//!
//! ```rust,ignore
//! use vtex_io::jpeg::{JpegCodec, JpegWriterOptions};
//! use vtex_io::{ImageCodec, ImageQuality};
//!
//! let codec = JpegCodec::with_options(JpegWriterOptions { progressive: true });
//! let bytes = codec.encode_to_vec(&[image], ImageQuality::new(85))?;
//! ```

use std::io::BufReader;

use tracing::debug;
use vtex_core::{Image, PixelFormat};

use crate::codec::{ImageCodec, ensure_writable, single_image};
use crate::detect::ImageFormat;
use crate::error::{IoError, IoResult};
use crate::file::ImageSource;
use crate::info::{ImageInfo, ImageQuality, LoadingParams};

const SUPPORTED_FORMATS: &[PixelFormat] = &[PixelFormat::Rgb888, PixelFormat::A8];

/// Options for writing JPEG files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JpegWriterOptions {
    /// Write a progressive instead of a baseline JPEG.
    pub progressive: bool,
}

/// JPEG codec.
#[derive(Debug, Clone, Default)]
pub struct JpegCodec {
    options: JpegWriterOptions,
}

impl JpegCodec {
    /// Creates a codec with default writer options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a codec with custom writer options.
    pub fn with_options(options: JpegWriterOptions) -> Self {
        Self { options }
    }
}

fn decode_error(e: jpeg_decoder::Error) -> IoError {
    IoError::ReadFailed(format!("JPEG: {e}"))
}

/// Engine format a decoder pixel format maps to.
fn output_format(format: jpeg_decoder::PixelFormat) -> PixelFormat {
    match format {
        jpeg_decoder::PixelFormat::L8 | jpeg_decoder::PixelFormat::L16 => PixelFormat::A8,
        jpeg_decoder::PixelFormat::RGB24 | jpeg_decoder::PixelFormat::CMYK32 => PixelFormat::Rgb888,
    }
}

impl ImageCodec for JpegCodec {
    fn format(&self) -> ImageFormat {
        ImageFormat::Jpeg
    }

    fn supported_formats(&self) -> &'static [PixelFormat] {
        SUPPORTED_FORMATS
    }

    fn get_info(&self, src: &mut dyn ImageSource) -> IoResult<ImageInfo> {
        src.rewind_to_start()?;
        let info = {
            let mut decoder = jpeg_decoder::Decoder::new(BufReader::new(&mut *src));
            decoder.read_info().map_err(decode_error).and_then(|_| {
                decoder
                    .info()
                    .ok_or_else(|| IoError::ReadFailed("missing JPEG info".into()))
            })
        };
        let total = src.size()?;
        src.rewind_to_start()?;
        let info = info?;
        Ok(ImageInfo {
            width: u32::from(info.width),
            height: u32::from(info.height),
            format: output_format(info.pixel_format),
            data_size: total,
            mipmaps_count: 1,
            face_count: 1,
        })
    }

    fn decode(&self, src: &mut dyn ImageSource, params: &LoadingParams) -> IoResult<Vec<Image>> {
        src.rewind_to_start()?;
        let decoded = {
            let mut decoder = jpeg_decoder::Decoder::new(BufReader::new(&mut *src));
            decoder.decode().map_err(decode_error).and_then(|pixels| {
                let info = decoder
                    .info()
                    .ok_or_else(|| IoError::ReadFailed("missing JPEG info".into()))?;
                Ok((pixels, info))
            })
        };
        let (pixels, info) = match decoded {
            Ok(decoded) => decoded,
            Err(e) => {
                src.rewind_to_start()?;
                return Err(e);
            }
        };

        let (width, height) = (u32::from(info.width), u32::from(info.height));
        debug!(width, height, pixel_format = ?info.pixel_format, "decoded JPEG");

        let data = match info.pixel_format {
            jpeg_decoder::PixelFormat::RGB24 | jpeg_decoder::PixelFormat::L8 => pixels,
            // big-endian samples, keep the high byte
            jpeg_decoder::PixelFormat::L16 => pixels.chunks_exact(2).map(|l16| l16[0]).collect(),
            jpeg_decoder::PixelFormat::CMYK32 => pixels
                .chunks_exact(4)
                .flat_map(|cmyk| {
                    let c = cmyk[0] as f32 / 255.0;
                    let m = cmyk[1] as f32 / 255.0;
                    let y = cmyk[2] as f32 / 255.0;
                    let k = cmyk[3] as f32 / 255.0;
                    [
                        ((1.0 - c) * (1.0 - k) * 255.0) as u8,
                        ((1.0 - m) * (1.0 - k) * 255.0) as u8,
                        ((1.0 - y) * (1.0 - k) * 255.0) as u8,
                    ]
                })
                .collect(),
        };

        let image = Image::from_vec(width, height, output_format(info.pixel_format), data)?
            .with_mipmap_level(params.first_mipmap_index);
        Ok(vec![image])
    }

    fn encode_to_vec(&self, images: &[Image], quality: ImageQuality) -> IoResult<Vec<u8>> {
        use jpeg_encoder::{ColorType, Encoder};

        let image = single_image(self, images)?;
        ensure_writable(self, image.format)?;
        let color_type = match image.format {
            PixelFormat::A8 => ColorType::Luma,
            _ => ColorType::Rgb,
        };

        let mut buffer = Vec::new();
        let mut encoder = Encoder::new(&mut buffer, quality.value().max(1));
        encoder.set_progressive(self.options.progressive);
        encoder
            .encode(image.data(), image.width as u16, image.height as u16, color_type)
            .map_err(|e: jpeg_encoder::EncodingError| IoError::write_failed(e))?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn gradient(format: PixelFormat, w: u32, h: u32) -> Image {
        let channels = if format == PixelFormat::A8 { 1 } else { 3 };
        let mut data = Vec::new();
        for y in 0..h {
            for x in 0..w {
                for c in 0..channels {
                    data.push(((x * 16 + y * 8 + c * 40) % 256) as u8);
                }
            }
        }
        Image::from_vec(w, h, format, data).unwrap()
    }

    #[test]
    fn rgb_round_trip_is_close() {
        let image = gradient(PixelFormat::Rgb888, 16, 8);
        let bytes = JpegCodec::new().encode_to_vec(&[image.clone()], ImageQuality::MAX).unwrap();
        assert_eq!(ImageFormat::from_bytes(&bytes), ImageFormat::Jpeg);

        let decoded = JpegCodec::new()
            .decode(&mut Cursor::new(bytes), &LoadingParams::default())
            .unwrap();
        let out = &decoded[0];
        assert_eq!((out.width, out.height, out.format), (16, 8, PixelFormat::Rgb888));
        let max_diff = out
            .data
            .iter()
            .zip(&image.data)
            .map(|(a, b)| (*a as i32 - *b as i32).abs())
            .max()
            .unwrap();
        assert!(max_diff < 40, "max diff {max_diff}");
    }

    #[test]
    fn grayscale_decodes_to_a8() {
        let image = gradient(PixelFormat::A8, 8, 8);
        let bytes = JpegCodec::with_options(JpegWriterOptions { progressive: true })
            .encode_to_vec(&[image], ImageQuality::new(90))
            .unwrap();
        let info = JpegCodec::new().get_info(&mut Cursor::new(bytes.clone())).unwrap();
        assert_eq!(info.format, PixelFormat::A8);
        assert_eq!((info.width, info.height), (8, 8));
        let decoded = JpegCodec::new()
            .decode(&mut Cursor::new(bytes), &LoadingParams::default())
            .unwrap();
        assert_eq!(decoded[0].format, PixelFormat::A8);
    }

    #[test]
    fn rgba_is_refused() {
        let image = Image::create(2, 2, PixelFormat::Rgba8888).unwrap();
        let err = JpegCodec::new().encode_to_vec(&[image], ImageQuality::MAX).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::FormatUnsupported);
    }

    #[test]
    fn garbage_is_read_failure() {
        let mut src = Cursor::new(vec![0xFF, 0xD8, 0xFF, 0x00, 1, 2, 3]);
        let err = JpegCodec::new().decode(&mut src, &LoadingParams::default()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ReadFailed);
        assert_eq!(src.position(), 0);
    }
}
