//! PNG via the `png` crate.
//!
//! Decoded pixels land in one of three formats:
//!
//! - RGB, RGBA and palette images become RGBA8888 (opaque filler, `tRNS`
//!   expanded to alpha)
//! - 1/2/4/8-bit grayscale becomes A8
//! - 16-bit grayscale becomes A16, little-endian in memory
//!
//! Gray+alpha drops its alpha channel. 16-bit color is refused. Writes are
//! RGBA8888, A8 or A16; anything else is converted by the caller first.

use std::io::BufReader;

use png::{BitDepth, ColorType, Transformations};
use tracing::debug;
use vtex_core::{Image, PixelFormat};

use crate::codec::{ImageCodec, ensure_writable, rewind_on_error, single_image, validate_header_dimensions};
use crate::detect::ImageFormat;
use crate::error::{IoError, IoResult};
use crate::file::ImageSource;
use crate::info::{ImageInfo, ImageQuality, LoadingParams};

const SUPPORTED_FORMATS: &[PixelFormat] = &[PixelFormat::Rgba8888, PixelFormat::A8, PixelFormat::A16];

/// PNG codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

impl PngCodec {
    pub fn new() -> Self {
        Self
    }

    fn decode_image(&self, src: &mut dyn ImageSource, params: &LoadingParams) -> IoResult<Image> {
        src.rewind_to_start()?;
        let mut reader = open_decoder(src)?;
        let (width, height) = reader.info().size();
        validate_header_dimensions(width, height, 1)?;

        let buf_size = reader
            .output_buffer_size()
            .ok_or_else(|| IoError::ReadFailed("PNG output buffer size overflows".into()))?;
        let mut buf = vec![0u8; buf_size];
        let frame = reader.next_frame(&mut buf).map_err(decode_error)?;
        buf.truncate(frame.buffer_size());

        let (format, data) = match (frame.color_type, frame.bit_depth) {
            (ColorType::Rgba, BitDepth::Eight) => (PixelFormat::Rgba8888, buf),
            (ColorType::Rgb, BitDepth::Eight) => (
                PixelFormat::Rgba8888,
                buf.chunks_exact(3).flat_map(|px| [px[0], px[1], px[2], 0xff]).collect(),
            ),
            (ColorType::Grayscale, BitDepth::Eight) => (PixelFormat::A8, buf),
            (ColorType::GrayscaleAlpha, BitDepth::Eight) => {
                (PixelFormat::A8, buf.chunks_exact(2).map(|ga| ga[0]).collect())
            }
            (ColorType::Grayscale, BitDepth::Sixteen) => (PixelFormat::A16, swap_u16_bytes(buf)),
            (ColorType::GrayscaleAlpha, BitDepth::Sixteen) => (
                PixelFormat::A16,
                buf.chunks_exact(4).flat_map(|ga| [ga[1], ga[0]]).collect(),
            ),
            (color, depth) => {
                return Err(IoError::FormatUnsupported(format!("PNG {color:?} at {depth:?}")));
            }
        };
        debug!(width, height, %format, "decoded PNG");

        Ok(Image::from_vec(width, height, format, data)?.with_mipmap_level(params.first_mipmap_index))
    }
}

fn decode_error(e: png::DecodingError) -> IoError {
    IoError::ReadFailed(format!("PNG: {e}"))
}

fn open_decoder(src: &mut dyn ImageSource) -> IoResult<png::Reader<BufReader<&mut dyn ImageSource>>> {
    let mut decoder = png::Decoder::new(BufReader::new(src));
    // palette to RGB(A), low bit depths to 8, tRNS to alpha
    decoder.set_transformations(Transformations::EXPAND);
    decoder.read_info().map_err(decode_error)
}

/// Memory format of the decoded pixels for a given output color type.
fn memory_format(color: ColorType, depth: BitDepth) -> Option<PixelFormat> {
    match (color, depth) {
        (ColorType::Rgb | ColorType::Rgba, BitDepth::Eight) => Some(PixelFormat::Rgba8888),
        (ColorType::Grayscale | ColorType::GrayscaleAlpha, BitDepth::Eight) => Some(PixelFormat::A8),
        (ColorType::Grayscale | ColorType::GrayscaleAlpha, BitDepth::Sixteen) => Some(PixelFormat::A16),
        _ => None,
    }
}

/// Big-endian samples in the file, little-endian in memory (and back).
fn swap_u16_bytes(mut data: Vec<u8>) -> Vec<u8> {
    data.chunks_exact_mut(2).for_each(|pair| pair.swap(0, 1));
    data
}

impl ImageCodec for PngCodec {
    fn format(&self) -> ImageFormat {
        ImageFormat::Png
    }

    fn supported_formats(&self) -> &'static [PixelFormat] {
        SUPPORTED_FORMATS
    }

    fn get_info(&self, src: &mut dyn ImageSource) -> IoResult<ImageInfo> {
        src.rewind_to_start()?;
        let header = open_decoder(&mut *src).map(|reader| (reader.info().size(), reader.output_color_type()));
        let total = src.size()?;
        src.rewind_to_start()?;
        let ((width, height), (color, depth)) = header?;
        let format = memory_format(color, depth)
            .ok_or_else(|| IoError::FormatUnsupported(format!("PNG {color:?} at {depth:?}")))?;
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
        let decoded = self.decode_image(src, params).map(|image| vec![image]);
        rewind_on_error(src, decoded)
    }

    fn encode_to_vec(&self, images: &[Image], _quality: ImageQuality) -> IoResult<Vec<u8>> {
        let image = single_image(self, images)?;
        ensure_writable(self, image.format)?;

        let (color, depth, data) = match image.format {
            PixelFormat::Rgba8888 => (ColorType::Rgba, BitDepth::Eight, image.data().to_vec()),
            PixelFormat::A8 => (ColorType::Grayscale, BitDepth::Eight, image.data().to_vec()),
            _ => (ColorType::Grayscale, BitDepth::Sixteen, swap_u16_bytes(image.data().to_vec())),
        };

        let mut out = Vec::new();
        let mut encoder = png::Encoder::new(&mut out, image.width, image.height);
        encoder.set_color(color);
        encoder.set_depth(depth);
        let mut writer = encoder.write_header().map_err(IoError::write_failed)?;
        writer.write_image_data(&data).map_err(IoError::write_failed)?;
        writer.finish().map_err(IoError::write_failed)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode_raw(color: ColorType, depth: BitDepth, width: u32, height: u32, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(color);
        encoder.set_depth(depth);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(data).unwrap();
        writer.finish().unwrap();
        out
    }

    fn decode(bytes: Vec<u8>) -> Image {
        PngCodec::new()
            .decode(&mut Cursor::new(bytes), &LoadingParams::default())
            .unwrap()
            .remove(0)
    }

    #[test]
    fn round_trip_writable_formats() {
        let cases = [
            (PixelFormat::Rgba8888, (0..3 * 2 * 4).map(|i| (i * 29 % 256) as u8).collect::<Vec<_>>()),
            (PixelFormat::A8, vec![0, 10, 20, 30, 40, 250]),
            (PixelFormat::A16, vec![0x34, 0x12, 0xff, 0x00, 0x00, 0xff, 1, 2, 3, 4, 5, 6]),
        ];
        for (format, data) in cases {
            let image = Image::from_vec(3, 2, format, data).unwrap();
            let bytes = PngCodec::new().encode_to_vec(&[image.clone()], ImageQuality::default()).unwrap();
            assert_eq!(ImageFormat::from_bytes(&bytes), ImageFormat::Png);

            let info = PngCodec::new().get_info(&mut Cursor::new(bytes.clone())).unwrap();
            assert_eq!((info.width, info.height, info.format), (3, 2, format));
            assert_eq!(decode(bytes), image, "{format}");
        }
    }

    #[test]
    fn a16_is_big_endian_on_disk() {
        let image = Image::from_vec(1, 1, PixelFormat::A16, vec![0x34, 0x12]).unwrap();
        let bytes = PngCodec::new().encode_to_vec(&[image], ImageQuality::default()).unwrap();
        let mut reader = png::Decoder::new(Cursor::new(bytes)).read_info().unwrap();
        let mut buf = vec![0u8; reader.output_buffer_size().unwrap()];
        reader.next_frame(&mut buf).unwrap();
        assert_eq!(&buf[..2], &[0x12, 0x34]);
    }

    #[test]
    fn rgb_gets_opaque_alpha() {
        let decoded = decode(encode_raw(ColorType::Rgb, BitDepth::Eight, 2, 1, &[1, 2, 3, 4, 5, 6]));
        assert_eq!(decoded.format, PixelFormat::Rgba8888);
        assert_eq!(decoded.data, vec![1, 2, 3, 0xff, 4, 5, 6, 0xff]);
    }

    #[test]
    fn gray_alpha_drops_alpha() {
        let decoded = decode(encode_raw(ColorType::GrayscaleAlpha, BitDepth::Eight, 2, 1, &[7, 100, 9, 200]));
        assert_eq!(decoded.format, PixelFormat::A8);
        assert_eq!(decoded.data, vec![7, 9]);
    }

    #[test]
    fn low_bit_gray_expands_to_a8() {
        // 1-bit row: on, off, on, on
        let decoded = decode(encode_raw(ColorType::Grayscale, BitDepth::One, 4, 1, &[0b1011_0000]));
        assert_eq!(decoded.format, PixelFormat::A8);
        assert_eq!(decoded.data, vec![0xff, 0, 0xff, 0xff]);
    }

    #[test]
    fn palette_expands_to_rgba() {
        let mut out = Vec::new();
        let mut encoder = png::Encoder::new(&mut out, 2, 1);
        encoder.set_color(ColorType::Indexed);
        encoder.set_depth(BitDepth::Eight);
        encoder.set_palette(vec![255, 0, 0, 0, 0, 255]);
        encoder.set_trns(vec![128]);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&[0, 1]).unwrap();
        writer.finish().unwrap();

        let decoded = decode(out);
        assert_eq!(decoded.format, PixelFormat::Rgba8888);
        assert_eq!(decoded.data, vec![255, 0, 0, 128, 0, 0, 255, 255]);
    }

    #[test]
    fn sixteen_bit_color_is_refused() {
        let bytes = encode_raw(ColorType::Rgb, BitDepth::Sixteen, 1, 1, &[0; 6]);
        let mut src = Cursor::new(bytes.clone());
        let err = PngCodec::new().decode(&mut src, &LoadingParams::default()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::FormatUnsupported);
        assert_eq!(src.position(), 0);

        let err = PngCodec::new().get_info(&mut Cursor::new(bytes)).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::FormatUnsupported);
    }

    #[test]
    fn unwritable_format_is_refused() {
        let image = Image::create(2, 2, PixelFormat::Rgb888).unwrap();
        let err = PngCodec::new().encode_to_vec(&[image], ImageQuality::default()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::FormatUnsupported);
    }

    #[test]
    fn truncated_file_is_read_failure() {
        let image = Image::from_vec(4, 4, PixelFormat::A8, (0..16).collect()).unwrap();
        let mut bytes = PngCodec::new().encode_to_vec(&[image], ImageQuality::default()).unwrap();
        bytes.truncate(bytes.len() - 20);
        let mut src = Cursor::new(bytes);
        let err = PngCodec::new().decode(&mut src, &LoadingParams::default()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ReadFailed);
        assert_eq!(src.position(), 0);
    }
}
