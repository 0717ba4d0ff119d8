//! Truevision TGA.
//!
//! Truecolor and grayscale images, raw or run-length encoded, in any of the
//! four origin corners. Color-mapped images and image IDs are refused.
//! Files are always written uncompressed with a top-left origin.
//!
//! TGA has no magic number: a file is recognized only when its 18-byte
//! header passes validation.

use std::io::Read;

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, error};
use vtex_core::convert::swap_red_blue_channels_in_place;
use vtex_core::format::size_in_bytes;
use vtex_core::{Image, PixelFormat};

use crate::codec::{ImageCodec, ensure_writable, rewind_on_error, single_image};
use crate::detect::ImageFormat;
use crate::error::{IoError, IoResult};
use crate::file::{ImageSource, peek_header, read_exact_or_fail};
use crate::info::{ImageInfo, ImageQuality, LoadingParams};
use crate::layout::{map_u16_in_place, swap_1555_red_blue};

/// Header size in bytes.
pub const HEADER_SIZE: usize = 18;

const TYPE_TRUECOLOR: u8 = 2;
const TYPE_GRAY: u8 = 3;
const TYPE_RLE_TRUECOLOR: u8 = 10;
const TYPE_RLE_GRAY: u8 = 11;

const SUPPORTED_FORMATS: &[PixelFormat] = &[
    PixelFormat::Rgba8888,
    PixelFormat::Rgba5551,
    PixelFormat::Rgba4444,
    PixelFormat::Rgb888,
    PixelFormat::Rgb565,
    PixelFormat::Rgba16161616,
    PixelFormat::Rgba32323232,
    PixelFormat::A8,
    PixelFormat::A16,
];

/// Corner of the first stored pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    BottomLeft,
    BottomRight,
    TopLeft,
    TopRight,
}

impl Origin {
    fn from_descriptor(descriptor: u8) -> Self {
        match (descriptor >> 4) & 3 {
            0 => Origin::BottomLeft,
            1 => Origin::BottomRight,
            2 => Origin::TopLeft,
            _ => Origin::TopRight,
        }
    }
}

/// Validated TGA header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TgaHeader {
    pub image_type: u8,
    pub width: u16,
    pub height: u16,
    pub bits_per_pixel: u8,
    pub alpha_bits: u8,
    pub origin: Origin,
}

impl TgaHeader {
    /// Parses and validates 18 header bytes.
    pub fn parse(raw: &[u8]) -> IoResult<Self> {
        let unrecognized = |what: &str| IoError::FormatUnrecognized(format!("not a TGA file: {what}"));
        if raw.len() < HEADER_SIZE {
            return Err(unrecognized("header is truncated"));
        }
        if raw[0] != 0 {
            return Err(unrecognized("image ID present"));
        }
        if raw[1] != 0 || raw[3..8].iter().any(|&b| b != 0) {
            return Err(unrecognized("color map present"));
        }
        let image_type = raw[2];
        if !matches!(image_type, TYPE_TRUECOLOR | TYPE_GRAY | TYPE_RLE_TRUECOLOR | TYPE_RLE_GRAY) {
            return Err(unrecognized("image type"));
        }
        let width = LittleEndian::read_u16(&raw[12..14]);
        let height = LittleEndian::read_u16(&raw[14..16]);
        if width == 0 || height == 0 {
            return Err(unrecognized("zero dimension"));
        }
        let bits_per_pixel = raw[16];
        if bits_per_pixel % 8 != 0 || !matches!(bits_per_pixel >> 3, 1 | 2 | 3 | 4 | 8 | 16) {
            return Err(unrecognized("pixel depth"));
        }
        let descriptor = raw[17];
        let alpha_bits = descriptor & 0x0f;
        if !matches!(alpha_bits, 0 | 1 | 4 | 8) {
            return Err(unrecognized("alpha depth"));
        }
        Ok(Self {
            image_type,
            width,
            height,
            bits_per_pixel,
            alpha_bits,
            origin: Origin::from_descriptor(descriptor),
        })
    }

    /// True for grayscale images.
    pub fn is_gray(&self) -> bool {
        matches!(self.image_type, TYPE_GRAY | TYPE_RLE_GRAY)
    }

    /// True for run-length encoded images.
    pub fn is_rle(&self) -> bool {
        matches!(self.image_type, TYPE_RLE_TRUECOLOR | TYPE_RLE_GRAY)
    }

    /// Bytes per stored pixel.
    pub fn pixel_size(&self) -> usize {
        (self.bits_per_pixel >> 3) as usize
    }

    /// Engine format of the pixels, `None` for unsupported combinations.
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        let format = if self.is_gray() {
            match self.pixel_size() {
                1 => PixelFormat::A8,
                2 => PixelFormat::A16,
                _ => return None,
            }
        } else {
            match (self.pixel_size(), self.alpha_bits) {
                (2, 0) => PixelFormat::Rgb565,
                (2, 1) => PixelFormat::Rgba5551,
                (2, 4) => PixelFormat::Rgba4444,
                (3, 0) => PixelFormat::Rgb888,
                (4, 8) => PixelFormat::Rgba8888,
                (8, _) => PixelFormat::Rgba16161616,
                (16, _) => PixelFormat::Rgba32323232,
                _ => return None,
            }
        };
        Some(format)
    }
}

/// Header fields written for `format`: image type, depth and alpha bits.
fn header_fields(format: PixelFormat) -> Option<(u8, u8, u8)> {
    let fields = match format {
        PixelFormat::Rgba8888 => (TYPE_TRUECOLOR, 32, 8),
        PixelFormat::Rgba5551 => (TYPE_TRUECOLOR, 16, 1),
        PixelFormat::Rgba4444 => (TYPE_TRUECOLOR, 16, 4),
        PixelFormat::Rgb888 => (TYPE_TRUECOLOR, 24, 0),
        PixelFormat::Rgb565 => (TYPE_TRUECOLOR, 16, 0),
        // the 4-bit alpha field cannot hold 16 or 32
        PixelFormat::Rgba16161616 => (TYPE_TRUECOLOR, 64, 8),
        PixelFormat::Rgba32323232 => (TYPE_TRUECOLOR, 128, 8),
        PixelFormat::A8 => (TYPE_GRAY, 8, 8),
        PixelFormat::A16 => (TYPE_GRAY, 16, 8),
        _ => return None,
    };
    Some(fields)
}

/// Expands RLE packets into `pixel_count * pixel_size` bytes.
fn decode_rle(src: &[u8], pixel_count: usize, pixel_size: usize) -> IoResult<Vec<u8>> {
    let total = pixel_count * pixel_size;
    let mut out = Vec::with_capacity(total);
    let mut pos = 0;
    let truncated = || IoError::ReadFailed("TGA RLE data is truncated".into());

    while out.len() < total {
        let header = *src.get(pos).ok_or_else(truncated)?;
        pos += 1;
        if header < 128 {
            let bytes = (header as usize + 1) * pixel_size;
            let raw = src.get(pos..pos + bytes).ok_or_else(truncated)?;
            out.extend_from_slice(raw);
            pos += bytes;
        } else {
            let count = header as usize - 127;
            let px = src.get(pos..pos + pixel_size).ok_or_else(truncated)?;
            for _ in 0..count {
                out.extend_from_slice(px);
            }
            pos += pixel_size;
        }
    }
    // a packet may run past the last row
    out.truncate(total);
    Ok(out)
}

fn orient(image: &mut Image, origin: Origin) -> IoResult<()> {
    match origin {
        Origin::TopLeft => {}
        Origin::BottomLeft => image.flip_vertical()?,
        Origin::TopRight => image.flip_horizontal()?,
        Origin::BottomRight => {
            image.flip_vertical()?;
            image.flip_horizontal()?;
        }
    }
    Ok(())
}

/// Swaps red and blue of truecolor pixels. Self-inverse except for the
/// forced 5551 alpha.
fn swap_truecolor(image: &mut Image) -> IoResult<()> {
    let (w, h, format, pitch) = (image.width, image.height, image.format, image.pitch());
    if format == PixelFormat::Rgba5551 {
        // 16-bit TGA alpha is unreliable: force it opaque
        map_u16_in_place(&mut image.data, |v| swap_1555_red_blue(v) | 0x8000);
        return Ok(());
    }
    if swap_red_blue_channels_in_place(format, &mut image.data, w, h, pitch) {
        Ok(())
    } else {
        Err(IoError::FormatUnsupported(format!("{format} in TGA")))
    }
}

/// TGA codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct TgaCodec;

impl TgaCodec {
    /// Creates the codec.
    pub fn new() -> Self {
        Self
    }

    /// Reads and validates the header, leaving `src` after it.
    pub fn read_header(&self, src: &mut dyn ImageSource) -> IoResult<TgaHeader> {
        src.rewind_to_start()?;
        let mut raw = [0u8; HEADER_SIZE];
        if src.read_exact(&mut raw).is_err() {
            src.rewind_to_start()?;
            return Err(IoError::FormatUnrecognized("not a TGA file: header is truncated".into()));
        }
        let header = TgaHeader::parse(&raw);
        rewind_on_error(src, header)
    }

    fn decode_image(&self, src: &mut dyn ImageSource, params: &LoadingParams) -> IoResult<Image> {
        let header = self.read_header(src)?;
        let Some(format) = header.pixel_format() else {
            error!(?header, "unsupported TGA pixel layout");
            return Err(IoError::FormatUnsupported(format!(
                "TGA with {} bits per pixel and {} alpha bits",
                header.bits_per_pixel, header.alpha_bits
            )));
        };
        let (w, h) = (u32::from(header.width), u32::from(header.height));
        let size = size_in_bytes(w, h, format);
        debug!(%format, width = w, height = h, rle = header.is_rle(), origin = ?header.origin, "decoding TGA");

        let data = if header.is_rle() {
            let mut packed = Vec::new();
            src.read_to_end(&mut packed)?;
            decode_rle(&packed, w as usize * h as usize, header.pixel_size())?
        } else {
            let mut data = vec![0u8; size];
            read_exact_or_fail(src, &mut data, "TGA pixel data")?;
            data
        };

        let mut image = Image::from_vec(w, h, format, data)?.with_mipmap_level(params.first_mipmap_index);
        orient(&mut image, header.origin)?;
        if !header.is_gray() {
            swap_truecolor(&mut image)?;
        }
        Ok(image)
    }
}

impl ImageCodec for TgaCodec {
    fn format(&self) -> ImageFormat {
        ImageFormat::Tga
    }

    fn supported_formats(&self) -> &'static [PixelFormat] {
        SUPPORTED_FORMATS
    }

    fn can_process(&self, src: &mut dyn ImageSource) -> bool {
        match peek_header(src, HEADER_SIZE) {
            Ok(raw) => TgaHeader::parse(&raw).is_ok_and(|h| h.pixel_format().is_some()),
            Err(_) => false,
        }
    }

    fn get_info(&self, src: &mut dyn ImageSource) -> IoResult<ImageInfo> {
        let header = self.read_header(src)?;
        let total = src.size()?;
        src.rewind_to_start()?;
        Ok(ImageInfo {
            width: u32::from(header.width),
            height: u32::from(header.height),
            format: header.pixel_format().unwrap_or(PixelFormat::Invalid),
            data_size: total.saturating_sub(HEADER_SIZE as u64),
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
        let Some((image_type, bits, alpha_bits)) = header_fields(image.format) else {
            return Err(IoError::FormatUnsupported(format!("{} cannot be written to TGA", image.format)));
        };
        let (width, height) = match (u16::try_from(image.width), u16::try_from(image.height)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => return Err(IoError::dimension_invalid(image.width, image.height, "TGA is limited to 65535")),
        };

        let mut header = [0u8; HEADER_SIZE];
        header[2] = image_type;
        LittleEndian::write_u16(&mut header[10..12], height);
        LittleEndian::write_u16(&mut header[12..14], width);
        LittleEndian::write_u16(&mut header[14..16], height);
        header[16] = bits;
        header[17] = alpha_bits | (2 << 4);

        let mut pixels = image.clone();
        if image_type == TYPE_TRUECOLOR {
            swap_truecolor(&mut pixels)?;
        }

        let mut out = Vec::with_capacity(HEADER_SIZE + pixels.data.len());
        out.extend_from_slice(&header);
        out.extend_from_slice(&pixels.data);
        Ok(out)
    }
}
