//! Radiance HDR (RGBE).
//!
//! Reads flat and new-style RLE scanlines into RGBA32F with an opaque
//! alpha. Writes RLE scanlines whenever the width allows it.
//!
//! Header lines other than `FORMAT` and the resolution line are accepted
//! and ignored. The resolution line decides the scan order: `-Y h +X w` is
//! top-down rows, `+Y` runs bottom-up, `-X` right to left, and an X-first
//! line (`+X w -Y h`) stores columns. Decoded images are always top-down
//! rows.

use std::io::{BufRead, BufReader, Read, Write};

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;
use vtex_core::{Image, PixelFormat};

use crate::codec::{ImageCodec, ensure_writable, rewind_on_error, single_image, validate_header_dimensions};
use crate::detect::ImageFormat;
use crate::error::{IoError, IoResult};
use crate::file::ImageSource;
use crate::info::{ImageInfo, ImageQuality, LoadingParams};

const HDR_MAGIC: &str = "#?";
const RLE_MIN_WIDTH: usize = 8;
const RLE_MAX_WIDTH: usize = 0x7fff;
// guards against a header without a resolution line
const MAX_HEADER_LINES: usize = 512;

const SUPPORTED_FORMATS: &[PixelFormat] = &[PixelFormat::Rgba32F];

/// Options for writing HDR files.
#[derive(Debug, Clone, PartialEq)]
pub struct HdrWriterOptions {
    /// Run-length encode scanlines when the width allows it.
    pub rle: bool,
    /// Optional `SOFTWARE=` header line.
    pub software: Option<String>,
}

impl Default for HdrWriterOptions {
    fn default() -> Self {
        Self {
            rle: true,
            software: None,
        }
    }
}

/// Scan order read from the resolution line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Orientation {
    /// X-first line: each scanline is a column.
    pub column_major: bool,
    /// `-X`: pixels run right to left.
    pub flip_horizontal: bool,
    /// `+Y`: rows run bottom to top.
    pub flip_vertical: bool,
}

/// Parsed header of an HDR file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdrHeader {
    pub width: u32,
    pub height: u32,
    /// Value of the `FORMAT=` line.
    pub format: String,
    pub orientation: Orientation,
}

impl HdrHeader {
    /// Pixels per stored scanline and number of scanlines.
    fn scan_shape(&self) -> (usize, usize) {
        let (w, h) = (self.width as usize, self.height as usize);
        if self.orientation.column_major { (h, w) } else { (w, h) }
    }
}

/// Radiance HDR codec.
#[derive(Debug, Clone, Default)]
pub struct HdrCodec {
    options: HdrWriterOptions,
}

impl HdrCodec {
    /// Creates a codec with default writer options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a codec with custom writer options.
    pub fn with_options(options: HdrWriterOptions) -> Self {
        Self { options }
    }

    /// Writer options in use.
    pub fn options(&self) -> &HdrWriterOptions {
        &self.options
    }

    fn read_header_from(&self, src: &mut dyn ImageSource) -> IoResult<(HdrHeader, Vec<u8>)> {
        src.rewind_to_start()?;
        let mut reader = BufReader::new(&mut *src);
        let parsed = read_header(&mut reader).and_then(|header| {
            let mut rest = Vec::new();
            reader.read_to_end(&mut rest)?;
            Ok((header, rest))
        });
        drop(reader);
        rewind_on_error(src, parsed)
    }

    fn decode_image(&self, src: &mut dyn ImageSource, params: &LoadingParams) -> IoResult<Image> {
        let (header, payload) = self.read_header_from(src)?;
        let orientation = header.orientation;
        debug!(width = header.width, height = header.height, format = %header.format, ?orientation, "decoding HDR");

        let (scan_len, scan_count) = header.scan_shape();
        let mut rgbe = read_pixels(&payload, scan_len, scan_count)?;
        if orientation.column_major {
            rgbe = transpose_rgbe(&rgbe, scan_len, scan_count);
        }

        let mut data = vec![0u8; rgbe.len() * 4];
        for (px, out) in rgbe.chunks_exact(4).zip(data.chunks_exact_mut(16)) {
            let (r, g, b) = rgbe_to_f32(px[0], px[1], px[2], px[3]);
            LittleEndian::write_f32_into(&[r, g, b, 1.0], out);
        }
        let mut image = Image::from_vec(header.width, header.height, PixelFormat::Rgba32F, data)?
            .with_mipmap_level(params.first_mipmap_index);
        if orientation.flip_horizontal {
            image.flip_horizontal()?;
        }
        if orientation.flip_vertical {
            image.flip_vertical()?;
        }
        Ok(image)
    }
}

impl ImageCodec for HdrCodec {
    fn format(&self) -> ImageFormat {
        ImageFormat::Hdr
    }

    fn supported_formats(&self) -> &'static [PixelFormat] {
        SUPPORTED_FORMATS
    }

    fn get_info(&self, src: &mut dyn ImageSource) -> IoResult<ImageInfo> {
        src.rewind_to_start()?;
        let mut reader = BufReader::new(&mut *src);
        let header = read_header(&mut reader);
        drop(reader);
        let total = src.size()?;
        src.rewind_to_start()?;
        let header = header?;
        Ok(ImageInfo {
            width: header.width,
            height: header.height,
            format: PixelFormat::Rgba32F,
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

        let mut out = Vec::new();
        write_header(&mut out, image.width, image.height, &self.options).map_err(IoError::write_failed)?;
        write_pixels(&mut out, image, self.options.rle).map_err(IoError::write_failed)?;
        Ok(out)
    }
}

fn read_header<R: BufRead>(reader: &mut R) -> IoResult<HdrHeader> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if !trim_line(&line).starts_with(HDR_MAGIC) {
        return Err(IoError::FormatUnrecognized("HDR magic not found".into()));
    }

    let mut format = "32-bit_rle_rgbe".to_string();
    for _ in 0..MAX_HEADER_LINES {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let line = trim_line(&line);
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('+') || line.starts_with('-') {
            let (width, height, orientation) = parse_resolution(line)
                .ok_or_else(|| IoError::ReadFailed(format!("invalid HDR resolution line {line:?}")))?;
            validate_header_dimensions(width, height, 1)?;
            return Ok(HdrHeader {
                width,
                height,
                format,
                orientation,
            });
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim().eq_ignore_ascii_case("FORMAT") {
                format = value.trim().to_string();
            }
        }
    }
    Err(IoError::ReadFailed("HDR resolution line not found".into()))
}

fn write_header<W: Write>(writer: &mut W, width: u32, height: u32, options: &HdrWriterOptions) -> std::io::Result<()> {
    writeln!(writer, "{HDR_MAGIC}RADIANCE")?;
    writeln!(writer, "FORMAT=32-bit_rle_rgbe")?;
    if let Some(software) = &options.software {
        writeln!(writer, "SOFTWARE={software}")?;
    }
    writeln!(writer)?;
    writeln!(writer, "-Y {height} +X {width}")
}

/// Fewest payload bytes `height` RLE scanlines of `width` pixels can take.
fn min_payload_len(width: usize, height: usize) -> Option<usize> {
    // a run packet is 2 bytes for up to 127 values, per channel
    let per_scanline = width.div_ceil(127).checked_mul(2 * 4)?.checked_add(4)?;
    per_scanline.checked_mul(height)
}

/// Reads `height` scanlines of `width` RGBE quadruples, flat or RLE.
///
/// The payload length is checked against the smallest possible encoding
/// before the output is allocated.
fn read_pixels(payload: &[u8], width: usize, height: usize) -> IoResult<Vec<u8>> {
    let truncated = |_| IoError::ReadFailed("HDR pixel data is truncated".into());
    let size = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| IoError::ReadFailed(format!("HDR image {width}x{height} is too large")))?;
    let needed = min_payload_len(width, height).unwrap_or(usize::MAX).min(size);
    if payload.len() < needed {
        return Err(IoError::ReadFailed(format!(
            "HDR pixel data is truncated: {} bytes for {width}x{height}",
            payload.len()
        )));
    }
    let mut rgbe = vec![0u8; size];
    if rgbe.is_empty() {
        return Ok(rgbe);
    }
    let reader = &mut &payload[..];
    let mut first = [0u8; 4];
    reader.read_exact(&mut first).map_err(truncated)?;

    let use_rle = (RLE_MIN_WIDTH..=RLE_MAX_WIDTH).contains(&width)
        && first[0] == 2
        && first[1] == 2
        && ((first[2] as usize) << 8 | first[3] as usize) == width;

    if use_rle {
        let mut header = first;
        for scanline in rgbe.chunks_exact_mut(width * 4) {
            decode_rle_scanline(reader, width, scanline, header)?;
            if reader.read_exact(&mut header).is_err() {
                header = [0; 4];
            }
        }
    } else {
        rgbe[0..4].copy_from_slice(&first);
        reader.read_exact(&mut rgbe[4..]).map_err(truncated)?;
    }
    Ok(rgbe)
}

fn decode_rle_scanline<R: Read>(reader: &mut R, width: usize, out: &mut [u8], header: [u8; 4]) -> IoResult<()> {
    if header[0] != 2 || header[1] != 2 {
        return Err(IoError::ReadFailed("HDR RLE scanline header invalid".into()));
    }
    let encoded_width = ((header[2] as usize) << 8) | (header[3] as usize);
    if encoded_width != width {
        return Err(IoError::ReadFailed("HDR RLE width mismatch".into()));
    }
    let bad_run = || IoError::ReadFailed("HDR RLE run overflows the scanline".into());

    let mut channel = vec![0u8; width];
    for c in 0..4 {
        let mut idx = 0usize;
        while idx < width {
            let mut count = [0u8; 1];
            reader.read_exact(&mut count)?;
            let count = count[0] as usize;
            if count > 128 {
                let run = count - 128;
                if idx + run > width {
                    return Err(bad_run());
                }
                let mut value = [0u8; 1];
                reader.read_exact(&mut value)?;
                channel[idx..idx + run].fill(value[0]);
                idx += run;
            } else {
                if count == 0 || idx + count > width {
                    return Err(bad_run());
                }
                reader.read_exact(&mut channel[idx..idx + count])?;
                idx += count;
            }
        }
        for (x, &v) in channel.iter().enumerate() {
            out[x * 4 + c] = v;
        }
    }
    Ok(())
}

fn write_pixels<W: Write>(writer: &mut W, image: &Image, rle: bool) -> std::io::Result<()> {
    let width = image.width as usize;
    let use_rle = rle && (RLE_MIN_WIDTH..=RLE_MAX_WIDTH).contains(&width);

    let mut scanline = vec![0u8; width * 4];
    let mut px = [0f32; 4];
    for row in image.data().chunks_exact(width * 16) {
        for (src, dst) in row.chunks_exact(16).zip(scanline.chunks_exact_mut(4)) {
            LittleEndian::read_f32_into(src, &mut px);
            dst.copy_from_slice(&f32_to_rgbe(px[0], px[1], px[2]));
        }

        if use_rle {
            writer.write_all(&[2, 2, (width >> 8) as u8, (width & 0xff) as u8])?;
            encode_rle_scanline(writer, width, &scanline)?;
        } else {
            writer.write_all(&scanline)?;
        }
    }
    Ok(())
}

fn encode_rle_scanline<W: Write>(writer: &mut W, width: usize, scanline: &[u8]) -> std::io::Result<()> {
    let mut channel = vec![0u8; width];
    for c in 0..4 {
        for (x, v) in channel.iter_mut().enumerate() {
            *v = scanline[x * 4 + c];
        }
        writer.write_all(&encode_rle_channel(&channel))?;
    }
    Ok(())
}

fn encode_rle_channel(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut i = 0usize;
    while i < data.len() {
        let mut run = 1usize;
        while i + run < data.len() && run < 127 && data[i] == data[i + run] {
            run += 1;
        }

        if run >= 4 {
            out.push((128 + run) as u8);
            out.push(data[i]);
            i += run;
            continue;
        }

        let start = i;
        let mut literal = 0usize;
        while i < data.len() {
            run = 1;
            while i + run < data.len() && run < 127 && data[i] == data[i + run] {
                run += 1;
            }
            if run >= 4 {
                break;
            }
            i += 1;
            literal += 1;
            if literal == 128 {
                break;
            }
        }
        out.push(literal as u8);
        out.extend_from_slice(&data[start..start + literal]);
    }
    out
}

fn f32_to_rgbe(r: f32, g: f32, b: f32) -> [u8; 4] {
    let r = r.max(0.0);
    let g = g.max(0.0);
    let b = b.max(0.0);
    let max = r.max(g).max(b);
    if max < 1.0e-32 {
        return [0, 0, 0, 0];
    }

    let (m, e) = frexp(max);
    let scale = m * 256.0 / max;

    [
        (r * scale).clamp(0.0, 255.0) as u8,
        (g * scale).clamp(0.0, 255.0) as u8,
        (b * scale).clamp(0.0, 255.0) as u8,
        (e + 128).clamp(0, 255) as u8,
    ]
}

/// `value = mantissa / 256 * 2^(e - 128)`, so scaling the raw byte by
/// `2^(e - 136)` is the same as `value * 2^(exponent - 128)`.
fn rgbe_to_f32(r: u8, g: u8, b: u8, e: u8) -> (f32, f32, f32) {
    if e == 0 {
        return (0.0, 0.0, 0.0);
    }
    let f = 2.0_f32.powi(e as i32 - 136);
    (r as f32 * f, g as f32 * f, b as f32 * f)
}

fn frexp(x: f32) -> (f32, i32) {
    if x == 0.0 {
        return (0.0, 0);
    }
    let e = x.abs().log2().floor() as i32 + 1;
    let m = x / 2.0_f32.powi(e);
    (m, e)
}

/// Splits an axis token such as `-Y` into (positive, axis).
fn parse_axis(token: &str) -> Option<(bool, char)> {
    let mut chars = token.chars();
    let positive = match chars.next()? {
        '+' => true,
        '-' => false,
        _ => return None,
    };
    let axis = chars.next()?;
    chars.next().is_none().then_some((positive, axis))
}

/// Parses a resolution line into width, height and scan order.
fn parse_resolution(line: &str) -> Option<(u32, u32, Orientation)> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let [major, major_len, minor, minor_len] = parts.as_slice() else {
        return None;
    };
    let (major_positive, major_axis) = parse_axis(major)?;
    let (minor_positive, minor_axis) = parse_axis(minor)?;
    let major_len: u32 = major_len.parse().ok()?;
    let minor_len: u32 = minor_len.parse().ok()?;

    let (width, height, x_positive, y_positive, column_major) = match (major_axis, minor_axis) {
        ('Y', 'X') => (minor_len, major_len, minor_positive, major_positive, false),
        ('X', 'Y') => (major_len, minor_len, major_positive, minor_positive, true),
        _ => return None,
    };
    let orientation = Orientation {
        column_major,
        flip_horizontal: !x_positive,
        flip_vertical: y_positive,
    };
    (width > 0 && height > 0).then_some((width, height, orientation))
}

/// Turns `columns` stored scanlines of `rows` pixels into row-major order.
fn transpose_rgbe(rgbe: &[u8], rows: usize, columns: usize) -> Vec<u8> {
    let mut out = vec![0u8; rgbe.len()];
    for (x, column) in rgbe.chunks_exact(rows * 4).enumerate() {
        for (y, px) in column.chunks_exact(4).enumerate() {
            let dst = (y * columns + x) * 4;
            out[dst..dst + 4].copy_from_slice(px);
        }
    }
    out
}

fn trim_line(line: &str) -> &str {
    line.trim_end_matches(&['\r', '\n'][..])
}
