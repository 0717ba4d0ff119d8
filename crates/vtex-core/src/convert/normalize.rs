//! Per-pixel vector normalization for normal maps.

use super::pixel::{read_u16, write_u16};
use byteorder::{ByteOrder, LittleEndian};
use half::f16;
use tracing::error;

use crate::format::PixelFormat;

/// Re-normalizes the RGB vector of one RGBA8888 pixel.
///
/// Channels are decoded from `[0, 255]` to `[-1, 1]`, normalized, then
/// re-encoded with truncation. Alpha passes through. A zero vector stays at
/// the encoded origin.
pub fn normalize_rgba8_pixel(px: [u8; 4]) -> [u8; 4] {
    let mut v = [0usize, 1, 2].map(|i| f32::from(px[i]) / 255.0 * 2.0 - 1.0);
    normalize_vec(&mut v);
    let enc = v.map(|c| (255.0 * (c * 0.5 + 0.5)) as u8);
    [enc[0], enc[1], enc[2], px[3]]
}

fn normalize_vec(v: &mut [f32]) {
    let len = v.iter().map(|c| c * c).sum::<f32>().sqrt();
    if len > 0.0 {
        for c in v.iter_mut() {
            *c /= len;
        }
    }
}

/// Normalizes every pixel of a `width` x `height` plane from `input` into
/// `output`.
///
/// Supported formats: RGBA8888 (RGB treated as an encoded vector, alpha
/// kept), RGB16F and RGB32F (3-vectors), RGBA16F and RGBA32F (4-vectors).
/// Any other format is logged as an error and refused.
pub fn normalize(
    format: PixelFormat,
    input: &[u8],
    width: u32,
    height: u32,
    pitch: usize,
    output: &mut [u8],
) -> bool {
    let Some(px_size) = supported_size(format) else {
        error!(%format, "normalize: unsupported pixel format");
        return false;
    };
    super::convert_direct_with(input, width, height, pitch, px_size, output, pitch, px_size, |s, d| {
        d.copy_from_slice(s);
        normalize_pixel(format, d);
    })
}

/// In-place variant of [`normalize`].
pub fn normalize_in_place(format: PixelFormat, data: &mut [u8], width: u32, height: u32, pitch: usize) -> bool {
    let Some(px_size) = supported_size(format) else {
        error!(%format, "normalize: unsupported pixel format");
        return false;
    };
    super::transform_in_place(data, width, height, pitch, px_size, |px| normalize_pixel(format, px))
}

fn supported_size(format: PixelFormat) -> Option<usize> {
    match format {
        PixelFormat::Rgba8888
        | PixelFormat::Rgb16F
        | PixelFormat::Rgb32F
        | PixelFormat::Rgba16F
        | PixelFormat::Rgba32F => format.bytes_per_pixel(),
        _ => None,
    }
}

fn normalize_pixel(format: PixelFormat, px: &mut [u8]) {
    match format {
        PixelFormat::Rgba8888 => {
            let n = normalize_rgba8_pixel([px[0], px[1], px[2], px[3]]);
            px[..4].copy_from_slice(&n);
        }
        PixelFormat::Rgb16F | PixelFormat::Rgba16F => {
            let n = format.float_channels() as usize;
            let mut v = [0f32; 4];
            for i in 0..n {
                v[i] = f16::from_bits(read_u16(&px[i * 2..])).to_f32();
            }
            normalize_vec(&mut v[..n]);
            for i in 0..n {
                write_u16(&mut px[i * 2..], f16::from_f32(v[i]).to_bits());
            }
        }
        PixelFormat::Rgb32F | PixelFormat::Rgba32F => {
            let n = format.float_channels() as usize;
            let mut v = [0f32; 4];
            for i in 0..n {
                v[i] = LittleEndian::read_f32(&px[i * 4..]);
            }
            normalize_vec(&mut v[..n]);
            for i in 0..n {
                LittleEndian::write_f32(&mut px[i * 4..], v[i]);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rgba8_vector_is_unit_length() {
        let out = normalize_rgba8_pixel([255, 255, 128, 77]);
        let v: Vec<f32> = out[..3].iter().map(|c| f32::from(*c) / 255.0 * 2.0 - 1.0).collect();
        let len = v.iter().map(|c| c * c).sum::<f32>().sqrt();
        assert_relative_eq!(len, 1.0, epsilon = 0.02);
        assert_eq!(out[3], 77);
    }

    #[test]
    fn rgb32f_normalized_in_place() {
        let mut data = [0u8; 12];
        LittleEndian::write_f32(&mut data[0..], 3.0);
        LittleEndian::write_f32(&mut data[4..], 4.0);
        assert!(normalize_in_place(PixelFormat::Rgb32F, &mut data, 1, 1, 12));
        assert_relative_eq!(LittleEndian::read_f32(&data[0..]), 0.6);
        assert_relative_eq!(LittleEndian::read_f32(&data[4..]), 0.8);
        assert_relative_eq!(LittleEndian::read_f32(&data[8..]), 0.0);
    }

    #[test]
    fn rejects_packed_formats() {
        let mut data = [0u8; 2];
        assert!(!normalize_in_place(PixelFormat::Rgb565, &mut data, 1, 1, 2));
    }
}
