//! Conversion between half and full float layouts.

use super::pixel::{read_u16, write_u16};
use crate::format::PixelFormat;
use byteorder::{ByteOrder, LittleEndian};
use half::f16;
use tracing::debug;

/// Converts a tightly packed float plane between any two float formats.
///
/// Only the channels both formats share are written; extra destination
/// channels keep whatever `output` held. Returns `false` when either format
/// is not a float format or a buffer is too small.
pub fn convert_float_formats(
    width: u32,
    height: u32,
    in_format: PixelFormat,
    out_format: PixelFormat,
    input: &[u8],
    output: &mut [u8],
) -> bool {
    if !in_format.is_float() || !out_format.is_float() {
        debug!(from = %in_format, to = %out_format, "float conversion needs float formats");
        return false;
    }
    let in_ch = in_format.float_channels() as usize;
    let out_ch = out_format.float_channels() as usize;
    let in_cs = in_format.float_channel_size() as usize;
    let out_cs = out_format.float_channel_size() as usize;
    let shared = in_ch.min(out_ch);

    let pixels = width as usize * height as usize;
    if input.len() < pixels * in_ch * in_cs || output.len() < pixels * out_ch * out_cs {
        return false;
    }

    for (src, dst) in input
        .chunks_exact(in_ch * in_cs)
        .zip(output.chunks_exact_mut(out_ch * out_cs))
        .take(pixels)
    {
        for c in 0..shared {
            let v = if in_cs == 2 {
                f16::from_bits(read_u16(&src[c * 2..])).to_f32()
            } else {
                LittleEndian::read_f32(&src[c * 4..])
            };
            if out_cs == 2 {
                write_u16(&mut dst[c * 2..], f16::from_f32(v).to_bits());
            } else {
                LittleEndian::write_f32(&mut dst[c * 4..], v);
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn half_to_full_keeps_shared_channels() {
        let mut input = [0u8; 4];
        write_u16(&mut input[0..], f16::from_f32(0.5).to_bits());
        write_u16(&mut input[2..], f16::from_f32(-2.0).to_bits());
        let mut output = [0xffu8; 16];
        assert!(convert_float_formats(1, 1, PixelFormat::Rg16F, PixelFormat::Rgba32F, &input, &mut output));
        assert_relative_eq!(LittleEndian::read_f32(&output[0..]), 0.5);
        assert_relative_eq!(LittleEndian::read_f32(&output[4..]), -2.0);
        assert_eq!(&output[8..], &[0xff; 8]);
    }

    #[test]
    fn rejects_integer_formats() {
        let mut output = [0u8; 16];
        assert!(!convert_float_formats(1, 1, PixelFormat::Rgba8888, PixelFormat::Rgba32F, &[0; 4], &mut output));
    }
}
