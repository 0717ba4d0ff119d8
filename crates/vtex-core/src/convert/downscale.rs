//! 2x box downscale used to build mip chains.
//!
//! Every output pixel is the average of the 2x2 source block under it. When
//! a source dimension is already 1 the corresponding stride collapses to 0 so
//! the same pixel is sampled twice along that axis.

use super::normalize::normalize_rgba8_pixel;
use super::pixel::{pack_4444, pack_5551, read_u16, unpack_4444, unpack_5551, write_u16};
use crate::error::{Error, Result};
use crate::format::{self, PixelFormat};
use crate::image::Image;
use byteorder::{ByteOrder, LittleEndian};
use half::f16;
use std::ops::{Add, Div};
use tracing::debug;

/// Halves a `in_width` x `in_height` plane into `out_width` x `out_height`.
///
/// Supported pairs are RGBA8888 to RGBA8888 or RGBA4444, RGBA4444 to
/// RGBA8888, and same-format reduction for A8, RGB888, RGBA5551,
/// RGBA16161616, RGBA32323232, RGBA16F and RGBA32F. With `normalize` set, an
/// RGBA8888 to RGBA8888 reduction re-normalizes each averaged RGB vector.
///
/// Returns `false` for any other pair or for undersized buffers.
#[allow(clippy::too_many_arguments)]
pub fn downscale_twice_bilinear(
    in_format: PixelFormat,
    out_format: PixelFormat,
    input: &[u8],
    in_width: u32,
    in_height: u32,
    in_pitch: usize,
    output: &mut [u8],
    out_width: u32,
    out_height: u32,
    out_pitch: usize,
    normalize: bool,
) -> bool {
    use PixelFormat::*;

    let plane = Plane {
        input,
        in_width,
        in_height,
        in_pitch,
        in_px: in_format.bytes_per_pixel().unwrap_or(0),
        out_width,
        out_height,
        out_pitch,
        out_px: out_format.bytes_per_pixel().unwrap_or(0),
    };

    match (in_format, out_format) {
        (Rgba8888, Rgba8888) if normalize => plane.reduce(output, unpack_bytes, |c: [u64; 4], px| {
            let n = normalize_rgba8_pixel([c[0] as u8, c[1] as u8, c[2] as u8, c[3] as u8]);
            px[..4].copy_from_slice(&n);
        }),
        (Rgba8888, Rgba8888) => plane.reduce(output, unpack_bytes, pack_bytes),
        (Rgba8888, Rgba4444) => plane.reduce(output, unpack_bytes, |c: [u64; 4], px| {
            let n = c.map(|v| (v >> 4) as u32);
            write_u16(px, pack_4444(n));
        }),
        (Rgba4444, Rgba8888) => plane.reduce(
            output,
            |px| unpack_4444(read_u16(px)).map(|v| u64::from(v << 4)),
            pack_bytes,
        ),
        (A8, A8) => plane.reduce(output, |px| [u64::from(px[0]), 0, 0, 0], |c: [u64; 4], px| px[0] = c[0] as u8),
        (Rgb888, Rgb888) => plane.reduce(
            output,
            |px| [u64::from(px[0]), u64::from(px[1]), u64::from(px[2]), 0xff],
            |c: [u64; 4], px| {
                for i in 0..3 {
                    px[i] = c[i] as u8;
                }
            },
        ),
        (Rgba5551, Rgba5551) => plane.reduce(
            output,
            |px| unpack_5551(read_u16(px)).map(u64::from),
            |c: [u64; 4], px| write_u16(px, pack_5551(c.map(|v| v as u32))),
        ),
        (Rgba16161616, Rgba16161616) => plane.reduce(
            output,
            |px| [0, 1, 2, 3].map(|i| u64::from(read_u16(&px[i * 2..]))),
            |c: [u64; 4], px| {
                for i in 0..4 {
                    write_u16(&mut px[i * 2..], c[i] as u16);
                }
            },
        ),
        (Rgba32323232, Rgba32323232) => plane.reduce(
            output,
            |px| [0, 1, 2, 3].map(|i| u64::from(LittleEndian::read_u32(&px[i * 4..]))),
            |c: [u64; 4], px| {
                for i in 0..4 {
                    LittleEndian::write_u32(&mut px[i * 4..], c[i] as u32);
                }
            },
        ),
        (Rgba16F, Rgba16F) => plane.reduce(
            output,
            |px| [0, 1, 2, 3].map(|i| f16::from_bits(read_u16(&px[i * 2..])).to_f32()),
            |c: [f32; 4], px| {
                for i in 0..4 {
                    write_u16(&mut px[i * 2..], f16::from_f32(c[i]).to_bits());
                }
            },
        ),
        (Rgba32F, Rgba32F) => plane.reduce(
            output,
            |px| [0, 1, 2, 3].map(|i| LittleEndian::read_f32(&px[i * 4..])),
            |c: [f32; 4], px| {
                for i in 0..4 {
                    LittleEndian::write_f32(&mut px[i * 4..], c[i]);
                }
            },
        ),
        _ => {
            debug!(from = %in_format, to = %out_format, "no downscale path");
            false
        }
    }
}

/// Produces the next mip level of `image`: half size, same format.
///
/// Dimensions never drop below 1. The result's mip level is one deeper than
/// the source's and the cube face is kept.
pub fn downscale_image_twice(image: &Image, normalize: bool) -> Result<Image> {
    let out_w = (image.width / 2).max(1);
    let out_h = (image.height / 2).max(1);
    let mut out = Image::create(out_w, out_h, image.format)?;
    out.mipmap_level = image.mipmap_level + 1;
    out.cube_face = image.cube_face;

    let ok = downscale_twice_bilinear(
        image.format,
        image.format,
        &image.data,
        image.width,
        image.height,
        format::pitch_in_bytes(image.width, image.format),
        &mut out.data,
        out_w,
        out_h,
        format::pitch_in_bytes(out_w, image.format),
        normalize,
    );
    if ok {
        Ok(out)
    } else {
        Err(Error::unsupported_format(image.format, "downscale"))
    }
}

// ============================================================================
// Internals
// ============================================================================

fn unpack_bytes(px: &[u8]) -> [u64; 4] {
    [px[0], px[1], px[2], px[3]].map(u64::from)
}

fn pack_bytes(c: [u64; 4], px: &mut [u8]) {
    for i in 0..4 {
        px[i] = c[i] as u8;
    }
}

struct Plane<'a> {
    input: &'a [u8],
    in_width: u32,
    in_height: u32,
    in_pitch: usize,
    in_px: usize,
    out_width: u32,
    out_height: u32,
    out_pitch: usize,
    out_px: usize,
}

impl Plane<'_> {
    fn reduce<A, U, P>(&self, output: &mut [u8], unpack: U, pack: P) -> bool
    where
        A: Copy + Add<Output = A> + Div<Output = A> + From<u8>,
        U: Fn(&[u8]) -> [A; 4],
        P: Fn([A; 4], &mut [u8]),
    {
        let (ow, oh) = (self.out_width as usize, self.out_height as usize);
        if ow == 0 || oh == 0 || self.in_px == 0 || self.out_px == 0 {
            return false;
        }
        let line_stride = if self.in_height > self.out_height { self.in_pitch } else { 0 };
        let pixel_stride = if self.in_width > self.out_width { self.in_px } else { 0 };
        let step_y = if line_stride == 0 { 1 } else { 2 };
        let step_x = if pixel_stride == 0 { 1 } else { 2 };

        // Last byte touched on either side must be in range.
        let last_in = (oh - 1) * step_y * self.in_pitch
            + line_stride
            + (ow - 1) * step_x * self.in_px
            + pixel_stride
            + self.in_px;
        let last_out = (oh - 1) * self.out_pitch + ow * self.out_px;
        if (self.in_width as usize) < ow || (self.in_height as usize) < oh {
            return false;
        }
        if self.input.len() < last_in || output.len() < last_out {
            debug!(in_len = self.input.len(), out_len = output.len(), "downscale buffers too small");
            return false;
        }

        let four = A::from(4u8);
        for y in 0..oh {
            let row = y * step_y * self.in_pitch;
            for x in 0..ow {
                let p00 = row + x * step_x * self.in_px;
                let p01 = p00 + pixel_stride;
                let p10 = p00 + line_stride;
                let p11 = p10 + pixel_stride;
                let a = unpack(&self.input[p00..]);
                let b = unpack(&self.input[p01..]);
                let c = unpack(&self.input[p10..]);
                let d = unpack(&self.input[p11..]);
                let mut avg = a;
                for i in 0..4 {
                    avg[i] = (a[i] + b[i] + c[i] + d[i]) / four;
                }
                let o = y * self.out_pitch + x * self.out_px;
                pack(avg, &mut output[o..o + self.out_px]);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn averages_2x2_block() {
        let input = [
            0u8, 0, 0, 0, 4, 8, 12, 16, //
            8, 16, 24, 32, 12, 24, 36, 48,
        ];
        let mut out = [0u8; 4];
        assert!(downscale_twice_bilinear(
            PixelFormat::Rgba8888,
            PixelFormat::Rgba8888,
            &input,
            2,
            2,
            8,
            &mut out,
            1,
            1,
            4,
            false,
        ));
        assert_eq!(out, [6, 12, 18, 24]);
    }

    #[test]
    fn collapsed_axis_reuses_row() {
        // 4x1 A8: height stays 1, rows are not advanced
        let input = [10u8, 20, 30, 50];
        let mut out = [0u8; 2];
        assert!(downscale_twice_bilinear(
            PixelFormat::A8,
            PixelFormat::A8,
            &input,
            4,
            1,
            4,
            &mut out,
            2,
            1,
            2,
            false,
        ));
        assert_eq!(out, [15, 40]);
    }

    #[test]
    fn rgba8888_to_rgba4444() {
        let input = [0xf0u8; 16];
        let mut out = [0u8; 2];
        assert!(downscale_twice_bilinear(
            PixelFormat::Rgba8888,
            PixelFormat::Rgba4444,
            &input,
            2,
            2,
            8,
            &mut out,
            1,
            1,
            2,
            false,
        ));
        assert_eq!(u16::from_le_bytes(out), 0xffff);
    }

    #[test]
    fn float_reduction() {
        let mut input = [0u8; 64];
        for (i, v) in [0.0f32, 1.0, 2.0, 5.0].iter().enumerate() {
            for c in 0..4 {
                LittleEndian::write_f32(&mut input[i * 16 + c * 4..], *v);
            }
        }
        let mut out = [0u8; 16];
        assert!(downscale_twice_bilinear(
            PixelFormat::Rgba32F,
            PixelFormat::Rgba32F,
            &input,
            2,
            2,
            32,
            &mut out,
            1,
            1,
            16,
            false,
        ));
        assert_relative_eq!(LittleEndian::read_f32(&out), 2.0);
    }

    #[test]
    fn unsupported_pair() {
        let mut out = [0u8; 8];
        assert!(!downscale_twice_bilinear(
            PixelFormat::Rgb565,
            PixelFormat::Rgb565,
            &[0u8; 8],
            2,
            2,
            4,
            &mut out,
            1,
            1,
            2,
            false,
        ));
    }

    #[test]
    fn next_mip_image() {
        let image = Image::from_vec(3, 1, PixelFormat::A8, vec![9, 9, 9]).unwrap();
        let mip = downscale_image_twice(&image, false).unwrap();
        assert_eq!((mip.width, mip.height, mip.mipmap_level), (1, 1, 1));
        assert_eq!(mip.data, vec![9]);
    }

    proptest! {
        #[test]
        fn uniform_input_stays_uniform(px: [u8; 4], half_w in 1u32..8, half_h in 1u32..8) {
            let (w, h) = (half_w * 2, half_h * 2);
            let input: Vec<u8> = px.iter().copied().cycle().take((w * h * 4) as usize).collect();
            let mut out = vec![0u8; (half_w * half_h * 4) as usize];
            prop_assert!(downscale_twice_bilinear(
                PixelFormat::Rgba8888, PixelFormat::Rgba8888,
                &input, w, h, (w * 4) as usize,
                &mut out, half_w, half_h, (half_w * 4) as usize,
                false,
            ));
            for chunk in out.chunks_exact(4) {
                prop_assert_eq!(chunk, &px[..]);
            }
        }
    }
}
