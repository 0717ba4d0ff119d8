//! Pixel conversion matrix.
//!
//! A fixed table of (source, destination) format pairs, each backed by a
//! single-pixel converter. [`convert_direct`] walks a rectangle of pixels with
//! independent source and destination pitches; pairs outside the table are
//! refused without touching the destination.
//!
//! Besides the table this module hosts the specialised transforms that do not
//! fit the one-pixel-in, one-pixel-out shape:
//!
//! - [`downscale_twice_bilinear`] - 2x box reduction used for mip chains
//! - [`normalize`] - per-pixel vector normalization for normal maps
//! - [`swap_red_blue_channels`] - in-place R/B swap
//! - [`convert_float_formats`] - half/full float channel-count conversion
//! - [`resize_rgba8_bilinear`] - arbitrary bilinear resample of RGBA8888
//!
//! # Example
//!
//! ```rust
//! use vtex_core::convert;
//! use vtex_core::PixelFormat;
//!
//! let bgr = [0x10u8, 0x20, 0x30];
//! let mut rgb = [0u8; 3];
//! assert!(convert::convert_direct(
//!     PixelFormat::Bgr888, PixelFormat::Rgb888,
//!     &bgr, 1, 1, 3,
//!     &mut rgb, 3,
//! ));
//! assert_eq!(rgb, [0x30, 0x20, 0x10]);
//! ```

mod downscale;
mod float;
mod normalize;
pub mod pixel;
mod resize;
mod swap;

pub use downscale::{downscale_image_twice, downscale_twice_bilinear};
pub use float::convert_float_formats;
pub use normalize::{normalize, normalize_in_place};
pub use resize::resize_rgba8_bilinear;
pub use swap::{swap_red_blue_channels, swap_red_blue_channels_in_place};

use crate::error::{Error, Result};
use crate::format::{self, PixelFormat};
use crate::image::Image;
use pixel::PixelFn;
use tracing::debug;

// ============================================================================
// Direct conversion table
// ============================================================================

struct DirectConversion {
    from: PixelFormat,
    to: PixelFormat,
    convert: PixelFn,
}

const fn entry(from: PixelFormat, to: PixelFormat, convert: PixelFn) -> DirectConversion {
    DirectConversion { from, to, convert }
}

static DIRECT_TABLE: &[DirectConversion] = {
    use PixelFormat::*;
    &[
        entry(Rgba5551, Rgba8888, pixel::rgba5551_to_rgba8888),
        entry(Rgba4444, Rgba8888, pixel::rgba4444_to_rgba8888),
        entry(Rgb888, Rgba8888, pixel::rgb888_to_rgba8888),
        entry(Rgb565, Rgba8888, pixel::rgb565_to_rgba8888),
        entry(A8, Rgba8888, pixel::a8_to_rgba8888),
        entry(A16, Rgba8888, pixel::a16_to_rgba8888),
        entry(Bgr888, Rgba8888, pixel::bgr888_to_rgba8888),
        entry(Bgra8888, Rgba8888, pixel::bgra8888_to_rgba8888),
        entry(Rgba16161616, Rgba8888, pixel::rgba16161616_to_rgba8888),
        entry(Rgba32323232, Rgba8888, pixel::rgba32323232_to_rgba8888),
        entry(Rgba16F, Rgba8888, pixel::rgba16f_to_rgba8888),
        entry(Rgba32F, Rgba8888, pixel::rgba32f_to_rgba8888),
        entry(Bgr888, Rgb888, pixel::bgr888_to_rgb888),
        entry(Rgba8888, Rgb888, pixel::rgba8888_to_rgb888),
        entry(Rgba8888, Rgba16F, pixel::rgba8888_to_rgba16f),
        entry(Rgba8888, Rgba32F, pixel::rgba8888_to_rgba32f),
    ]
};

fn lookup(from: PixelFormat, to: PixelFormat) -> Option<PixelFn> {
    DIRECT_TABLE
        .iter()
        .find(|e| e.from == from && e.to == to)
        .map(|e| e.convert)
}

/// Whether `from -> to` is in the direct conversion table.
///
/// Agrees with [`convert_direct`] for every pair: when this returns `true`
/// the conversion succeeds given adequately sized buffers.
pub fn can_convert_direct(from: PixelFormat, to: PixelFormat) -> bool {
    lookup(from, to).is_some()
}

/// Whether [`convert_image`] can produce `to` from `from`, either directly,
/// as a no-op copy, or through an RGBA8888 intermediate.
pub fn can_convert(from: PixelFormat, to: PixelFormat) -> bool {
    from == to
        || can_convert_direct(from, to)
        || (can_convert_direct(from, PixelFormat::Rgba8888)
            && can_convert_direct(PixelFormat::Rgba8888, to))
}

/// Converts a `width` x `height` rectangle of pixels from `in_format` to
/// `out_format`.
///
/// `in_pitch` and `out_pitch` are the byte strides between rows and may
/// exceed the packed row size. Returns `false` and leaves `output` untouched
/// when the pair is not in the table or either buffer is too small.
#[allow(clippy::too_many_arguments)]
pub fn convert_direct(
    in_format: PixelFormat,
    out_format: PixelFormat,
    input: &[u8],
    width: u32,
    height: u32,
    in_pitch: usize,
    output: &mut [u8],
    out_pitch: usize,
) -> bool {
    let Some(convert) = lookup(in_format, out_format) else {
        debug!(from = %in_format, to = %out_format, "no direct conversion");
        return false;
    };
    let (Some(in_px), Some(out_px)) = (in_format.bytes_per_pixel(), out_format.bytes_per_pixel())
    else {
        return false;
    };
    convert_direct_with(
        input, width, height, in_pitch, in_px, output, out_pitch, out_px, convert,
    )
}

/// Applies `convert` to every pixel of a rectangle.
///
/// The building block behind [`convert_direct`], exposed so codecs can plug
/// their own on-disk layout shuffles into the same row walker.
#[allow(clippy::too_many_arguments)]
pub fn convert_direct_with<F>(
    input: &[u8],
    width: u32,
    height: u32,
    in_pitch: usize,
    in_pixel_size: usize,
    output: &mut [u8],
    out_pitch: usize,
    out_pixel_size: usize,
    mut convert: F,
) -> bool
where
    F: FnMut(&[u8], &mut [u8]),
{
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 {
        return true;
    }
    let in_row = w * in_pixel_size;
    let out_row = w * out_pixel_size;
    if in_pitch < in_row
        || out_pitch < out_row
        || input.len() < in_pitch * (h - 1) + in_row
        || output.len() < out_pitch * (h - 1) + out_row
    {
        debug!(
            width,
            height,
            in_len = input.len(),
            out_len = output.len(),
            "conversion buffers too small"
        );
        return false;
    }

    for y in 0..h {
        let src_row = &input[y * in_pitch..y * in_pitch + in_row];
        let dst_row = &mut output[y * out_pitch..y * out_pitch + out_row];
        for (src, dst) in src_row
            .chunks_exact(in_pixel_size)
            .zip(dst_row.chunks_exact_mut(out_pixel_size))
        {
            convert(src, dst);
        }
    }
    true
}

/// Rewrites every pixel of a tightly or loosely packed rectangle in place.
///
/// `transform` receives one pixel at a time.
pub fn transform_in_place<F>(
    data: &mut [u8],
    width: u32,
    height: u32,
    pitch: usize,
    pixel_size: usize,
    mut transform: F,
) -> bool
where
    F: FnMut(&mut [u8]),
{
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 {
        return true;
    }
    let row = w * pixel_size;
    if pitch < row || data.len() < pitch * (h - 1) + row {
        return false;
    }
    for y in 0..h {
        for px in data[y * pitch..y * pitch + row].chunks_exact_mut(pixel_size) {
            transform(px);
        }
    }
    true
}

// ============================================================================
// Whole-image conversion
// ============================================================================

/// Converts an image to `format`, chaining through RGBA8888 when no direct
/// converter exists.
///
/// Mip level and cube face are carried over. Converting to the image's own
/// format returns a copy.
pub fn convert_image(image: &Image, format: PixelFormat) -> Result<Image> {
    let from = image.format;
    if from == format {
        return Ok(image.clone());
    }
    if can_convert_direct(from, format) {
        return convert_one(image, format);
    }
    if can_convert(from, format) {
        debug!(%from, to = %format, "converting through RGBA8888");
        let rgba = convert_one(image, PixelFormat::Rgba8888)?;
        return convert_one(&rgba, format);
    }
    Err(Error::conversion_unsupported(from, format))
}

fn convert_one(image: &Image, format: PixelFormat) -> Result<Image> {
    let mut out = Image::create(image.width, image.height, format)?;
    out.mipmap_level = image.mipmap_level;
    out.cube_face = image.cube_face;
    let ok = convert_direct(
        image.format,
        format,
        &image.data,
        image.width,
        image.height,
        format::pitch_in_bytes(image.width, image.format),
        &mut out.data,
        format::pitch_in_bytes(image.width, format),
    );
    if ok {
        Ok(out)
    } else {
        Err(Error::conversion_unsupported(image.format, format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn unsupported_pair_leaves_output_untouched() {
        let input = [0u8; 8];
        let mut output = [0xaau8; 8];
        assert!(!convert_direct(
            PixelFormat::Pvr4,
            PixelFormat::Etc1,
            &input,
            4,
            4,
            8,
            &mut output,
            8,
        ));
        assert_eq!(output, [0xaa; 8]);
        assert!(!can_convert_direct(PixelFormat::Pvr4, PixelFormat::Etc1));
    }

    #[test]
    fn table_agrees_with_converter() {
        let input = [0x40u8; 64];
        for from in PixelFormat::ALL {
            for to in PixelFormat::ALL {
                let mut output = [0u8; 64];
                let ok = convert_direct(from, to, &input, 1, 1, 16, &mut output, 16);
                assert_eq!(ok, can_convert_direct(from, to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn honours_row_pitch() {
        // 2x2 RGB888 with 2 bytes of padding per row
        let input = [1, 2, 3, 4, 5, 6, 0, 0, 7, 8, 9, 10, 11, 12, 0, 0];
        let mut output = [0u8; 16];
        assert!(convert_direct(
            PixelFormat::Rgb888,
            PixelFormat::Rgba8888,
            &input,
            2,
            2,
            8,
            &mut output,
            8,
        ));
        assert_eq!(
            output,
            [1, 2, 3, 255, 4, 5, 6, 255, 7, 8, 9, 255, 10, 11, 12, 255]
        );
    }

    #[test]
    fn short_buffer_is_refused() {
        let input = [0u8; 3];
        let mut output = [0u8; 4];
        assert!(!convert_direct(
            PixelFormat::Rgb888,
            PixelFormat::Rgba8888,
            &input,
            2,
            1,
            6,
            &mut output,
            8,
        ));
    }

    #[test]
    fn chained_conversion_through_rgba() {
        let image = Image::from_vec(1, 1, PixelFormat::Rgb565, vec![0xff, 0xff]).unwrap();
        let out = convert_image(&image, PixelFormat::Rgb888).unwrap();
        assert_eq!(out.data, vec![0xf8, 0xfc, 0xf8]);
        assert!(convert_image(&image, PixelFormat::Dxt1).is_err());
    }

    proptest! {
        #[test]
        fn rgb_rgba_rgb_is_identity(r: u8, g: u8, b: u8) {
            let mut rgba = [0u8; 4];
            let mut rgb = [0u8; 3];
            prop_assert!(convert_direct(PixelFormat::Rgb888, PixelFormat::Rgba8888, &[r, g, b], 1, 1, 3, &mut rgba, 4));
            prop_assert_eq!(rgba[3], 0xff);
            prop_assert!(convert_direct(PixelFormat::Rgba8888, PixelFormat::Rgb888, &rgba, 1, 1, 4, &mut rgb, 3));
            prop_assert_eq!(rgb, [r, g, b]);
        }

        #[test]
        fn rgba8888_survives_float_round_trip(px: [u8; 4]) {
            let mut f = [0u8; 16];
            let mut back = [0u8; 4];
            prop_assert!(convert_direct(PixelFormat::Rgba8888, PixelFormat::Rgba32F, &px, 1, 1, 4, &mut f, 16));
            prop_assert!(convert_direct(PixelFormat::Rgba32F, PixelFormat::Rgba8888, &f, 1, 1, 16, &mut back, 4));
            // truncation may lose at most one step
            for i in 0..4 {
                prop_assert!((i32::from(px[i]) - i32::from(back[i])).abs() <= 1);
            }
        }
    }
}
