//! Red/blue channel exchange.

use super::pixel::{pack_4444, pack_565, read_u16, unpack_4444, unpack_565, write_u16};
use crate::format::PixelFormat;
use tracing::error;

/// Swaps red and blue of every pixel, reading `input` and writing `output`.
///
/// Handles RGB888, RGBA8888, RGBA4444, RGB565, RGBA16161616 and
/// RGBA32323232. A8 and A16 have no color channels and are copied as is.
/// Other formats are logged as an error and refused.
pub fn swap_red_blue_channels(
    format: PixelFormat,
    input: &[u8],
    width: u32,
    height: u32,
    pitch: usize,
    output: &mut [u8],
) -> bool {
    let Some(px_size) = supported_size(format) else {
        error!(%format, "swap red/blue: unsupported pixel format");
        return false;
    };
    super::convert_direct_with(input, width, height, pitch, px_size, output, pitch, px_size, |s, d| {
        d.copy_from_slice(s);
        swap_pixel(format, d);
    })
}

/// In-place variant of [`swap_red_blue_channels`].
pub fn swap_red_blue_channels_in_place(
    format: PixelFormat,
    data: &mut [u8],
    width: u32,
    height: u32,
    pitch: usize,
) -> bool {
    let Some(px_size) = supported_size(format) else {
        error!(%format, "swap red/blue: unsupported pixel format");
        return false;
    };
    if matches!(format, PixelFormat::A8 | PixelFormat::A16) {
        return true;
    }
    super::transform_in_place(data, width, height, pitch, px_size, |px| swap_pixel(format, px))
}

fn supported_size(format: PixelFormat) -> Option<usize> {
    match format {
        PixelFormat::Rgb888
        | PixelFormat::Rgba8888
        | PixelFormat::Rgba4444
        | PixelFormat::Rgb565
        | PixelFormat::Rgba16161616
        | PixelFormat::Rgba32323232
        | PixelFormat::A8
        | PixelFormat::A16 => format.bytes_per_pixel(),
        _ => None,
    }
}

fn swap_pixel(format: PixelFormat, px: &mut [u8]) {
    match format {
        PixelFormat::Rgb888 | PixelFormat::Rgba8888 => px.swap(0, 2),
        PixelFormat::Rgba4444 => {
            let [r, g, b, a] = unpack_4444(read_u16(px));
            write_u16(px, pack_4444([b, g, r, a]));
        }
        PixelFormat::Rgb565 => {
            let [r, g, b] = unpack_565(read_u16(px));
            write_u16(px, pack_565([b, g, r]));
        }
        PixelFormat::Rgba16161616 => swap_words(px, 2),
        PixelFormat::Rgba32323232 => swap_words(px, 4),
        _ => {}
    }
}

/// Exchanges the first and third `size`-byte words.
fn swap_words(px: &mut [u8], size: usize) {
    let (head, tail) = px.split_at_mut(size * 2);
    head[..size].swap_with_slice(&mut tail[..size]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swaps_bytes() {
        let mut data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        assert!(swap_red_blue_channels_in_place(PixelFormat::Rgba8888, &mut data, 2, 1, 8));
        assert_eq!(data, [3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn swaps_packed_fields() {
        let mut data = 0x001fu16.to_le_bytes();
        assert!(swap_red_blue_channels_in_place(PixelFormat::Rgb565, &mut data, 1, 1, 2));
        assert_eq!(u16::from_le_bytes(data), 0xf800);

        let mut data = 0x1234u16.to_le_bytes();
        assert!(swap_red_blue_channels_in_place(PixelFormat::Rgba4444, &mut data, 1, 1, 2));
        assert_eq!(u16::from_le_bytes(data), 0x1432);
    }

    #[test]
    fn swaps_wide_words() {
        let mut data = [1u8, 1, 2, 2, 3, 3, 4, 4];
        assert!(swap_red_blue_channels_in_place(PixelFormat::Rgba16161616, &mut data, 1, 1, 8));
        assert_eq!(data, [3, 3, 2, 2, 1, 1, 4, 4]);
    }

    #[test]
    fn gray_is_untouched_and_float_refused() {
        let input = [9u8, 8];
        let mut out = [0u8; 2];
        assert!(swap_red_blue_channels(PixelFormat::A8, &input, 2, 1, 2, &mut out));
        assert_eq!(out, input);
        let mut f = [0u8; 16];
        assert!(!swap_red_blue_channels_in_place(PixelFormat::Rgba32F, &mut f, 1, 1, 16));
    }
}
