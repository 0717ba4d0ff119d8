//! Per-pixel converters used by the direct conversion table.
//!
//! Each converter reads exactly one source pixel and writes exactly one
//! destination pixel. All multi-byte values are little-endian; packed 16-bit
//! formats use the red-in-low-bits layout documented on
//! [`PixelFormat`](crate::format::PixelFormat).

use byteorder::{ByteOrder, LittleEndian};
use half::f16;

/// Signature of a single-pixel converter.
pub type PixelFn = fn(&[u8], &mut [u8]);

// ============================================================================
// Shared helpers
// ============================================================================

/// Maps a float in `[0, 1]` to an 8-bit channel, clamping and truncating.
#[inline]
pub fn float_to_u8(v: f32) -> u8 {
    // NaN clamps to 0 through the comparison chain.
    let c = if v > 1.0 {
        1.0
    } else if v >= 0.0 {
        v
    } else {
        0.0
    };
    (c * 255.0) as u8
}

#[inline]
pub(crate) fn read_u16(px: &[u8]) -> u16 {
    LittleEndian::read_u16(px)
}

#[inline]
pub(crate) fn write_u16(px: &mut [u8], v: u16) {
    LittleEndian::write_u16(px, v)
}

// ============================================================================
// Packed 16-bit unpack/pack
// ============================================================================

/// Splits an RGBA5551 value into 5-bit r, g, b and 1-bit a.
#[inline]
pub fn unpack_5551(p: u16) -> [u32; 4] {
    let p = u32::from(p);
    [p & 0x1f, (p >> 5) & 0x1f, (p >> 10) & 0x1f, (p >> 15) & 0x1]
}

#[inline]
pub fn pack_5551(c: [u32; 4]) -> u16 {
    ((c[0] & 0x1f) | ((c[1] & 0x1f) << 5) | ((c[2] & 0x1f) << 10) | ((c[3] & 0x1) << 15)) as u16
}

/// Splits an RGBA4444 value into four nibbles, red first.
#[inline]
pub fn unpack_4444(p: u16) -> [u32; 4] {
    let p = u32::from(p);
    [p & 0xf, (p >> 4) & 0xf, (p >> 8) & 0xf, (p >> 12) & 0xf]
}

#[inline]
pub fn pack_4444(c: [u32; 4]) -> u16 {
    ((c[0] & 0xf) | ((c[1] & 0xf) << 4) | ((c[2] & 0xf) << 8) | ((c[3] & 0xf) << 12)) as u16
}

/// Splits an RGB565 value into 5-bit r, 6-bit g, 5-bit b.
#[inline]
pub fn unpack_565(p: u16) -> [u32; 3] {
    let p = u32::from(p);
    [p & 0x1f, (p >> 5) & 0x3f, (p >> 11) & 0x1f]
}

#[inline]
pub fn pack_565(c: [u32; 3]) -> u16 {
    ((c[0] & 0x1f) | ((c[1] & 0x3f) << 5) | ((c[2] & 0x1f) << 11)) as u16
}

// ============================================================================
// To RGBA8888
// ============================================================================

pub fn rgba5551_to_rgba8888(src: &[u8], dst: &mut [u8]) {
    let [r, g, b, a] = unpack_5551(read_u16(src));
    dst[0] = (r << 3) as u8;
    dst[1] = (g << 3) as u8;
    dst[2] = (b << 3) as u8;
    dst[3] = if a != 0 { 0xff } else { 0 };
}

pub fn rgba4444_to_rgba8888(src: &[u8], dst: &mut [u8]) {
    let c = unpack_4444(read_u16(src));
    for (d, v) in dst[..4].iter_mut().zip(c) {
        *d = (v << 4) as u8;
    }
}

pub fn rgb888_to_rgba8888(src: &[u8], dst: &mut [u8]) {
    dst[..3].copy_from_slice(&src[..3]);
    dst[3] = 0xff;
}

pub fn rgb565_to_rgba8888(src: &[u8], dst: &mut [u8]) {
    let [r, g, b] = unpack_565(read_u16(src));
    dst[0] = (r << 3) as u8;
    dst[1] = (g << 2) as u8;
    dst[2] = (b << 3) as u8;
    dst[3] = 0xff;
}

pub fn a8_to_rgba8888(src: &[u8], dst: &mut [u8]) {
    let v = src[0];
    dst[..4].copy_from_slice(&[v, v, v, 0xff]);
}

/// A16 keeps the high byte as gray.
pub fn a16_to_rgba8888(src: &[u8], dst: &mut [u8]) {
    let v = (read_u16(src) >> 8) as u8;
    dst[..4].copy_from_slice(&[v, v, v, 0xff]);
}

pub fn bgr888_to_rgba8888(src: &[u8], dst: &mut [u8]) {
    dst[..4].copy_from_slice(&[src[2], src[1], src[0], 0xff]);
}

pub fn bgra8888_to_rgba8888(src: &[u8], dst: &mut [u8]) {
    dst[..4].copy_from_slice(&[src[2], src[1], src[0], src[3]]);
}

pub fn rgba16161616_to_rgba8888(src: &[u8], dst: &mut [u8]) {
    for (i, d) in dst[..4].iter_mut().enumerate() {
        *d = (read_u16(&src[i * 2..]) >> 8) as u8;
    }
}

pub fn rgba32323232_to_rgba8888(src: &[u8], dst: &mut [u8]) {
    for (i, d) in dst[..4].iter_mut().enumerate() {
        *d = (LittleEndian::read_u32(&src[i * 4..]) >> 24) as u8;
    }
}

pub fn rgba16f_to_rgba8888(src: &[u8], dst: &mut [u8]) {
    for (i, d) in dst[..4].iter_mut().enumerate() {
        *d = float_to_u8(f16::from_bits(read_u16(&src[i * 2..])).to_f32());
    }
}

pub fn rgba32f_to_rgba8888(src: &[u8], dst: &mut [u8]) {
    for (i, d) in dst[..4].iter_mut().enumerate() {
        *d = float_to_u8(LittleEndian::read_f32(&src[i * 4..]));
    }
}

// ============================================================================
// From RGBA8888 and 24-bit shuffles
// ============================================================================

pub fn bgr888_to_rgb888(src: &[u8], dst: &mut [u8]) {
    dst[..3].copy_from_slice(&[src[2], src[1], src[0]]);
}

pub fn rgba8888_to_rgb888(src: &[u8], dst: &mut [u8]) {
    dst[..3].copy_from_slice(&src[..3]);
}

pub fn rgba8888_to_rgba16f(src: &[u8], dst: &mut [u8]) {
    for i in 0..4 {
        let v = f16::from_f32(f32::from(src[i]) / 255.0);
        write_u16(&mut dst[i * 2..], v.to_bits());
    }
}

pub fn rgba8888_to_rgba32f(src: &[u8], dst: &mut [u8]) {
    for i in 0..4 {
        LittleEndian::write_f32(&mut dst[i * 4..], f32::from(src[i]) / 255.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_clamps_and_truncates() {
        assert_eq!(float_to_u8(-3.0), 0);
        assert_eq!(float_to_u8(2.0), 255);
        assert_eq!(float_to_u8(0.5), 127);
        assert_eq!(float_to_u8(f32::NAN), 0);
    }

    #[test]
    fn packed_layouts_keep_red_low() {
        assert_eq!(pack_5551([31, 0, 0, 0]), 0x001f);
        assert_eq!(pack_5551([0, 0, 0, 1]), 0x8000);
        assert_eq!(pack_4444([0xf, 0, 0, 0]), 0x000f);
        assert_eq!(pack_565([0, 0, 31]), 0xf800);
        assert_eq!(unpack_565(0x07e0), [0, 63, 0]);
    }

    #[test]
    fn rgb565_expands_with_shifts() {
        let mut out = [0u8; 4];
        rgb565_to_rgba8888(&0xffffu16.to_le_bytes(), &mut out);
        assert_eq!(out, [0xf8, 0xfc, 0xf8, 0xff]);
    }

    #[test]
    fn rgba5551_alpha_is_all_or_nothing() {
        let mut out = [0u8; 4];
        rgba5551_to_rgba8888(&0x8000u16.to_le_bytes(), &mut out);
        assert_eq!(out, [0, 0, 0, 0xff]);
        rgba5551_to_rgba8888(&0x7fffu16.to_le_bytes(), &mut out);
        assert_eq!(out, [0xf8, 0xf8, 0xf8, 0]);
    }

    #[test]
    fn wide_integers_keep_top_byte() {
        let mut src = [0u8; 16];
        LittleEndian::write_u32(&mut src[0..], 0xab00_0000);
        LittleEndian::write_u32(&mut src[12..], 0xffff_ffff);
        let mut out = [0u8; 4];
        rgba32323232_to_rgba8888(&src, &mut out);
        assert_eq!(out, [0xab, 0, 0, 0xff]);
    }
}
