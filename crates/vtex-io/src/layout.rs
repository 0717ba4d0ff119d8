//! On-disk packed pixel layouts that differ from the in-memory ones.
//!
//! In memory every packed 16-bit format keeps red in the lowest bits (see
//! `vtex_core::convert::pixel`). PVR, DDS and TGA store RGBA4444 and
//! RGBA5551 differently; the helpers here rewrite whole payloads in place,
//! one little-endian `u16` at a time.

use byteorder::{ByteOrder, LittleEndian};
use vtex_core::convert::pixel::{pack_5551, unpack_5551};

/// Applies `f` to every little-endian `u16` of `data`.
pub(crate) fn map_u16_in_place(data: &mut [u8], f: impl Fn(u16) -> u16) {
    for px in data.chunks_exact_mut(2) {
        let v = LittleEndian::read_u16(px);
        LittleEndian::write_u16(px, f(v));
    }
}

/// Reverses the nibble order (RGBA4444 <-> ABGR4444). Self-inverse.
#[inline]
pub(crate) fn reverse_nibbles(v: u16) -> u16 {
    ((v & 0x000f) << 12) | ((v & 0x00f0) << 4) | ((v & 0x0f00) >> 4) | ((v & 0xf000) >> 12)
}

/// PVR `r5 g5 b5 a1` (red in the top bits, alpha in bit 0) to memory order.
#[inline]
pub(crate) fn pvr5551_to_rgba5551(v: u16) -> u16 {
    let v = u32::from(v);
    pack_5551([(v >> 11) & 0x1f, (v >> 6) & 0x1f, (v >> 1) & 0x1f, v & 0x1])
}

/// Memory RGBA5551 to PVR `r5 g5 b5 a1`.
#[inline]
pub(crate) fn rgba5551_to_pvr5551(v: u16) -> u16 {
    let [r, g, b, a] = unpack_5551(v);
    (a | (b << 1) | (g << 6) | (r << 11)) as u16
}

/// Swaps the 5-bit red and blue fields of a 1555 value, keeping alpha.
///
/// D3D A1R5G5B5 and TGA 16-bit truecolor keep blue in the low bits.
/// Self-inverse.
#[inline]
pub(crate) fn swap_1555_red_blue(v: u16) -> u16 {
    let [r, g, b, a] = unpack_5551(v);
    pack_5551([b, g, r, a])
}

/// Swaps the red and blue nibbles of a 4444 value (ARGB4444 <-> ABGR4444).
#[inline]
pub(crate) fn swap_4444_red_blue(v: u16) -> u16 {
    (v & 0xf0f0) | ((v & 0x000f) << 8) | ((v & 0x0f00) >> 8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nibbles_reverse() {
        assert_eq!(reverse_nibbles(0x1234), 0x4321);
        assert_eq!(reverse_nibbles(reverse_nibbles(0xabcd)), 0xabcd);
    }

    #[test]
    fn pvr5551_fields() {
        // r=31 only
        assert_eq!(pvr5551_to_rgba5551(0xf800), 0x001f);
        // alpha only
        assert_eq!(pvr5551_to_rgba5551(0x0001), 0x8000);
        // g=1
        assert_eq!(pvr5551_to_rgba5551(0x0040), 0x0020);
        for v in [0u16, 0x1234, 0xffff, 0x8001, 0x7bde] {
            assert_eq!(rgba5551_to_pvr5551(pvr5551_to_rgba5551(v)), v);
        }
    }

    #[test]
    fn red_blue_swaps() {
        assert_eq!(swap_1555_red_blue(0x801f), 0xfc00);
        assert_eq!(swap_4444_red_blue(0xa00f), 0xaf00);
    }

    #[test]
    fn map_over_payload() {
        let mut data = [0x34, 0x12, 0xcd, 0xab];
        map_u16_in_place(&mut data, reverse_nibbles);
        assert_eq!(data, [0x21, 0x43, 0xba, 0xdc]);
    }
}
