//! Pixel format registry.
//!
//! The set of pixel encodings is closed: every format the engine can hold in
//! memory is a variant of [`PixelFormat`], and each variant has exactly one
//! immutable [`PixelFormatDescriptor`] describing its storage.
//!
//! # Types
//!
//! - [`PixelFormat`] - pixel encoding identifier with a stable numeric id
//! - [`PixelFormatDescriptor`] - bits per pixel, block size, compression flag, GPU mapping
//! - [`GpuTextureFormat`] - sampling formats a rendering backend may expose
//! - [`GpuCapabilities`] - read-only capability table consulted once per process
//!
//! # Usage
//!
//! ```rust
//! use vtex_core::format::{self, PixelFormat};
//!
//! let desc = PixelFormat::Dxt5.descriptor();
//! assert!(desc.compressed);
//! assert_eq!((desc.block_width, desc.block_height), (4, 4));
//!
//! // 5x5 DXT5 rounds up to 8x8: four 16-byte blocks
//! assert_eq!(format::size_in_bytes(5, 5, PixelFormat::Dxt5), 64);
//! assert_eq!(format::pitch_in_bytes(5, PixelFormat::Dxt5), 32);
//! ```
//!
//! # Hardware support
//!
//! The "hardware supported" flag is the only mutable part of the registry.
//! It is filled at most once by [`refresh_hardware_support`]; until then every
//! format reports `false`.

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

// ============================================================================
// PixelFormat
// ============================================================================

/// Pixel encoding identifier.
///
/// The discriminants are persisted by the DDS and PVR codecs (to tell DXT1
/// from DXT1A), so they must never be renumbered. Id 13 is retired.
///
/// Packed 16-bit formats keep red in the least significant bits:
///
/// | Format | Layout (LSB first) |
/// |--------|--------------------|
/// | `Rgba5551` | r:5 g:5 b:5 a:1 |
/// | `Rgba4444` | r:4 g:4 b:4 a:4 |
/// | `Rgb565` | r:5 g:6 b:5 |
///
/// `Rgba8888` is a little-endian `u32` with red in the low byte, which is the
/// same as the byte order R, G, B, A.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// No format; never stored in a valid image.
    #[default]
    Invalid = 0,
    /// 8 bits per channel, RGBA byte order.
    Rgba8888 = 1,
    /// 5-5-5-1 packed.
    Rgba5551 = 2,
    /// 4-4-4-4 packed.
    Rgba4444 = 3,
    /// 8 bits per channel, RGB byte order.
    Rgb888 = 4,
    /// 5-6-5 packed.
    Rgb565 = 5,
    /// Single 8-bit channel.
    A8 = 6,
    /// Single 16-bit channel.
    A16 = 7,
    /// PVRTC 4 bits per pixel.
    Pvr4 = 8,
    /// PVRTC 2 bits per pixel.
    Pvr2 = 9,
    /// 16 bits per channel unsigned normalized.
    Rgba16161616 = 10,
    /// 32 bits per channel unsigned normalized.
    Rgba32323232 = 11,
    /// BC1 without alpha.
    Dxt1 = 12,
    /// BC2.
    Dxt3 = 14,
    /// BC3.
    Dxt5 = 15,
    /// BC3 holding a swizzled normal map.
    Dxt5Nm = 16,
    /// ETC1.
    Etc1 = 17,
    /// ATC RGB.
    AtcRgb = 18,
    /// ATC RGBA with explicit alpha.
    AtcRgbaExplicitAlpha = 19,
    /// ATC RGBA with interpolated alpha.
    AtcRgbaInterpolatedAlpha = 20,
    /// PVRTC2 2 bits per pixel.
    Pvr2_2 = 21,
    /// PVRTC2 4 bits per pixel.
    Pvr4_2 = 22,
    /// EAC single channel, unsigned.
    EacR11Unsigned = 23,
    /// EAC single channel, signed.
    EacR11Signed = 24,
    /// EAC two channels, unsigned.
    EacRg11Unsigned = 25,
    /// EAC two channels, signed.
    EacRg11Signed = 26,
    /// ETC2 RGB.
    Etc2Rgb = 27,
    /// ETC2 RGBA.
    Etc2Rgba = 28,
    /// ETC2 RGB with punch-through alpha.
    Etc2RgbA1 = 29,
    /// 8 bits per channel, BGR byte order.
    Bgr888 = 30,
    /// 8 bits per channel, BGRA byte order.
    Bgra8888 = 31,
    /// BC1 with 1-bit alpha. Bit-identical to [`Dxt1`](Self::Dxt1) on disk.
    Dxt1A = 32,
    /// One half-float channel.
    R16F = 33,
    /// Two half-float channels.
    Rg16F = 34,
    /// Four half-float channels.
    Rgba16F = 35,
    /// One float channel.
    R32F = 36,
    /// Two float channels.
    Rg32F = 37,
    /// Four float channels.
    Rgba32F = 38,
    /// Three half-float channels.
    Rgb16F = 39,
    /// Three float channels.
    Rgb32F = 40,
}

impl PixelFormat {
    /// Every format, `Invalid` included, in registry order.
    pub const ALL: [PixelFormat; FORMAT_COUNT] = [
        Self::Invalid,
        Self::Rgba8888,
        Self::Rgba5551,
        Self::Rgba4444,
        Self::Rgb888,
        Self::Rgb565,
        Self::A8,
        Self::A16,
        Self::Pvr4,
        Self::Pvr2,
        Self::Rgba16161616,
        Self::Rgba32323232,
        Self::Dxt1,
        Self::Dxt3,
        Self::Dxt5,
        Self::Dxt5Nm,
        Self::Etc1,
        Self::AtcRgb,
        Self::AtcRgbaExplicitAlpha,
        Self::AtcRgbaInterpolatedAlpha,
        Self::Pvr2_2,
        Self::Pvr4_2,
        Self::EacR11Unsigned,
        Self::EacR11Signed,
        Self::EacRg11Unsigned,
        Self::EacRg11Signed,
        Self::Etc2Rgb,
        Self::Etc2Rgba,
        Self::Etc2RgbA1,
        Self::Bgr888,
        Self::Bgra8888,
        Self::Dxt1A,
        Self::R16F,
        Self::Rg16F,
        Self::Rgba16F,
        Self::R32F,
        Self::Rg32F,
        Self::Rgba32F,
        Self::Rgb16F,
        Self::Rgb32F,
    ];

    /// Stable numeric id.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Looks a format up by its stable numeric id.
    pub fn from_u32(id: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_u32() == id)
    }

    /// Looks a format up by its registry name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        BY_NAME.get(name.to_ascii_uppercase().as_str()).copied()
    }

    /// Registry name, e.g. `"RGBA8888"` or `"DXT1A"`.
    #[inline]
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Immutable storage descriptor of this format.
    #[inline]
    pub fn descriptor(self) -> &'static PixelFormatDescriptor {
        &DESCRIPTORS[self.table_index()]
    }

    /// Whether the format is block-compressed.
    #[inline]
    pub fn is_compressed(self) -> bool {
        self.descriptor().compressed
    }

    /// Whether every channel is a half or full float.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(
            self,
            Self::R16F
                | Self::Rg16F
                | Self::Rgb16F
                | Self::Rgba16F
                | Self::R32F
                | Self::Rg32F
                | Self::Rgb32F
                | Self::Rgba32F
        )
    }

    /// Channel count of a float format, 0 for anything else.
    pub const fn float_channels(self) -> u32 {
        match self {
            Self::R16F | Self::R32F => 1,
            Self::Rg16F | Self::Rg32F => 2,
            Self::Rgb16F | Self::Rgb32F => 3,
            Self::Rgba16F | Self::Rgba32F => 4,
            _ => 0,
        }
    }

    /// Size of one float channel in bytes (2 or 4), 0 for non-float formats.
    pub const fn float_channel_size(self) -> u32 {
        match self {
            Self::R16F | Self::Rg16F | Self::Rgb16F | Self::Rgba16F => 2,
            Self::R32F | Self::Rg32F | Self::Rgb32F | Self::Rgba32F => 4,
            _ => 0,
        }
    }

    /// Bytes per pixel for uncompressed, byte-aligned formats.
    ///
    /// Returns `None` for block-compressed formats and `Invalid`.
    pub fn bytes_per_pixel(self) -> Option<usize> {
        let desc = self.descriptor();
        if desc.compressed || desc.bits_per_pixel == 0 || desc.bits_per_pixel % 8 != 0 {
            None
        } else {
            Some((desc.bits_per_pixel / 8) as usize)
        }
    }

    /// Whether the format is one of the DXT family.
    #[inline]
    pub const fn is_dxt(self) -> bool {
        matches!(self, Self::Dxt1 | Self::Dxt1A | Self::Dxt3 | Self::Dxt5 | Self::Dxt5Nm)
    }

    /// Whether the format is one of the ATC family.
    #[inline]
    pub const fn is_atc(self) -> bool {
        matches!(
            self,
            Self::AtcRgb | Self::AtcRgbaExplicitAlpha | Self::AtcRgbaInterpolatedAlpha
        )
    }

    const fn table_index(self) -> usize {
        match self {
            Self::Invalid => 0,
            Self::Rgba8888 => 1,
            Self::Rgba5551 => 2,
            Self::Rgba4444 => 3,
            Self::Rgb888 => 4,
            Self::Rgb565 => 5,
            Self::A8 => 6,
            Self::A16 => 7,
            Self::Pvr4 => 8,
            Self::Pvr2 => 9,
            Self::Rgba16161616 => 10,
            Self::Rgba32323232 => 11,
            Self::Dxt1 => 12,
            Self::Dxt3 => 13,
            Self::Dxt5 => 14,
            Self::Dxt5Nm => 15,
            Self::Etc1 => 16,
            Self::AtcRgb => 17,
            Self::AtcRgbaExplicitAlpha => 18,
            Self::AtcRgbaInterpolatedAlpha => 19,
            Self::Pvr2_2 => 20,
            Self::Pvr4_2 => 21,
            Self::EacR11Unsigned => 22,
            Self::EacR11Signed => 23,
            Self::EacRg11Unsigned => 24,
            Self::EacRg11Signed => 25,
            Self::Etc2Rgb => 26,
            Self::Etc2Rgba => 27,
            Self::Etc2RgbA1 => 28,
            Self::Bgr888 => 29,
            Self::Bgra8888 => 30,
            Self::Dxt1A => 31,
            Self::R16F => 32,
            Self::Rg16F => 33,
            Self::Rgba16F => 34,
            Self::R32F => 35,
            Self::Rg32F => 36,
            Self::Rgba32F => 37,
            Self::Rgb16F => 38,
            Self::Rgb32F => 39,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// GPU capability table
// ============================================================================

/// Texture sampling formats a rendering backend can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuTextureFormat {
    /// 8-bit RGBA.
    R8G8B8A8,
    /// 8-bit RGB.
    R8G8B8,
    /// 5-5-5-1 packed.
    R5G5B5A1,
    /// 5-6-5 packed.
    R5G6B5,
    /// 4-4-4-4 packed.
    R4G4B4A4,
    /// 16-bit integer RGBA.
    A16R16G16B16,
    /// 32-bit integer RGBA.
    A32R32G32B32,
    /// 8-bit single channel.
    R8,
    /// 16-bit single channel.
    R16,
    /// BC1.
    Dxt1,
    /// BC2.
    Dxt3,
    /// BC3.
    Dxt5,
    /// PVRTC 4bpp.
    PvrtcRgba4bpp,
    /// PVRTC 2bpp.
    PvrtcRgba2bpp,
    /// PVRTC2 4bpp.
    Pvrtc2Rgba4bpp,
    /// PVRTC2 2bpp.
    Pvrtc2Rgba2bpp,
    /// ATC RGB.
    AtcRgb,
    /// ATC explicit alpha.
    AtcRgbaExplicit,
    /// ATC interpolated alpha.
    AtcRgbaInterpolated,
    /// ETC1.
    Etc1,
    /// ETC2 RGB.
    Etc2R8G8B8,
    /// ETC2 RGBA.
    Etc2R8G8B8A8,
    /// ETC2 punch-through alpha.
    Etc2R8G8B8A1,
    /// EAC R11 unsigned.
    EacR11Unsigned,
    /// EAC R11 signed.
    EacR11Signed,
    /// EAC RG11 unsigned.
    EacR11G11Unsigned,
    /// EAC RG11 signed.
    EacR11G11Signed,
    /// Half-float R.
    R16F,
    /// Half-float RG.
    Rg16F,
    /// Half-float RGBA.
    Rgba16F,
    /// Float R.
    R32F,
    /// Float RG.
    Rg32F,
    /// Float RGBA.
    Rgba32F,
}

/// Read-only table of formats the active GPU backend samples natively.
pub trait GpuCapabilities {
    /// Returns `true` if the backend can sample `format` without conversion.
    fn is_format_supported(&self, format: GpuTextureFormat) -> bool;
}

static HARDWARE_SUPPORT: OnceLock<[bool; FORMAT_COUNT]> = OnceLock::new();

/// Populates the per-format hardware flags from the backend table.
///
/// Runs the query at most once per process. Returns `true` if this call did
/// the population and `false` if the flags were already set.
pub fn refresh_hardware_support(caps: &dyn GpuCapabilities) -> bool {
    let mut populated = false;
    HARDWARE_SUPPORT.get_or_init(|| {
        populated = true;
        let mut flags = [false; FORMAT_COUNT];
        for (flag, desc) in flags.iter_mut().zip(DESCRIPTORS.iter()) {
            *flag = desc.gpu_format.is_some_and(|gpu| caps.is_format_supported(gpu));
        }
        tracing::debug!(
            supported = flags.iter().filter(|f| **f).count(),
            "pixel format hardware support refreshed"
        );
        flags
    });
    populated
}

/// Whether [`refresh_hardware_support`] has already run.
pub fn hardware_support_known() -> bool {
    HARDWARE_SUPPORT.get().is_some()
}

// ============================================================================
// Descriptors
// ============================================================================

/// Number of entries in the registry, `Invalid` included.
pub const FORMAT_COUNT: usize = 40;

/// Immutable per-format storage record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormatDescriptor {
    /// Format this record describes.
    pub format: PixelFormat,
    /// Registry name.
    pub name: &'static str,
    /// Bits per pixel (averaged over a block for compressed formats).
    pub bits_per_pixel: u32,
    /// Block width in pixels (1 for uncompressed formats).
    pub block_width: u32,
    /// Block height in pixels (1 for uncompressed formats).
    pub block_height: u32,
    /// Block-compressed flag.
    pub compressed: bool,
    /// Backend sampling format, if the backend has one.
    pub gpu_format: Option<GpuTextureFormat>,
}

impl PixelFormatDescriptor {
    /// Whether the GPU backend samples this format natively.
    ///
    /// Always `false` until [`refresh_hardware_support`] has run.
    pub fn hardware_supported(&self) -> bool {
        HARDWARE_SUPPORT
            .get()
            .is_some_and(|flags| flags[self.format.table_index()])
    }

    /// Block size as (width, height).
    #[inline]
    pub fn block_size(&self) -> (u32, u32) {
        (self.block_width, self.block_height)
    }

    /// Bytes taken by one block (one pixel for uncompressed formats).
    pub fn block_bytes(&self) -> usize {
        (self.bits_per_pixel * self.block_width * self.block_height / 8) as usize
    }
}

const fn plain(format: PixelFormat, name: &'static str, bpp: u32, gpu: Option<GpuTextureFormat>) -> PixelFormatDescriptor {
    PixelFormatDescriptor {
        format,
        name,
        bits_per_pixel: bpp,
        block_width: 1,
        block_height: 1,
        compressed: false,
        gpu_format: gpu,
    }
}

const fn block(
    format: PixelFormat,
    name: &'static str,
    bpp: u32,
    block: (u32, u32),
    gpu: GpuTextureFormat,
) -> PixelFormatDescriptor {
    PixelFormatDescriptor {
        format,
        name,
        bits_per_pixel: bpp,
        block_width: block.0,
        block_height: block.1,
        compressed: true,
        gpu_format: Some(gpu),
    }
}

use GpuTextureFormat as G;
use PixelFormat as P;

static DESCRIPTORS: [PixelFormatDescriptor; FORMAT_COUNT] = [
    plain(P::Invalid, "INVALID", 0, None),
    plain(P::Rgba8888, "RGBA8888", 32, Some(G::R8G8B8A8)),
    plain(P::Rgba5551, "RGBA5551", 16, Some(G::R5G5B5A1)),
    plain(P::Rgba4444, "RGBA4444", 16, Some(G::R4G4B4A4)),
    plain(P::Rgb888, "RGB888", 24, Some(G::R8G8B8)),
    plain(P::Rgb565, "RGB565", 16, Some(G::R5G6B5)),
    plain(P::A8, "A8", 8, Some(G::R8)),
    plain(P::A16, "A16", 16, Some(G::R16)),
    block(P::Pvr4, "PVR4", 4, (4, 4), G::PvrtcRgba4bpp),
    block(P::Pvr2, "PVR2", 2, (8, 4), G::PvrtcRgba2bpp),
    plain(P::Rgba16161616, "RGBA16161616", 64, Some(G::A16R16G16B16)),
    plain(P::Rgba32323232, "RGBA32323232", 128, Some(G::A32R32G32B32)),
    block(P::Dxt1, "DXT1", 4, (4, 4), G::Dxt1),
    block(P::Dxt3, "DXT3", 8, (4, 4), G::Dxt3),
    block(P::Dxt5, "DXT5", 8, (4, 4), G::Dxt5),
    block(P::Dxt5Nm, "DXT5NM", 8, (4, 4), G::Dxt5),
    block(P::Etc1, "ETC1", 4, (4, 4), G::Etc1),
    block(P::AtcRgb, "ATC_RGB", 4, (4, 4), G::AtcRgb),
    block(P::AtcRgbaExplicitAlpha, "ATC_RGBA_EXPLICIT_ALPHA", 8, (4, 4), G::AtcRgbaExplicit),
    block(P::AtcRgbaInterpolatedAlpha, "ATC_RGBA_INTERPOLATED_ALPHA", 8, (4, 4), G::AtcRgbaInterpolated),
    block(P::Pvr2_2, "PVR2_2", 2, (8, 4), G::Pvrtc2Rgba2bpp),
    block(P::Pvr4_2, "PVR4_2", 4, (4, 4), G::Pvrtc2Rgba4bpp),
    block(P::EacR11Unsigned, "EAC_R11_UNSIGNED", 4, (4, 4), G::EacR11Unsigned),
    block(P::EacR11Signed, "EAC_R11_SIGNED", 4, (4, 4), G::EacR11Signed),
    block(P::EacRg11Unsigned, "EAC_RG11_UNSIGNED", 8, (4, 4), G::EacR11G11Unsigned),
    block(P::EacRg11Signed, "EAC_RG11_SIGNED", 8, (4, 4), G::EacR11G11Signed),
    block(P::Etc2Rgb, "ETC2_RGB", 4, (4, 4), G::Etc2R8G8B8),
    block(P::Etc2Rgba, "ETC2_RGBA", 8, (4, 4), G::Etc2R8G8B8A8),
    block(P::Etc2RgbA1, "ETC2_RGB_A1", 4, (4, 4), G::Etc2R8G8B8A1),
    plain(P::Bgr888, "BGR888", 24, None),
    plain(P::Bgra8888, "BGRA8888", 32, None),
    block(P::Dxt1A, "DXT1A", 4, (4, 4), G::Dxt1),
    plain(P::R16F, "R16F", 16, Some(G::R16F)),
    plain(P::Rg16F, "RG16F", 32, Some(G::Rg16F)),
    plain(P::Rgba16F, "RGBA16F", 64, Some(G::Rgba16F)),
    plain(P::R32F, "R32F", 32, Some(G::R32F)),
    plain(P::Rg32F, "RG32F", 64, Some(G::Rg32F)),
    plain(P::Rgba32F, "RGBA32F", 128, Some(G::Rgba32F)),
    plain(P::Rgb16F, "RGB16F", 48, None),
    plain(P::Rgb32F, "RGB32F", 96, None),
];

lazy_static! {
    static ref BY_NAME: HashMap<&'static str, PixelFormat> =
        DESCRIPTORS.iter().map(|d| (d.name, d.format)).collect();
}

// ============================================================================
// Size helpers
// ============================================================================

fn round_up(value: u32, multiple: u32) -> u64 {
    let multiple = u64::from(multiple.max(1));
    u64::from(value).div_ceil(multiple) * multiple
}

/// Returns the descriptor of `format`.
#[inline]
pub fn descriptor(format: PixelFormat) -> &'static PixelFormatDescriptor {
    format.descriptor()
}

/// Bytes needed to store a `width` x `height` plane of `format`.
///
/// Both dimensions are rounded up to the block size first, so a 1x1 DXT1
/// mip still takes one 8-byte block.
pub fn size_in_bytes(width: u32, height: u32, format: PixelFormat) -> usize {
    let desc = format.descriptor();
    let w = round_up(width, desc.block_width);
    let h = round_up(height, desc.block_height);
    (u64::from(desc.bits_per_pixel) * w / 8 * h) as usize
}

/// Bytes per row of pixels (uncompressed) or per row of blocks (compressed).
///
/// For every format and any height that is a multiple of the block height,
/// `size_in_bytes(w, h) == pitch_in_bytes(w) * h / block_height`.
pub fn pitch_in_bytes(width: u32, format: PixelFormat) -> usize {
    let desc = format.descriptor();
    let w = round_up(width, desc.block_width);
    (u64::from(desc.bits_per_pixel) * w / 8 * u64::from(desc.block_height)) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn table_is_complete_and_ordered() {
        for (i, format) in PixelFormat::ALL.iter().enumerate() {
            assert_eq!(format.table_index(), i);
            assert_eq!(DESCRIPTORS[i].format, *format);
        }
    }

    #[test]
    fn ids_are_stable() {
        assert_eq!(PixelFormat::Rgba8888.as_u32(), 1);
        assert_eq!(PixelFormat::Dxt1.as_u32(), 12);
        assert_eq!(PixelFormat::Dxt1A.as_u32(), 32);
        assert_eq!(PixelFormat::from_u32(32), Some(PixelFormat::Dxt1A));
        assert_eq!(PixelFormat::from_u32(13), None);
        assert_eq!(PixelFormat::from_u32(1000), None);
    }

    #[test]
    fn names_roundtrip() {
        for format in PixelFormat::ALL {
            assert_eq!(PixelFormat::from_name(format.name()), Some(format));
        }
        assert_eq!(PixelFormat::from_name("rgba16f"), Some(PixelFormat::Rgba16F));
        assert_eq!(PixelFormat::from_name("nope"), None);
    }

    #[test]
    fn uncompressed_sizes() {
        assert_eq!(size_in_bytes(4, 4, PixelFormat::Rgba8888), 64);
        assert_eq!(size_in_bytes(3, 2, PixelFormat::Rgb888), 18);
        assert_eq!(size_in_bytes(7, 1, PixelFormat::A8), 7);
        assert_eq!(size_in_bytes(2, 2, PixelFormat::Rgba32F), 64);
        assert_eq!(pitch_in_bytes(3, PixelFormat::Rgb565), 6);
    }

    #[test]
    fn compressed_sizes_round_to_blocks() {
        assert_eq!(size_in_bytes(1, 1, PixelFormat::Dxt1), 8);
        assert_eq!(size_in_bytes(4, 4, PixelFormat::Dxt5), 16);
        assert_eq!(size_in_bytes(8, 8, PixelFormat::Etc1), 32);
        assert_eq!(size_in_bytes(8, 4, PixelFormat::Pvr2), 8);
        assert_eq!(pitch_in_bytes(1, PixelFormat::Dxt3), 16);
    }

    #[test]
    fn bytes_per_pixel_only_for_plain_formats() {
        assert_eq!(PixelFormat::Rgb888.bytes_per_pixel(), Some(3));
        assert_eq!(PixelFormat::Rgba16F.bytes_per_pixel(), Some(8));
        assert_eq!(PixelFormat::Dxt1.bytes_per_pixel(), None);
        assert_eq!(PixelFormat::Invalid.bytes_per_pixel(), None);
    }

    struct OnlyDxt;

    impl GpuCapabilities for OnlyDxt {
        fn is_format_supported(&self, format: GpuTextureFormat) -> bool {
            matches!(format, GpuTextureFormat::Dxt1 | GpuTextureFormat::Dxt5)
        }
    }

    struct Everything;

    impl GpuCapabilities for Everything {
        fn is_format_supported(&self, _: GpuTextureFormat) -> bool {
            true
        }
    }

    #[test]
    fn hardware_support_is_written_once() {
        refresh_hardware_support(&OnlyDxt);
        assert!(hardware_support_known());
        // second refresh must not overwrite the first table
        assert!(!refresh_hardware_support(&Everything));

        // whichever table won the race, formats without a GPU mapping stay unsupported
        assert!(!PixelFormat::Bgr888.descriptor().hardware_supported());
        assert!(!PixelFormat::Invalid.descriptor().hardware_supported());
        assert_eq!(
            PixelFormat::Dxt1A.descriptor().hardware_supported(),
            PixelFormat::Dxt1.descriptor().hardware_supported()
        );
    }

    proptest! {
        #[test]
        fn size_matches_pitch_times_block_rows(
            index in 1usize..FORMAT_COUNT,
            wb in 1u32..64,
            hb in 1u32..64,
        ) {
            let format = PixelFormat::ALL[index];
            let desc = format.descriptor();
            let w = wb * desc.block_width;
            let h = hb * desc.block_height;
            prop_assert_eq!(
                size_in_bytes(w, h, format),
                pitch_in_bytes(w, format) * (h / desc.block_height) as usize
            );
        }
    }
}
