//! DirectDraw Surface (DDS) container.
//!
//! Headers are read and written by hand so that the reserved words survive
//! untouched: this crate keeps the engine pixel format in `reserved1[6]` and
//! an optional CRC32 tag in `reserved1[7..9]`.
//!
//! # Layout
//!
//! ```text
//! "DDS "                       magic
//! DDS_HEADER (124 bytes)       size, flags, height, width, pitch, depth,
//!                              mip count, reserved1[11], pixel format (32),
//!                              caps, caps2, caps3, caps4, reserved2
//! DDS_HEADER_DXT10 (20 bytes)  only when the FourCC is "DX10"
//! payload                      for each face, for each mip
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use vtex_io::dds::DdsCodec;
//! use vtex_io::{ImageCodec, LoadingParams};
//!
//! let mut src = vtex_io::file::open("sky.dds".as_ref())?;
//! let faces = DdsCodec::new().decode(&mut src, &LoadingParams::default())?;
//! ```

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::{debug, trace, warn};
use vtex_core::format::size_in_bytes;
use vtex_core::{CubeFace, Image, PixelFormat, CUBE_FACE_COUNT};

use crate::codec::{
    ImageCodec, ensure_writable, mip_dimension, rewind_on_error, validate_chain, validate_cube_faces,
    validate_header_dimensions,
};
use crate::detect::ImageFormat;
use crate::error::{IoError, IoResult};
use crate::file::{ImageSource, read_exact_or_fail, remaining_len};
use crate::info::{ImageInfo, ImageQuality, LoadingParams, base_mipmap_for_chain};
use crate::layout::{map_u16_in_place, swap_1555_red_blue, swap_4444_red_blue};

/// `"DDS "` as a little-endian word.
pub const DDS_MAGIC: u32 = fourcc(b"DDS ");
/// Size of `DDS_HEADER`, magic excluded.
pub const HEADER_SIZE: usize = 124;
/// Size of `DDS_HEADER_DXT10`.
pub const DX10_HEADER_SIZE: usize = 20;

/// `reserved1` slot holding the engine pixel format.
pub const RESERVED_FORMAT_SLOT: usize = 6;
/// `reserved1` slot holding the `CRC_` tag.
pub const RESERVED_CRC_TAG_SLOT: usize = 7;
/// `reserved1` slot holding the CRC value.
pub const RESERVED_CRC_SLOT: usize = 8;
/// File offset of `reserved1[7]`.
pub const CRC_TAG_OFFSET: u64 = 4 + 7 * 4 + RESERVED_CRC_TAG_SLOT as u64 * 4;
/// Value stored in the tag slot, `'C','R','C','_'`.
pub const CRC_TAG: u32 = fourcc(b"CRC_");

pub const DDSD_CAPS: u32 = 0x1;
pub const DDSD_HEIGHT: u32 = 0x2;
pub const DDSD_WIDTH: u32 = 0x4;
pub const DDSD_PITCH: u32 = 0x8;
pub const DDSD_PIXELFORMAT: u32 = 0x1000;
pub const DDSD_MIPMAPCOUNT: u32 = 0x20000;
pub const DDSD_LINEARSIZE: u32 = 0x80000;

pub const DDSCAPS_COMPLEX: u32 = 0x8;
pub const DDSCAPS_TEXTURE: u32 = 0x1000;
pub const DDSCAPS_MIPMAP: u32 = 0x40_0000;

pub const DDSCAPS2_CUBEMAP: u32 = 0x200;
/// Face bits in +X, -X, +Y, -Y, +Z, -Z order.
pub const DDSCAPS2_CUBEMAP_FACES: [u32; CUBE_FACE_COUNT] = [0x400, 0x800, 0x1000, 0x2000, 0x4000, 0x8000];

pub const DDPF_ALPHAPIXELS: u32 = 0x1;
pub const DDPF_ALPHA: u32 = 0x2;
pub const DDPF_FOURCC: u32 = 0x4;
pub const DDPF_RGB: u32 = 0x40;
pub const DDPF_LUMINANCE: u32 = 0x2_0000;
pub const DDPF_NORMAL: u32 = 0x8000_0000;

const FOURCC_DXT1: u32 = fourcc(b"DXT1");
const FOURCC_DXT3: u32 = fourcc(b"DXT3");
const FOURCC_DXT5: u32 = fourcc(b"DXT5");
const FOURCC_DX10: u32 = fourcc(b"DX10");
const FOURCC_ATC: u32 = fourcc(b"ATC ");
const FOURCC_ATCI: u32 = fourcc(b"ATCI");
const FOURCC_ATCA: u32 = fourcc(b"ATCA");
// D3DFMT values used as FourCC for float formats
const FOURCC_R16F: u32 = 111;
const FOURCC_RG16F: u32 = 112;
const FOURCC_RGBA16F: u32 = 113;
const FOURCC_R32F: u32 = 114;
const FOURCC_RG32F: u32 = 115;
const FOURCC_RGBA32F: u32 = 116;

const DXGI_R32G32B32A32_FLOAT: u32 = 2;
const DXGI_R16G16B16A16_FLOAT: u32 = 10;
const DXGI_R8G8B8A8_UNORM: u32 = 28;
const DXGI_BC1_UNORM: u32 = 71;
const DXGI_BC2_UNORM: u32 = 74;
const DXGI_BC3_UNORM: u32 = 77;
const DXGI_B5G6R5_UNORM: u32 = 85;
const DXGI_B5G5R5A1_UNORM: u32 = 86;

/// Packs four ASCII bytes into a little-endian word.
pub const fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*code)
}

const SUPPORTED_FORMATS: &[PixelFormat] = &[
    PixelFormat::Rgba8888,
    PixelFormat::Rgba5551,
    PixelFormat::Rgba4444,
    PixelFormat::Rgb888,
    PixelFormat::Rgb565,
    PixelFormat::A8,
    PixelFormat::Dxt1,
    PixelFormat::Dxt1A,
    PixelFormat::Dxt3,
    PixelFormat::Dxt5,
    PixelFormat::Dxt5Nm,
    PixelFormat::AtcRgb,
    PixelFormat::AtcRgbaExplicitAlpha,
    PixelFormat::AtcRgbaInterpolatedAlpha,
    PixelFormat::R16F,
    PixelFormat::Rg16F,
    PixelFormat::Rgba16F,
    PixelFormat::R32F,
    PixelFormat::Rg32F,
    PixelFormat::Rgba32F,
];

// ============================================================================
// Header model
// ============================================================================

/// `DDS_PIXELFORMAT`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DdsPixelFormat {
    pub size: u32,
    pub flags: u32,
    pub four_cc: u32,
    pub rgb_bit_count: u32,
    pub r_mask: u32,
    pub g_mask: u32,
    pub b_mask: u32,
    pub a_mask: u32,
}

impl DdsPixelFormat {
    fn masked(flags: u32, bits: u32, masks: [u32; 4]) -> Self {
        Self {
            size: 32,
            flags,
            four_cc: 0,
            rgb_bit_count: bits,
            r_mask: masks[0],
            g_mask: masks[1],
            b_mask: masks[2],
            a_mask: masks[3],
        }
    }

    fn with_four_cc(four_cc: u32, extra_flags: u32) -> Self {
        Self {
            size: 32,
            flags: DDPF_FOURCC | extra_flags,
            four_cc,
            ..Self::default()
        }
    }

    fn has(&self, flags: u32) -> bool {
        self.flags & flags == flags
    }

    fn masks(&self) -> [u32; 4] {
        [self.r_mask, self.g_mask, self.b_mask, self.a_mask]
    }
}

/// `DDS_HEADER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DdsHeader {
    pub size: u32,
    pub flags: u32,
    pub height: u32,
    pub width: u32,
    pub pitch_or_linear_size: u32,
    pub depth: u32,
    pub mip_map_count: u32,
    pub reserved1: [u32; 11],
    pub pixel_format: DdsPixelFormat,
    pub caps: u32,
    pub caps2: u32,
    pub caps3: u32,
    pub caps4: u32,
    pub reserved2: u32,
}

impl Default for DdsHeader {
    fn default() -> Self {
        Self {
            size: HEADER_SIZE as u32,
            flags: DDSD_CAPS | DDSD_HEIGHT | DDSD_WIDTH | DDSD_PIXELFORMAT,
            height: 0,
            width: 0,
            pitch_or_linear_size: 0,
            depth: 0,
            mip_map_count: 0,
            reserved1: [0; 11],
            pixel_format: DdsPixelFormat::default(),
            caps: DDSCAPS_TEXTURE,
            caps2: 0,
            caps3: 0,
            caps4: 0,
            reserved2: 0,
        }
    }
}

impl DdsHeader {
    /// Number of stored faces: 1, or the count of face bits of a cubemap.
    pub fn face_count(&self) -> u32 {
        if self.caps2 & DDSCAPS2_CUBEMAP == 0 {
            return 1;
        }
        DDSCAPS2_CUBEMAP_FACES
            .iter()
            .filter(|&&bit| self.caps2 & bit != 0)
            .count()
            .max(1) as u32
    }

    /// Faces present in a cubemap, in storage order.
    pub fn cube_faces(&self) -> Vec<CubeFace> {
        if self.caps2 & DDSCAPS2_CUBEMAP == 0 {
            return Vec::new();
        }
        CubeFace::ALL
            .iter()
            .zip(DDSCAPS2_CUBEMAP_FACES)
            .filter(|&(_, bit)| self.caps2 & bit != 0)
            .map(|(&face, _)| face)
            .collect()
    }

    /// Mip levels per face, at least 1.
    pub fn mip_count(&self) -> u32 {
        self.mip_map_count.max(1)
    }
}

/// `DDS_HEADER_DXT10`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dx10Header {
    pub dxgi_format: u32,
    pub resource_dimension: u32,
    pub misc_flag: u32,
    pub array_size: u32,
    pub misc_flags2: u32,
}

/// Parsed headers of a DDS file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DdsFile {
    pub header: DdsHeader,
    pub dx10: Option<Dx10Header>,
}

impl DdsFile {
    /// Reads magic, header and the optional DX10 extension.
    pub fn read<R: Read + ?Sized>(src: &mut R) -> IoResult<Self> {
        let mut raw = [0u8; 4 + HEADER_SIZE];
        src.read_exact(&mut raw)
            .map_err(|_| IoError::ReadFailed("DDS header is truncated".into()))?;
        let mut r = &raw[..];
        let magic = r.read_u32::<LittleEndian>()?;
        if magic != DDS_MAGIC {
            return Err(IoError::FormatUnrecognized("missing DDS magic".into()));
        }

        let size = r.read_u32::<LittleEndian>()?;
        let flags = r.read_u32::<LittleEndian>()?;
        let height = r.read_u32::<LittleEndian>()?;
        let width = r.read_u32::<LittleEndian>()?;
        let pitch_or_linear_size = r.read_u32::<LittleEndian>()?;
        let depth = r.read_u32::<LittleEndian>()?;
        let mip_map_count = r.read_u32::<LittleEndian>()?;
        let mut reserved1 = [0u32; 11];
        r.read_u32_into::<LittleEndian>(&mut reserved1)?;
        let pixel_format = DdsPixelFormat {
            size: r.read_u32::<LittleEndian>()?,
            flags: r.read_u32::<LittleEndian>()?,
            four_cc: r.read_u32::<LittleEndian>()?,
            rgb_bit_count: r.read_u32::<LittleEndian>()?,
            r_mask: r.read_u32::<LittleEndian>()?,
            g_mask: r.read_u32::<LittleEndian>()?,
            b_mask: r.read_u32::<LittleEndian>()?,
            a_mask: r.read_u32::<LittleEndian>()?,
        };
        let header = DdsHeader {
            size,
            flags,
            height,
            width,
            pitch_or_linear_size,
            depth,
            mip_map_count,
            reserved1,
            pixel_format,
            caps: r.read_u32::<LittleEndian>()?,
            caps2: r.read_u32::<LittleEndian>()?,
            caps3: r.read_u32::<LittleEndian>()?,
            caps4: r.read_u32::<LittleEndian>()?,
            reserved2: r.read_u32::<LittleEndian>()?,
        };

        let dx10 = if pixel_format.has(DDPF_FOURCC) && pixel_format.four_cc == FOURCC_DX10 {
            let mut raw = [0u8; DX10_HEADER_SIZE];
            src.read_exact(&mut raw)
                .map_err(|_| IoError::ReadFailed("DX10 header is truncated".into()))?;
            let mut r = &raw[..];
            Some(Dx10Header {
                dxgi_format: r.read_u32::<LittleEndian>()?,
                resource_dimension: r.read_u32::<LittleEndian>()?,
                misc_flag: r.read_u32::<LittleEndian>()?,
                array_size: r.read_u32::<LittleEndian>()?,
                misc_flags2: r.read_u32::<LittleEndian>()?,
            })
        } else {
            None
        };

        Ok(Self { header, dx10 })
    }

    /// Writes magic, header and the optional DX10 extension.
    pub fn write<W: Write + ?Sized>(&self, dst: &mut W) -> std::io::Result<()> {
        let h = &self.header;
        dst.write_u32::<LittleEndian>(DDS_MAGIC)?;
        for v in [
            h.size,
            h.flags,
            h.height,
            h.width,
            h.pitch_or_linear_size,
            h.depth,
            h.mip_map_count,
        ] {
            dst.write_u32::<LittleEndian>(v)?;
        }
        for v in h.reserved1 {
            dst.write_u32::<LittleEndian>(v)?;
        }
        let pf = &h.pixel_format;
        for v in [
            pf.size,
            pf.flags,
            pf.four_cc,
            pf.rgb_bit_count,
            pf.r_mask,
            pf.g_mask,
            pf.b_mask,
            pf.a_mask,
            h.caps,
            h.caps2,
            h.caps3,
            h.caps4,
            h.reserved2,
        ] {
            dst.write_u32::<LittleEndian>(v)?;
        }
        if let Some(dx10) = &self.dx10 {
            for v in [
                dx10.dxgi_format,
                dx10.resource_dimension,
                dx10.misc_flag,
                dx10.array_size,
                dx10.misc_flags2,
            ] {
                dst.write_u32::<LittleEndian>(v)?;
            }
        }
        Ok(())
    }

    /// Bytes before the payload.
    pub fn headers_size(&self) -> u64 {
        let dx10 = if self.dx10.is_some() { DX10_HEADER_SIZE } else { 0 };
        (4 + HEADER_SIZE + dx10) as u64
    }

    /// Stored CRC, if the file was tagged.
    pub fn crc(&self) -> Option<u32> {
        let reserved = &self.header.reserved1;
        (reserved[RESERVED_CRC_TAG_SLOT] == CRC_TAG).then_some(reserved[RESERVED_CRC_SLOT])
    }

    /// Engine format and on-disk layout, `None` for unknown encodings.
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        self.pixel_layout().map(|(format, _)| format)
    }

    fn pixel_layout(&self) -> Option<(PixelFormat, DiskLayout)> {
        let (format, layout) = detect_pixel_format(&self.header.pixel_format, self.dx10.as_ref())?;
        if format == PixelFormat::Dxt1 {
            let stored = PixelFormat::from_u32(self.header.reserved1[RESERVED_FORMAT_SLOT]);
            if let Some(f @ (PixelFormat::Dxt1 | PixelFormat::Dxt1A)) = stored {
                return Some((f, layout));
            }
        }
        Some((format, layout))
    }
}

/// Writes a CRC tag into the reserved words of an existing DDS file.
///
/// Only the 8 bytes at [`CRC_TAG_OFFSET`] are touched. Fails when the file
/// already carries a CRC or when the slots hold foreign data.
pub fn write_crc_in_place<F: Read + Write + Seek + ?Sized>(file: &mut F, crc: u32) -> IoResult<()> {
    file.seek(SeekFrom::Start(0))?;
    let dds = DdsFile::read(file)?;
    if let Some(existing) = dds.crc() {
        warn!(crc = existing, "DDS already carries a CRC");
        return Err(IoError::FormatUnsupported("DDS already carries a CRC".into()));
    }
    let reserved = &dds.header.reserved1;
    if reserved[RESERVED_CRC_TAG_SLOT] != 0 || reserved[RESERVED_CRC_SLOT] != 0 {
        warn!("DDS reserved words are in use, not writing CRC");
        return Err(IoError::FormatUnsupported("DDS reserved words are in use".into()));
    }
    file.seek(SeekFrom::Start(CRC_TAG_OFFSET))?;
    file.write_u32::<LittleEndian>(CRC_TAG).map_err(IoError::write_failed)?;
    file.write_u32::<LittleEndian>(crc).map_err(IoError::write_failed)?;
    file.flush().map_err(IoError::write_failed)?;
    Ok(())
}

// ============================================================================
// Pixel formats
// ============================================================================

/// How payload bytes differ from the in-memory layout.
///
/// Only the four D3D layouts are rewritten. RGB888 and RGB565 are stored
/// as they are laid out in memory whatever their masks say.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiskLayout {
    Native,
    /// A8R8G8B8: bytes B, G, R, A.
    Bgra,
    /// X8R8G8B8: bytes B, G, R, X, read as RGB888.
    Bgrx,
    /// A1R5G5B5: blue in the low bits.
    Argb1555,
    /// A4R4G4B4: blue in the low nibble.
    Argb4444,
}

fn detect_pixel_format(pf: &DdsPixelFormat, dx10: Option<&Dx10Header>) -> Option<(PixelFormat, DiskLayout)> {
    use DiskLayout::*;

    if let Some(dx10) = dx10 {
        return match dx10.dxgi_format {
            DXGI_R8G8B8A8_UNORM => Some((PixelFormat::Rgba8888, Native)),
            DXGI_B5G5R5A1_UNORM => Some((PixelFormat::Rgba5551, Argb1555)),
            DXGI_B5G6R5_UNORM => Some((PixelFormat::Rgb565, Native)),
            DXGI_BC1_UNORM => Some((PixelFormat::Dxt1, Native)),
            DXGI_BC2_UNORM => Some((PixelFormat::Dxt3, Native)),
            DXGI_BC3_UNORM if pf.has(DDPF_NORMAL) => Some((PixelFormat::Dxt5Nm, Native)),
            DXGI_BC3_UNORM => Some((PixelFormat::Dxt5, Native)),
            DXGI_R16G16B16A16_FLOAT => Some((PixelFormat::Rgba16F, Native)),
            DXGI_R32G32B32A32_FLOAT => Some((PixelFormat::Rgba32F, Native)),
            _ => None,
        };
    }

    // RGBA, RGB, alpha, then FourCC; the first flag that matches decides
    if pf.has(DDPF_RGB | DDPF_ALPHAPIXELS) {
        return match pf.masks() {
            [0xff, 0xff00, 0xff_0000, 0xff00_0000] => Some((PixelFormat::Rgba8888, Native)),
            [0xff_0000, 0xff00, 0xff, 0xff00_0000] => Some((PixelFormat::Rgba8888, Bgra)),
            [0x7c00, 0x3e0, 0x1f, 0x8000] => Some((PixelFormat::Rgba5551, Argb1555)),
            [0xf00, 0xf0, 0xf, 0xf000] => Some((PixelFormat::Rgba4444, Argb4444)),
            _ => None,
        };
    }

    if pf.has(DDPF_RGB) {
        return match (pf.rgb_bit_count, [pf.r_mask, pf.g_mask, pf.b_mask]) {
            (16, [0xf800, 0x7e0, 0x1f]) => Some((PixelFormat::Rgb565, Native)),
            (24, [0xff_0000, 0xff00, 0xff] | [0xff, 0xff00, 0xff_0000]) => Some((PixelFormat::Rgb888, Native)),
            (32, [0xff_0000, 0xff00, 0xff]) => Some((PixelFormat::Rgb888, Bgrx)),
            _ => None,
        };
    }

    if pf.has(DDPF_ALPHA) && pf.rgb_bit_count == 8 && pf.a_mask == 0xff {
        return Some((PixelFormat::A8, Native));
    }

    if pf.has(DDPF_FOURCC) {
        let format = match pf.four_cc {
            FOURCC_DXT1 => PixelFormat::Dxt1,
            FOURCC_DXT3 => PixelFormat::Dxt3,
            FOURCC_DXT5 if pf.has(DDPF_NORMAL) => PixelFormat::Dxt5Nm,
            FOURCC_DXT5 => PixelFormat::Dxt5,
            FOURCC_ATC => PixelFormat::AtcRgb,
            FOURCC_ATCI => PixelFormat::AtcRgbaExplicitAlpha,
            FOURCC_ATCA => PixelFormat::AtcRgbaInterpolatedAlpha,
            FOURCC_R16F => PixelFormat::R16F,
            FOURCC_RG16F => PixelFormat::Rg16F,
            FOURCC_RGBA16F => PixelFormat::Rgba16F,
            FOURCC_R32F => PixelFormat::R32F,
            FOURCC_RG32F => PixelFormat::Rg32F,
            FOURCC_RGBA32F => PixelFormat::Rgba32F,
            _ => return None,
        };
        return Some((format, Native));
    }

    None
}

fn pixel_format_header(format: PixelFormat) -> Option<(DdsPixelFormat, DiskLayout)> {
    use DiskLayout::*;

    let rgba = DDPF_RGB | DDPF_ALPHAPIXELS;
    let entry = match format {
        PixelFormat::Rgba8888 => (DdsPixelFormat::masked(rgba, 32, [0xff, 0xff00, 0xff_0000, 0xff00_0000]), Native),
        PixelFormat::Rgba5551 => (DdsPixelFormat::masked(rgba, 16, [0x7c00, 0x3e0, 0x1f, 0x8000]), Argb1555),
        PixelFormat::Rgba4444 => (DdsPixelFormat::masked(rgba, 16, [0xf00, 0xf0, 0xf, 0xf000]), Argb4444),
        PixelFormat::Rgb565 => (DdsPixelFormat::masked(DDPF_RGB, 16, [0xf800, 0x7e0, 0x1f, 0]), Native),
        PixelFormat::Rgb888 => (DdsPixelFormat::masked(DDPF_RGB, 24, [0xff_0000, 0xff00, 0xff, 0]), Native),
        PixelFormat::A8 => (DdsPixelFormat::masked(DDPF_ALPHA, 8, [0, 0, 0, 0xff]), Native),
        PixelFormat::Dxt1 | PixelFormat::Dxt1A => (DdsPixelFormat::with_four_cc(FOURCC_DXT1, 0), Native),
        PixelFormat::Dxt3 => (DdsPixelFormat::with_four_cc(FOURCC_DXT3, 0), Native),
        PixelFormat::Dxt5 => (DdsPixelFormat::with_four_cc(FOURCC_DXT5, 0), Native),
        PixelFormat::Dxt5Nm => (DdsPixelFormat::with_four_cc(FOURCC_DXT5, DDPF_NORMAL), Native),
        PixelFormat::AtcRgb => (DdsPixelFormat::with_four_cc(FOURCC_ATC, 0), Native),
        PixelFormat::AtcRgbaExplicitAlpha => (DdsPixelFormat::with_four_cc(FOURCC_ATCI, 0), Native),
        PixelFormat::AtcRgbaInterpolatedAlpha => (DdsPixelFormat::with_four_cc(FOURCC_ATCA, 0), Native),
        PixelFormat::R16F => (DdsPixelFormat::with_four_cc(FOURCC_R16F, 0), Native),
        PixelFormat::Rg16F => (DdsPixelFormat::with_four_cc(FOURCC_RG16F, 0), Native),
        PixelFormat::Rgba16F => (DdsPixelFormat::with_four_cc(FOURCC_RGBA16F, 0), Native),
        PixelFormat::R32F => (DdsPixelFormat::with_four_cc(FOURCC_R32F, 0), Native),
        PixelFormat::Rg32F => (DdsPixelFormat::with_four_cc(FOURCC_RG32F, 0), Native),
        PixelFormat::Rgba32F => (DdsPixelFormat::with_four_cc(FOURCC_RGBA32F, 0), Native),
        _ => return None,
    };
    Some(entry)
}

fn disk_size(layout: DiskLayout, width: u32, height: u32, format: PixelFormat) -> usize {
    match layout {
        DiskLayout::Bgrx => width as usize * height as usize * 4,
        _ => size_in_bytes(width, height, format),
    }
}

fn to_memory(layout: DiskLayout, mut data: Vec<u8>) -> Vec<u8> {
    match layout {
        DiskLayout::Native => {}
        DiskLayout::Bgra => data.chunks_exact_mut(4).for_each(|px| px.swap(0, 2)),
        DiskLayout::Bgrx => {
            return data.chunks_exact(4).flat_map(|px| [px[2], px[1], px[0]]).collect();
        }
        DiskLayout::Argb1555 => map_u16_in_place(&mut data, swap_1555_red_blue),
        DiskLayout::Argb4444 => map_u16_in_place(&mut data, swap_4444_red_blue),
    }
    data
}

fn append_payload(out: &mut Vec<u8>, layout: DiskLayout, image: &Image) {
    let start = out.len();
    match layout {
        DiskLayout::Bgrx => {
            out.extend(image.data().chunks_exact(3).flat_map(|px| [px[2], px[1], px[0], 0xff]));
            return;
        }
        _ => out.extend_from_slice(image.data()),
    }
    let data = &mut out[start..];
    match layout {
        DiskLayout::Bgra => data.chunks_exact_mut(4).for_each(|px| px.swap(0, 2)),
        DiskLayout::Argb1555 => map_u16_in_place(data, swap_1555_red_blue),
        DiskLayout::Argb4444 => map_u16_in_place(data, swap_4444_red_blue),
        DiskLayout::Native | DiskLayout::Bgrx => {}
    }
}

fn header_for(format: PixelFormat, width: u32, height: u32, mip_count: usize) -> IoResult<(DdsFile, DiskLayout)> {
    let (pixel_format, layout) = pixel_format_header(format)
        .ok_or_else(|| IoError::FormatUnsupported(format!("{format} cannot be written to DDS")))?;
    let mut header = DdsHeader {
        width,
        height,
        pixel_format,
        ..DdsHeader::default()
    };

    if format.is_dxt() || format.is_atc() {
        header.flags |= DDSD_LINEARSIZE;
        header.pitch_or_linear_size = width.div_ceil(4) * format.descriptor().block_bytes() as u32;
    } else {
        header.flags |= DDSD_PITCH;
        header.pitch_or_linear_size = (disk_size(layout, width, 1, format)) as u32;
    }

    if mip_count > 1 {
        header.flags |= DDSD_MIPMAPCOUNT;
        header.mip_map_count = mip_count as u32;
        header.caps |= DDSCAPS_COMPLEX | DDSCAPS_MIPMAP;
    }
    header.reserved1[RESERVED_FORMAT_SLOT] = format.as_u32();

    Ok((DdsFile { header, dx10: None }, layout))
}

// ============================================================================
// Codec
// ============================================================================

/// DDS codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct DdsCodec;

impl DdsCodec {
    /// Creates the codec.
    pub fn new() -> Self {
        Self
    }

    /// Reads the headers, leaving `src` at the payload.
    pub fn read_file(&self, src: &mut dyn ImageSource) -> IoResult<DdsFile> {
        src.rewind_to_start()?;
        let file = DdsFile::read(src);
        rewind_on_error(src, file)
    }

    fn decode_images(&self, src: &mut dyn ImageSource, params: &LoadingParams) -> IoResult<Vec<Image>> {
        let file = self.read_file(src)?;
        let header = file.header;
        let Some((format, layout)) = file.pixel_layout() else {
            let pf = header.pixel_format;
            warn!(flags = pf.flags, four_cc = pf.four_cc, bits = pf.rgb_bit_count, "unsupported DDS pixel format");
            return Err(IoError::FormatUnsupported(format!(
                "DDS pixel format (flags {:#x}, fourcc {:#010x})",
                pf.flags, pf.four_cc
            )));
        };

        let mip_count = header.mip_count();
        validate_header_dimensions(header.width, header.height, mip_count).inspect_err(|e| {
            warn!(error = %e, "invalid DDS dimensions");
        })?;
        let face_count = header.face_count();
        let payload = (0..mip_count)
            .map(|mip| disk_size(layout, mip_dimension(header.width, mip), mip_dimension(header.height, mip), format))
            .fold(0u64, |total, size| total.saturating_add(size as u64))
            .saturating_mul(u64::from(face_count));
        if payload > remaining_len(src)? {
            return Err(IoError::ReadFailed(format!("DDS mip data is truncated, expected {payload} bytes")));
        }

        let faces = header.cube_faces();
        let from_mip = base_mipmap_for_chain(header.width, header.height, mip_count, params);
        debug!(%format, ?layout, mips = mip_count, faces = face_count, from_mip, "decoding DDS");

        let mut images = Vec::with_capacity((face_count * (mip_count - from_mip)) as usize);
        for face in 0..face_count as usize {
            let cube_face = if face_count > 1 { faces.get(face).copied() } else { None };
            for mip in 0..mip_count {
                let w = mip_dimension(header.width, mip);
                let h = mip_dimension(header.height, mip);
                let size = disk_size(layout, w, h, format);
                if mip < from_mip {
                    trace!(face, mip, "skipping DDS mip");
                    src.seek(SeekFrom::Current(size as i64))?;
                    continue;
                }
                let mut data = vec![0u8; size];
                read_exact_or_fail(src, &mut data, "DDS mip data")?;
                let image = Image::from_vec(w, h, format, to_memory(layout, data))?
                    .with_mipmap_level(mip - from_mip + params.first_mipmap_index)
                    .with_cube_face(cube_face);
                images.push(image);
            }
        }
        Ok(images)
    }
}

impl ImageCodec for DdsCodec {
    fn format(&self) -> ImageFormat {
        ImageFormat::Dds
    }

    fn supported_formats(&self) -> &'static [PixelFormat] {
        SUPPORTED_FORMATS
    }

    fn get_info(&self, src: &mut dyn ImageSource) -> IoResult<ImageInfo> {
        let file = self.read_file(src)?;
        let total = src.size()?;
        src.rewind_to_start()?;
        Ok(ImageInfo {
            width: file.header.width,
            height: file.header.height,
            format: file.pixel_format().unwrap_or(PixelFormat::Invalid),
            data_size: total.saturating_sub(file.headers_size()),
            mipmaps_count: file.header.mip_count(),
            face_count: file.header.face_count(),
        })
    }

    fn decode(&self, src: &mut dyn ImageSource, params: &LoadingParams) -> IoResult<Vec<Image>> {
        let decoded = self.decode_images(src, params);
        rewind_on_error(src, decoded)
    }

    fn encode_to_vec(&self, images: &[Image], _quality: ImageQuality) -> IoResult<Vec<u8>> {
        let format = validate_chain(images)?;
        ensure_writable(self, format)?;
        let (file, layout) = header_for(format, images[0].width, images[0].height, images.len())?;

        let mut out = Vec::new();
        file.write(&mut out).map_err(IoError::write_failed)?;
        for image in images {
            append_payload(&mut out, layout, image);
        }
        Ok(out)
    }

    fn encode_cubemap_to_vec(&self, faces: &[Vec<Image>], _quality: ImageQuality) -> IoResult<Vec<u8>> {
        let format = validate_cube_faces(faces)?;
        ensure_writable(self, format)?;
        if faces.len() > CUBE_FACE_COUNT {
            return Err(IoError::FormatUnsupported(format!("{} cube faces", faces.len())));
        }

        // Storage order is fixed by the face bits, not by the caller.
        let mut tagged: Vec<(CubeFace, &Vec<Image>)> = Vec::with_capacity(faces.len());
        for (index, chain) in faces.iter().enumerate() {
            let face = chain[0].cube_face.or_else(|| CubeFace::from_index(index)).ok_or_else(|| {
                IoError::FormatUnsupported(format!("face {index} has no cube face"))
            })?;
            if tagged.iter().any(|(f, _)| *f == face) {
                return Err(IoError::FormatUnsupported(format!("duplicate cube face {face:?}")));
            }
            tagged.push((face, chain));
        }
        tagged.sort_by_key(|(face, _)| face.index());

        let first = &faces[0][0];
        let (mut file, layout) = header_for(format, first.width, first.height, faces[0].len())?;
        file.header.caps |= DDSCAPS_COMPLEX;
        file.header.caps2 = DDSCAPS2_CUBEMAP;
        for (face, _) in &tagged {
            file.header.caps2 |= DDSCAPS2_CUBEMAP_FACES[face.index()];
        }

        let mut out = Vec::new();
        file.write(&mut out).map_err(IoError::write_failed)?;
        for (_, chain) in tagged {
            for image in chain {
                append_payload(&mut out, layout, image);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn patterned(w: u32, h: u32, format: PixelFormat, seed: u8) -> Image {
        let size = size_in_bytes(w, h, format);
        let data: Vec<u8> = (0..size).map(|i| (i as u8).wrapping_mul(13).wrapping_add(seed)).collect();
        Image::from_vec(w, h, format, data).unwrap()
    }

    fn chain(format: PixelFormat, size: u32) -> Vec<Image> {
        let mut out = Vec::new();
        let (mut s, mut level) = (size, 0);
        loop {
            out.push(patterned(s, s, format, level as u8).with_mipmap_level(level));
            if s == 1 {
                break;
            }
            s /= 2;
            level += 1;
        }
        out
    }

    #[test]
    fn header_is_128_bytes_with_reserved_slots() {
        let bytes = DdsCodec
            .encode_to_vec(&[patterned(4, 4, PixelFormat::Dxt1A, 0)], ImageQuality::default())
            .unwrap();
        assert_eq!(&bytes[0..4], b"DDS ");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 124);
        // reserved1[6] at 56
        assert_eq!(
            u32::from_le_bytes(bytes[56..60].try_into().unwrap()),
            PixelFormat::Dxt1A.as_u32()
        );
        assert_eq!(CRC_TAG_OFFSET, 60);
        assert_eq!(&bytes[84..88], b"DXT1");
        assert_eq!(bytes.len(), 128 + 8);
    }

    #[test]
    fn round_trips() {
        for format in [
            PixelFormat::Rgba8888,
            PixelFormat::Rgba5551,
            PixelFormat::Rgba4444,
            PixelFormat::Rgb565,
            PixelFormat::Rgb888,
            PixelFormat::A8,
            PixelFormat::Dxt1,
            PixelFormat::Dxt5Nm,
            PixelFormat::AtcRgbaInterpolatedAlpha,
            PixelFormat::Rgba16F,
            PixelFormat::Rg32F,
        ] {
            let images = chain(format, 8);
            let bytes = DdsCodec.encode_to_vec(&images, ImageQuality::default()).unwrap();
            let decoded = DdsCodec.decode(&mut Cursor::new(bytes), &LoadingParams::default()).unwrap();
            assert_eq!(decoded, images, "{format}");
        }
    }

    #[test]
    fn rgb888_and_565_keep_memory_layout() {
        let image = Image::from_vec(1, 1, PixelFormat::Rgb888, vec![1, 2, 3]).unwrap();
        let bytes = DdsCodec.encode_to_vec(&[image], ImageQuality::default()).unwrap();
        assert_eq!(&bytes[128..], &[1, 2, 3]);
        // masks are the D3D R8G8B8 ones
        let file = DdsFile::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(file.header.pixel_format.r_mask, 0xff_0000);
        let decoded = DdsCodec.decode(&mut Cursor::new(bytes), &LoadingParams::default()).unwrap();
        assert_eq!(decoded[0].data, vec![1, 2, 3]);

        let image = Image::from_vec(1, 1, PixelFormat::Rgb565, vec![0x1f, 0x00]).unwrap();
        let bytes = DdsCodec.encode_to_vec(&[image], ImageQuality::default()).unwrap();
        assert_eq!(&bytes[128..], &[0x1f, 0x00]);
    }

    #[test]
    fn rgb_flags_win_over_fourcc() {
        let (mut file, _) = header_for(PixelFormat::Rgb888, 1, 1, 1).unwrap();
        file.header.pixel_format.flags |= DDPF_FOURCC;
        file.header.pixel_format.four_cc = FOURCC_DXT5;
        file.header.reserved1[RESERVED_FORMAT_SLOT] = 0;
        let mut bytes = Vec::new();
        file.write(&mut bytes).unwrap();
        bytes.extend_from_slice(&[7, 8, 9]);
        let decoded = DdsCodec.decode(&mut Cursor::new(bytes), &LoadingParams::default()).unwrap();
        assert_eq!(decoded[0].format, PixelFormat::Rgb888);
        assert_eq!(decoded[0].data, vec![7, 8, 9]);

        // RGBA flags with masks nothing knows do not fall through to the FourCC
        let (mut file, _) = header_for(PixelFormat::Dxt5, 4, 4, 1).unwrap();
        file.header.pixel_format.flags |= DDPF_RGB | DDPF_ALPHAPIXELS;
        file.header.pixel_format.r_mask = 0x3ff;
        assert_eq!(file.pixel_format(), None);
    }

    fn raw_file(width: u32, height: u32, mip_map_count: u32, payload: usize) -> Vec<u8> {
        let (mut file, _) = header_for(PixelFormat::Rgba8888, 1, 1, 1).unwrap();
        file.header.width = width;
        file.header.height = height;
        file.header.mip_map_count = mip_map_count;
        let mut bytes = Vec::new();
        file.write(&mut bytes).unwrap();
        bytes.resize(bytes.len() + payload, 0);
        bytes
    }

    #[test]
    fn hostile_headers_are_errors() {
        let cases = [
            (raw_file(1, 1, u32::MAX, 4), crate::ErrorKind::DimensionInvalid),
            (raw_file(0x1000_0000, 4, 1, 64), crate::ErrorKind::DimensionInvalid),
            (raw_file(0, 4, 1, 64), crate::ErrorKind::DimensionInvalid),
            (raw_file(0xffff, 0xffff, 1, 64), crate::ErrorKind::ReadFailed),
            (raw_file(4, 4, 1, 10), crate::ErrorKind::ReadFailed),
        ];
        for (bytes, kind) in cases {
            let mut src = Cursor::new(bytes);
            let err = DdsCodec.decode(&mut src, &LoadingParams::default()).unwrap_err();
            assert_eq!(err.kind(), kind);
            assert_eq!(src.stream_position().unwrap(), 0);
        }
    }

    #[test]
    fn argb8888_is_swizzled_on_read() {
        let (mut file, _) = header_for(PixelFormat::Rgba8888, 1, 1, 1).unwrap();
        file.header.pixel_format =
            DdsPixelFormat::masked(DDPF_RGB | DDPF_ALPHAPIXELS, 32, [0xff_0000, 0xff00, 0xff, 0xff00_0000]);
        let mut bytes = Vec::new();
        file.write(&mut bytes).unwrap();
        bytes.extend_from_slice(&[10, 20, 30, 40]);
        let decoded = DdsCodec.decode(&mut Cursor::new(bytes), &LoadingParams::default()).unwrap();
        assert_eq!(decoded[0].data, vec![30, 20, 10, 40]);
    }

    #[test]
    fn xrgb_reads_as_rgb888() {
        let (mut file, _) = header_for(PixelFormat::Rgb888, 2, 1, 1).unwrap();
        file.header.pixel_format = DdsPixelFormat::masked(DDPF_RGB, 32, [0xff_0000, 0xff00, 0xff, 0]);
        let mut bytes = Vec::new();
        file.write(&mut bytes).unwrap();
        bytes.extend_from_slice(&[3, 2, 1, 0, 6, 5, 4, 0]);
        let decoded = DdsCodec.decode(&mut Cursor::new(bytes), &LoadingParams::default()).unwrap();
        assert_eq!(decoded[0].format, PixelFormat::Rgb888);
        assert_eq!(decoded[0].data, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn dxt1_without_tag_stays_dxt1() {
        let image = patterned(4, 4, PixelFormat::Dxt1A, 3);
        let mut bytes = DdsCodec.encode_to_vec(&[image], ImageQuality::default()).unwrap();
        bytes[56..60].copy_from_slice(&[0; 4]);
        let decoded = DdsCodec.decode(&mut Cursor::new(bytes), &LoadingParams::default()).unwrap();
        assert_eq!(decoded[0].format, PixelFormat::Dxt1);
    }

    #[test]
    fn dx10_header_is_understood() {
        let mut file = DdsFile::default();
        file.header.width = 2;
        file.header.height = 2;
        file.header.pixel_format = DdsPixelFormat::with_four_cc(FOURCC_DX10, 0);
        file.dx10 = Some(Dx10Header {
            dxgi_format: DXGI_R16G16B16A16_FLOAT,
            resource_dimension: 3,
            array_size: 1,
            ..Dx10Header::default()
        });
        let mut bytes = Vec::new();
        file.write(&mut bytes).unwrap();
        bytes.extend(std::iter::repeat_n(0u8, 2 * 2 * 8));

        let info = DdsCodec.get_info(&mut Cursor::new(bytes.clone())).unwrap();
        assert_eq!(info.format, PixelFormat::Rgba16F);
        assert_eq!(info.data_size, 32);
        let decoded = DdsCodec.decode(&mut Cursor::new(bytes), &LoadingParams::default()).unwrap();
        assert_eq!(decoded[0].format, PixelFormat::Rgba16F);
    }

    #[test]
    fn cubemap_is_face_major() {
        let faces: Vec<Vec<Image>> = CubeFace::ALL
            .iter()
            .rev()
            .map(|&f| {
                chain(PixelFormat::A8, 4)
                    .into_iter()
                    .map(|i| i.with_cube_face(Some(f)))
                    .collect()
            })
            .collect();
        let bytes = DdsCodec.encode_cubemap_to_vec(&faces, ImageQuality::default()).unwrap();
        let file = DdsFile::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(file.header.caps2, 0xfe00);
        assert_ne!(file.header.caps & DDSCAPS_COMPLEX, 0);

        let decoded = DdsCodec.decode(&mut Cursor::new(bytes), &LoadingParams::default()).unwrap();
        assert_eq!(decoded.len(), 18);
        assert_eq!(decoded[0].cube_face, Some(CubeFace::PositiveX));
        assert_eq!(decoded[2].mipmap_level, 2);
        assert_eq!(decoded[3].cube_face, Some(CubeFace::NegativeX));
    }

    #[test]
    fn crc_written_in_place_once() {
        let bytes = DdsCodec
            .encode_to_vec(&[patterned(2, 2, PixelFormat::Rgba8888, 0)], ImageQuality::default())
            .unwrap();
        let mut cursor = Cursor::new(bytes.clone());
        write_crc_in_place(&mut cursor, 0x1234_5678).unwrap();
        let tagged = cursor.into_inner();
        assert_eq!(tagged.len(), bytes.len());
        assert_eq!(&tagged[60..64], b"CRC_");
        assert_eq!(&tagged[128..], &bytes[128..]);

        let file = DdsFile::read(&mut Cursor::new(&tagged)).unwrap();
        assert_eq!(file.crc(), Some(0x1234_5678));
        let err = write_crc_in_place(&mut Cursor::new(tagged), 1).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::FormatUnsupported);
    }

    #[test]
    fn base_mip_with_floor() {
        let bytes = DdsCodec
            .encode_to_vec(&chain(PixelFormat::Rgba8888, 32), ImageQuality::default())
            .unwrap();
        let params = LoadingParams::new().with_minimal_size(8, 8);
        let decoded = DdsCodec.decode(&mut Cursor::new(bytes), &params).unwrap();
        assert_eq!(decoded[0].width, 8);
        assert_eq!(decoded.len(), 4);
    }

    #[test]
    fn foreign_file_is_unrecognized() {
        let err = DdsCodec
            .decode(&mut Cursor::new(vec![0u8; 200]), &LoadingParams::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::FormatUnrecognized);
    }
}
