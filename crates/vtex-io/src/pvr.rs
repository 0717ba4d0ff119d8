//! PowerVR PVR v3 container.
//!
//! # Layout
//!
//! ```text
//! 52-byte header (little-endian)
//!   u32 version (0x03525650)   u32 flags            u64 pixel format
//!   u32 colour space           u32 channel type     u32 height
//!   u32 width                  u32 depth            u32 surfaces
//!   u32 faces                  u32 mip count        u32 metadata size
//! metadata blocks, `metadata size` bytes in total
//!   u32 fourcc  u32 key  u32 data size  [data]
//! payload: for each mip, for each surface, for each face
//! ```
//!
//! Three metadata keys are understood: the cubemap face layout (key 2, six
//! characters out of `XxYyZz`), the CRC32 tag (`CRC_`) and the engine pixel
//! format (`FMT_`), which keeps DXT1A apart from DXT1.
//!
//! RGBA4444 and RGBA5551 are stored red-first from the top bits and are
//! rewritten to memory order on read and back on write. Every other format,
//! RGB565 included, is stored as it is laid out in memory.

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::{debug, error, trace};
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
use crate::layout::{map_u16_in_place, pvr5551_to_rgba5551, reverse_nibbles, rgba5551_to_pvr5551};

/// Header size in bytes.
pub const HEADER_SIZE: usize = 52;
/// Version word of a native-endian v3 file.
pub const PVRTEX3_IDENT: u32 = 0x0352_5650;
/// Version word of a byte-swapped v3 file.
pub const PVRTEX3_IDENT_REV: u32 = 0x5056_5203;
/// FourCC of metadata blocks written by this crate.
pub const METADATA_IDENT: u32 = PVRTEX3_IDENT;
/// Bytes before the data of a metadata block.
pub const METADATA_HEADER_SIZE: u32 = 12;
/// Cubemap layout block key.
pub const METADATA_CUBE_KEY: u32 = 2;
/// CRC block key, `'C','R','C','_'`.
pub const METADATA_CRC_KEY: u32 = 0x5f43_5243;
/// Engine pixel format block key, `'F','M','T','_'`.
pub const METADATA_FORMAT_KEY: u32 = 0x5f54_4d46;

const CUBE_LAYOUT: &[u8; CUBE_FACE_COUNT] = b"XxYyZz";

/// Channel type: unsigned normalized byte.
pub const CHANNEL_UBYTE_NORM: u32 = 0;
/// Channel type: unsigned normalized short.
pub const CHANNEL_USHORT_NORM: u32 = 4;
/// Channel type: float.
pub const CHANNEL_FLOAT: u32 = 12;

// Compressed pixel format ids (upper 32 bits zero).
const PVRTC_2BPP_RGB: u64 = 0;
const PVRTC_2BPP_RGBA: u64 = 1;
const PVRTC_4BPP_RGB: u64 = 2;
const PVRTC_4BPP_RGBA: u64 = 3;
const PVRTC2_2BPP: u64 = 4;
const PVRTC2_4BPP: u64 = 5;
const ETC1: u64 = 6;
const DXT1: u64 = 7;
const DXT3: u64 = 9;
const DXT5: u64 = 11;
const ETC2_RGB: u64 = 22;
const ETC2_RGBA: u64 = 23;
const ETC2_RGB_A1: u64 = 24;
const EAC_R11: u64 = 25;
const EAC_RG11: u64 = 26;

/// Builds an uncompressed pixel id from channel names and bit widths.
pub const fn pixel_id(channels: [u8; 4], bits: [u8; 4]) -> u64 {
    (channels[0] as u64)
        | (channels[1] as u64) << 8
        | (channels[2] as u64) << 16
        | (channels[3] as u64) << 24
        | (bits[0] as u64) << 32
        | (bits[1] as u64) << 40
        | (bits[2] as u64) << 48
        | (bits[3] as u64) << 56
}

const RGBA_8888: u64 = pixel_id(*b"rgba", [8, 8, 8, 8]);
const RGBA_5551: u64 = pixel_id(*b"rgba", [5, 5, 5, 1]);
const RGBA_4444: u64 = pixel_id(*b"rgba", [4, 4, 4, 4]);
const RGB_888: u64 = pixel_id([b'r', b'g', b'b', 0], [8, 8, 8, 0]);
const RGB_565: u64 = pixel_id([b'r', b'g', b'b', 0], [5, 6, 5, 0]);
const L_8: u64 = pixel_id([b'l', 0, 0, 0], [8, 0, 0, 0]);
const A_8: u64 = pixel_id([b'a', 0, 0, 0], [8, 0, 0, 0]);
const A_16: u64 = pixel_id([b'a', 0, 0, 0], [16, 0, 0, 0]);
const RGBA_16: u64 = pixel_id(*b"rgba", [16, 16, 16, 16]);
const RGBA_32: u64 = pixel_id(*b"rgba", [32, 32, 32, 32]);

/// Maps a header pixel id and channel type to an engine format.
pub fn pixel_format_from_pvr(pixel_format: u64, channel_type: u32) -> PixelFormat {
    match pixel_format {
        PVRTC_2BPP_RGB | PVRTC_2BPP_RGBA => PixelFormat::Pvr2,
        PVRTC_4BPP_RGB | PVRTC_4BPP_RGBA => PixelFormat::Pvr4,
        PVRTC2_2BPP => PixelFormat::Pvr2_2,
        PVRTC2_4BPP => PixelFormat::Pvr4_2,
        ETC1 => PixelFormat::Etc1,
        DXT1 => PixelFormat::Dxt1,
        DXT3 => PixelFormat::Dxt3,
        DXT5 => PixelFormat::Dxt5,
        ETC2_RGB => PixelFormat::Etc2Rgb,
        ETC2_RGBA => PixelFormat::Etc2Rgba,
        ETC2_RGB_A1 => PixelFormat::Etc2RgbA1,
        EAC_R11 => PixelFormat::EacR11Unsigned,
        EAC_RG11 => PixelFormat::EacRg11Unsigned,
        RGBA_8888 => PixelFormat::Rgba8888,
        RGBA_5551 => PixelFormat::Rgba5551,
        RGBA_4444 => PixelFormat::Rgba4444,
        RGB_888 => PixelFormat::Rgb888,
        RGB_565 => PixelFormat::Rgb565,
        L_8 | A_8 => PixelFormat::A8,
        A_16 => PixelFormat::A16,
        RGBA_16 if channel_type == CHANNEL_FLOAT => PixelFormat::Rgba16F,
        RGBA_16 => PixelFormat::Rgba16161616,
        RGBA_32 if channel_type == CHANNEL_FLOAT => PixelFormat::Rgba32F,
        RGBA_32 => PixelFormat::Rgba32323232,
        _ => PixelFormat::Invalid,
    }
}

/// Maps an engine format to its header pixel id and channel type.
pub fn pixel_format_to_pvr(format: PixelFormat) -> Option<(u64, u32)> {
    let id = match format {
        PixelFormat::Pvr2 => PVRTC_2BPP_RGBA,
        PixelFormat::Pvr4 => PVRTC_4BPP_RGBA,
        PixelFormat::Pvr2_2 => PVRTC2_2BPP,
        PixelFormat::Pvr4_2 => PVRTC2_4BPP,
        PixelFormat::Etc1 => ETC1,
        PixelFormat::Dxt1 | PixelFormat::Dxt1A => DXT1,
        PixelFormat::Dxt3 => DXT3,
        PixelFormat::Dxt5 => DXT5,
        PixelFormat::Etc2Rgb => ETC2_RGB,
        PixelFormat::Etc2Rgba => ETC2_RGBA,
        PixelFormat::Etc2RgbA1 => ETC2_RGB_A1,
        PixelFormat::EacR11Unsigned => EAC_R11,
        PixelFormat::EacRg11Unsigned => EAC_RG11,
        PixelFormat::Rgba8888 => RGBA_8888,
        PixelFormat::Rgba5551 => RGBA_5551,
        PixelFormat::Rgba4444 => RGBA_4444,
        PixelFormat::Rgb888 => RGB_888,
        PixelFormat::Rgb565 => RGB_565,
        PixelFormat::A8 => A_8,
        PixelFormat::A16 => A_16,
        PixelFormat::Rgba16161616 | PixelFormat::Rgba16F => RGBA_16,
        PixelFormat::Rgba32323232 | PixelFormat::Rgba32F => RGBA_32,
        _ => return None,
    };
    let channel = match format {
        PixelFormat::Rgba5551 | PixelFormat::Rgba4444 | PixelFormat::Rgb565 | PixelFormat::A16 => {
            CHANNEL_USHORT_NORM
        }
        PixelFormat::Rgba16F | PixelFormat::Rgba32F => CHANNEL_FLOAT,
        _ => CHANNEL_UBYTE_NORM,
    };
    Some((id, channel))
}

const SUPPORTED_FORMATS: &[PixelFormat] = &[
    PixelFormat::Pvr2,
    PixelFormat::Pvr4,
    PixelFormat::Pvr2_2,
    PixelFormat::Pvr4_2,
    PixelFormat::Etc1,
    PixelFormat::Etc2Rgb,
    PixelFormat::Etc2Rgba,
    PixelFormat::Etc2RgbA1,
    PixelFormat::EacR11Unsigned,
    PixelFormat::EacRg11Unsigned,
    PixelFormat::Dxt1,
    PixelFormat::Dxt1A,
    PixelFormat::Dxt3,
    PixelFormat::Dxt5,
    PixelFormat::Rgba8888,
    PixelFormat::Rgba5551,
    PixelFormat::Rgba4444,
    PixelFormat::Rgb888,
    PixelFormat::Rgb565,
    PixelFormat::A8,
    PixelFormat::A16,
    PixelFormat::Rgba16161616,
    PixelFormat::Rgba32323232,
    PixelFormat::Rgba16F,
    PixelFormat::Rgba32F,
];

// ============================================================================
// Header model
// ============================================================================

/// The fixed 52-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PvrHeader {
    pub version: u32,
    pub flags: u32,
    pub pixel_format: u64,
    pub colour_space: u32,
    pub channel_type: u32,
    pub height: u32,
    pub width: u32,
    pub depth: u32,
    pub num_surfaces: u32,
    pub num_faces: u32,
    pub mip_count: u32,
    pub metadata_size: u32,
}

impl Default for PvrHeader {
    fn default() -> Self {
        Self {
            version: PVRTEX3_IDENT,
            flags: 0,
            pixel_format: 0,
            colour_space: 0,
            channel_type: 0,
            height: 1,
            width: 1,
            depth: 1,
            num_surfaces: 1,
            num_faces: 1,
            mip_count: 1,
            metadata_size: 0,
        }
    }
}

impl PvrHeader {
    /// Reads and validates the version word.
    ///
    /// Byte-swapped files are recognized but refused.
    pub fn read<R: Read + ?Sized>(src: &mut R) -> IoResult<Self> {
        let mut raw = [0u8; HEADER_SIZE];
        src.read_exact(&mut raw)
            .map_err(|_| IoError::ReadFailed("PVR header is truncated".into()))?;
        let mut r = &raw[..];
        let version = r.read_u32::<LittleEndian>()?;
        if version == PVRTEX3_IDENT_REV {
            return Err(IoError::FormatUnsupported("byte-swapped PVR files are not supported".into()));
        }
        if version != PVRTEX3_IDENT {
            return Err(IoError::FormatUnrecognized(format!("PVR version {version:#010x}")));
        }
        Ok(Self {
            version,
            flags: r.read_u32::<LittleEndian>()?,
            pixel_format: r.read_u64::<LittleEndian>()?,
            colour_space: r.read_u32::<LittleEndian>()?,
            channel_type: r.read_u32::<LittleEndian>()?,
            height: r.read_u32::<LittleEndian>()?,
            width: r.read_u32::<LittleEndian>()?,
            depth: r.read_u32::<LittleEndian>()?,
            num_surfaces: r.read_u32::<LittleEndian>()?,
            num_faces: r.read_u32::<LittleEndian>()?,
            mip_count: r.read_u32::<LittleEndian>()?,
            metadata_size: r.read_u32::<LittleEndian>()?,
        })
    }

    /// Writes the header.
    pub fn write<W: Write>(&self, dst: &mut W) -> std::io::Result<()> {
        dst.write_u32::<LittleEndian>(self.version)?;
        dst.write_u32::<LittleEndian>(self.flags)?;
        dst.write_u64::<LittleEndian>(self.pixel_format)?;
        dst.write_u32::<LittleEndian>(self.colour_space)?;
        dst.write_u32::<LittleEndian>(self.channel_type)?;
        dst.write_u32::<LittleEndian>(self.height)?;
        dst.write_u32::<LittleEndian>(self.width)?;
        dst.write_u32::<LittleEndian>(self.depth)?;
        dst.write_u32::<LittleEndian>(self.num_surfaces)?;
        dst.write_u32::<LittleEndian>(self.num_faces)?;
        dst.write_u32::<LittleEndian>(self.mip_count)?;
        dst.write_u32::<LittleEndian>(self.metadata_size)
    }

    /// Engine format derived from the pixel id.
    pub fn pixel_format(&self) -> PixelFormat {
        pixel_format_from_pvr(self.pixel_format, self.channel_type)
    }
}

/// One metadata block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaDataBlock {
    pub fourcc: u32,
    pub key: u32,
    pub data: Vec<u8>,
}

impl MetaDataBlock {
    /// Block with this crate's FourCC.
    pub fn new(key: u32, data: Vec<u8>) -> Self {
        Self {
            fourcc: METADATA_IDENT,
            key,
            data,
        }
    }

    /// Size on disk including the 12-byte block header.
    pub fn size(&self) -> u32 {
        METADATA_HEADER_SIZE + self.data.len() as u32
    }

    fn as_u32(&self) -> Option<u32> {
        let bytes: [u8; 4] = self.data.get(..4)?.try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }
}

/// Header, metadata and (optionally) raw payload of a PVR file.
///
/// Used directly for CRC tagging: read with data, add a block, rewrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PvrFile {
    pub header: PvrHeader,
    pub metadata: Vec<MetaDataBlock>,
    /// Payload as stored on disk, empty unless read with data.
    pub data: Vec<u8>,
}

impl PvrFile {
    /// Reads the header, then metadata and payload on request.
    ///
    /// Unread metadata is skipped so the source ends up at the payload.
    pub fn read<R: Read + Seek + ?Sized>(src: &mut R, read_metadata: bool, read_data: bool) -> IoResult<Self> {
        let header = PvrHeader::read(src)?;
        let mut file = PvrFile {
            header,
            metadata: Vec::new(),
            data: Vec::new(),
        };

        if u64::from(header.metadata_size) > remaining_len(src)? {
            return Err(IoError::ReadFailed(format!(
                "PVR metadata area of {} bytes exceeds the file",
                header.metadata_size
            )));
        }
        if read_metadata && header.metadata_size != 0 {
            file.metadata = read_metadata_blocks(src, header.metadata_size)?;
        } else if header.metadata_size != 0 {
            src.seek(SeekFrom::Current(i64::from(header.metadata_size)))?;
        }

        if read_data {
            src.read_to_end(&mut file.data)?;
        }
        Ok(file)
    }

    /// Serializes header, metadata and payload.
    pub fn write<W: Write>(&self, dst: &mut W) -> IoResult<()> {
        self.header.write(dst).map_err(IoError::write_failed)?;
        for block in &self.metadata {
            dst.write_u32::<LittleEndian>(block.fourcc)
                .and_then(|_| dst.write_u32::<LittleEndian>(block.key))
                .and_then(|_| dst.write_u32::<LittleEndian>(block.data.len() as u32))
                .and_then(|_| dst.write_all(&block.data))
                .map_err(IoError::write_failed)?;
        }
        dst.write_all(&self.data).map_err(IoError::write_failed)
    }

    /// Serializes into a new buffer.
    pub fn to_bytes(&self) -> IoResult<Vec<u8>> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.header.metadata_size as usize + self.data.len());
        self.write(&mut out)?;
        Ok(out)
    }

    /// Appends a block and grows the header's metadata size.
    pub fn add_metadata(&mut self, block: MetaDataBlock) {
        self.header.metadata_size += block.size();
        self.metadata.push(block);
    }

    /// First block with `key`.
    pub fn find_metadata(&self, key: u32) -> Option<&MetaDataBlock> {
        self.metadata.iter().find(|b| b.key == key)
    }

    /// Stored CRC, if the file was tagged.
    pub fn crc(&self) -> Option<u32> {
        self.find_metadata(METADATA_CRC_KEY).and_then(MetaDataBlock::as_u32)
    }

    /// Appends a CRC block. Does not check for an existing one.
    pub fn add_crc(&mut self, crc: u32) {
        self.add_metadata(MetaDataBlock::new(METADATA_CRC_KEY, crc.to_le_bytes().to_vec()));
    }

    /// Engine format, refined by the `FMT_` block for DXT1/DXT1A.
    pub fn pixel_format(&self) -> PixelFormat {
        let format = self.header.pixel_format();
        if format != PixelFormat::Dxt1 {
            return format;
        }
        let stored = self
            .find_metadata(METADATA_FORMAT_KEY)
            .and_then(MetaDataBlock::as_u32)
            .and_then(PixelFormat::from_u32);
        match stored {
            Some(f @ (PixelFormat::Dxt1 | PixelFormat::Dxt1A)) => f,
            _ => format,
        }
    }

    /// Face for each on-disk face index, or `None` for plain 2D files.
    pub fn cubemap_layout(&self) -> Option<Vec<CubeFace>> {
        let block = self.metadata.iter().find(|b| {
            b.fourcc == METADATA_IDENT && b.key == METADATA_CUBE_KEY && b.data.len() == CUBE_FACE_COUNT
        });
        if let Some(block) = block {
            return Some(
                block
                    .data
                    .iter()
                    .map(|c| match c {
                        b'x' => CubeFace::NegativeX,
                        b'Y' => CubeFace::PositiveY,
                        b'y' => CubeFace::NegativeY,
                        b'Z' => CubeFace::PositiveZ,
                        b'z' => CubeFace::NegativeZ,
                        _ => CubeFace::PositiveX,
                    })
                    .collect(),
            );
        }
        if self.header.num_faces > 1 {
            return Some(CubeFace::ALL.iter().copied().take(self.header.num_faces as usize).collect());
        }
        None
    }

    /// Header for a plain mip chain.
    fn for_chain(images: &[Image]) -> IoResult<Self> {
        let format = validate_chain(images)?;
        let mut file = Self::with_format(format, &images[0])?;
        file.header.mip_count = images.len() as u32;
        file.add_engine_format(format);
        Ok(file)
    }

    /// Header for a cubemap: one chain per face plus the layout block.
    fn for_cube(faces: &[Vec<Image>]) -> IoResult<Self> {
        let format = validate_cube_faces(faces)?;
        let mut file = Self::with_format(format, &faces[0][0])?;
        file.header.num_faces = faces.len() as u32;
        file.header.mip_count = faces[0].len() as u32;
        file.add_metadata(MetaDataBlock::new(METADATA_CUBE_KEY, CUBE_LAYOUT.to_vec()));
        file.add_engine_format(format);
        Ok(file)
    }

    fn with_format(format: PixelFormat, mip0: &Image) -> IoResult<Self> {
        let (pixel_format, channel_type) = pixel_format_to_pvr(format)
            .ok_or_else(|| IoError::FormatUnsupported(format!("{format} cannot be written to PVR")))?;
        Ok(Self {
            header: PvrHeader {
                pixel_format,
                channel_type,
                width: mip0.width,
                height: mip0.height,
                ..PvrHeader::default()
            },
            metadata: Vec::new(),
            data: Vec::new(),
        })
    }

    fn add_engine_format(&mut self, format: PixelFormat) {
        if matches!(format, PixelFormat::Dxt1 | PixelFormat::Dxt1A) {
            self.add_metadata(MetaDataBlock::new(
                METADATA_FORMAT_KEY,
                format.as_u32().to_le_bytes().to_vec(),
            ));
        }
    }
}

fn read_metadata_blocks<R: Read + ?Sized>(src: &mut R, metadata_size: u32) -> IoResult<Vec<MetaDataBlock>> {
    let mut remaining = metadata_size;
    let mut blocks = Vec::new();
    while remaining != 0 {
        if remaining < METADATA_HEADER_SIZE {
            return Err(IoError::ReadFailed("PVR metadata block is truncated".into()));
        }
        let fourcc = src.read_u32::<LittleEndian>()?;
        let key = src.read_u32::<LittleEndian>()?;
        let data_size = src.read_u32::<LittleEndian>()?;
        if data_size > remaining - METADATA_HEADER_SIZE {
            return Err(IoError::ReadFailed(format!(
                "PVR metadata block of {data_size} bytes exceeds the metadata area"
            )));
        }
        let mut data = vec![0u8; data_size as usize];
        src.read_exact(&mut data)?;
        remaining -= data_size + METADATA_HEADER_SIZE;
        blocks.push(MetaDataBlock { fourcc, key, data });
    }
    Ok(blocks)
}

/// Rewrites disk-order packed pixels into memory order.
fn disk_to_memory(format: PixelFormat, data: &mut [u8]) {
    match format {
        PixelFormat::Rgba4444 => map_u16_in_place(data, reverse_nibbles),
        PixelFormat::Rgba5551 => map_u16_in_place(data, pvr5551_to_rgba5551),
        _ => {}
    }
}

/// Appends `image` to `out` in disk order.
fn append_payload(out: &mut Vec<u8>, image: &Image) {
    let start = out.len();
    out.extend_from_slice(image.data());
    let data = &mut out[start..];
    match image.format {
        PixelFormat::Rgba4444 => map_u16_in_place(data, reverse_nibbles),
        PixelFormat::Rgba5551 => map_u16_in_place(data, rgba5551_to_pvr5551),
        _ => {}
    }
}

// ============================================================================
// Codec
// ============================================================================

/// PVR v3 codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct PvrCodec;

impl PvrCodec {
    /// Creates the codec.
    pub fn new() -> Self {
        Self
    }

    /// Reads header and metadata without payload.
    pub fn read_file(&self, src: &mut dyn ImageSource) -> IoResult<PvrFile> {
        src.rewind_to_start()?;
        let file = PvrFile::read(src, true, false);
        rewind_on_error(src, file)
    }

    fn decode_images(&self, src: &mut dyn ImageSource, params: &LoadingParams) -> IoResult<Vec<Image>> {
        let file = self.read_file(src)?;
        let header = file.header;
        let format = file.pixel_format();

        if format == PixelFormat::Invalid {
            error!(pixel_format = header.pixel_format, "unsupported PVR pixel format");
            return Err(IoError::FormatUnsupported(format!(
                "PVR pixel format {:#x}",
                header.pixel_format
            )));
        }
        if header.num_surfaces != 1 {
            error!(surfaces = header.num_surfaces, "PVR surface count must be 1");
            return Err(IoError::FormatUnsupported(format!(
                "PVR with {} surfaces",
                header.num_surfaces
            )));
        }
        if header.width != header.height && matches!(format, PixelFormat::Pvr2 | PixelFormat::Pvr4) {
            error!(width = header.width, height = header.height, %format, "non-square PVRTC texture");
            return Err(IoError::dimension_invalid(
                header.width,
                header.height,
                format!("{format} must be square"),
            ));
        }
        validate_header_dimensions(header.width, header.height, header.mip_count).inspect_err(|e| {
            error!(error = %e, "invalid PVR dimensions");
        })?;

        if header.num_faces == 0 {
            return Err(IoError::FormatUnsupported("PVR with no faces".into()));
        }

        let payload = (0..header.mip_count)
            .map(|mip| {
                let size = size_in_bytes(mip_dimension(header.width, mip), mip_dimension(header.height, mip), format);
                (size as u64).saturating_mul(u64::from(header.num_faces))
            })
            .fold(0u64, u64::saturating_add);
        if payload > remaining_len(src)? {
            return Err(IoError::ReadFailed(format!("PVR mip data is truncated, expected {payload} bytes")));
        }

        let from_mip = base_mipmap_for_chain(header.width, header.height, header.mip_count, params);
        let layout = file.cubemap_layout();
        debug!(%format, mips = header.mip_count, faces = header.num_faces, from_mip, "decoding PVR");

        let mut images = Vec::new();
        for mip in 0..header.mip_count {
            let w = mip_dimension(header.width, mip);
            let h = mip_dimension(header.height, mip);
            let mip_size = size_in_bytes(w, h, format);
            for face in 0..header.num_faces {
                if mip < from_mip {
                    trace!(mip, face, "skipping PVR mip");
                    src.seek(SeekFrom::Current(mip_size as i64))?;
                    continue;
                }
                let mut data = vec![0u8; mip_size];
                read_exact_or_fail(src, &mut data, "PVR mip data")?;
                disk_to_memory(format, &mut data);

                let cube_face = layout.as_ref().and_then(|l| l.get(face as usize).copied());
                let image = Image::from_vec(w, h, format, data)?
                    .with_mipmap_level(mip - from_mip + params.first_mipmap_index)
                    .with_cube_face(cube_face);
                images.push(image);
            }
        }
        Ok(images)
    }
}

impl ImageCodec for PvrCodec {
    fn format(&self) -> ImageFormat {
        ImageFormat::Pvr
    }

    fn supported_formats(&self) -> &'static [PixelFormat] {
        SUPPORTED_FORMATS
    }

    fn get_info(&self, src: &mut dyn ImageSource) -> IoResult<ImageInfo> {
        let file = self.read_file(src)?;
        let total = src.size()?;
        src.rewind_to_start()?;
        let header = &file.header;
        Ok(ImageInfo {
            width: header.width,
            height: header.height,
            format: file.pixel_format(),
            data_size: total.saturating_sub(HEADER_SIZE as u64 + u64::from(header.metadata_size)),
            mipmaps_count: header.mip_count,
            face_count: header.num_faces,
        })
    }

    fn decode(&self, src: &mut dyn ImageSource, params: &LoadingParams) -> IoResult<Vec<Image>> {
        let decoded = self.decode_images(src, params);
        rewind_on_error(src, decoded)
    }

    fn encode_to_vec(&self, images: &[Image], _quality: ImageQuality) -> IoResult<Vec<u8>> {
        let mut file = PvrFile::for_chain(images)?;
        ensure_writable(self, images[0].format)?;
        for image in images {
            append_payload(&mut file.data, image);
        }
        file.to_bytes()
    }

    fn encode_cubemap_to_vec(&self, faces: &[Vec<Image>], _quality: ImageQuality) -> IoResult<Vec<u8>> {
        let mut file = PvrFile::for_cube(faces)?;
        ensure_writable(self, faces[0][0].format)?;
        for mip in 0..faces[0].len() {
            for face in faces {
                append_payload(&mut file.data, &face[mip]);
            }
        }
        file.to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn patterned(w: u32, h: u32, format: PixelFormat, seed: u8) -> Image {
        let size = size_in_bytes(w, h, format);
        let data: Vec<u8> = (0..size).map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed)).collect();
        Image::from_vec(w, h, format, data).unwrap()
    }

    fn chain(format: PixelFormat, size: u32) -> Vec<Image> {
        let mut images = Vec::new();
        let mut level = 0;
        let mut s = size;
        loop {
            images.push(patterned(s, s, format, level as u8).with_mipmap_level(level));
            if s == 1 {
                break;
            }
            s /= 2;
            level += 1;
        }
        images
    }

    #[test]
    fn pixel_ids() {
        assert_eq!(RGBA_8888 & 0xffff_ffff, u64::from(u32::from_le_bytes(*b"rgba")));
        assert_eq!(RGBA_8888 >> 32, 0x0808_0808);
        assert_eq!(pixel_format_from_pvr(RGBA_16, CHANNEL_FLOAT), PixelFormat::Rgba16F);
        assert_eq!(pixel_format_from_pvr(RGBA_16, CHANNEL_UBYTE_NORM), PixelFormat::Rgba16161616);
        assert_eq!(pixel_format_from_pvr(L_8, 0), PixelFormat::A8);
        assert_eq!(pixel_format_from_pvr(8, 0), PixelFormat::Invalid);
        assert_eq!(pixel_format_to_pvr(PixelFormat::Rgb565), Some((RGB_565, CHANNEL_USHORT_NORM)));
        assert_eq!(pixel_format_to_pvr(PixelFormat::Rgba32F), Some((RGBA_32, CHANNEL_FLOAT)));
        assert_eq!(pixel_format_to_pvr(PixelFormat::AtcRgb), None);
    }

    #[test]
    fn header_layout() {
        let file = PvrFile::for_chain(&chain(PixelFormat::Rgba8888, 4)).unwrap();
        let mut bytes = Vec::new();
        file.header.write(&mut bytes).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[0..4], &[b'P', b'V', b'R', 3]);
        // width at offset 28, mip count at 44
        assert_eq!(u32::from_le_bytes(bytes[28..32].try_into().unwrap()), 4);
        assert_eq!(u32::from_le_bytes(bytes[44..48].try_into().unwrap()), 3);
    }

    #[test]
    fn chain_round_trip() {
        let codec = PvrCodec::new();
        for format in [
            PixelFormat::Rgba8888,
            PixelFormat::Rgba4444,
            PixelFormat::Rgba5551,
            PixelFormat::Rgb565,
            PixelFormat::Rgb888,
            PixelFormat::A8,
            PixelFormat::Rgba16F,
            PixelFormat::Rgba32F,
            PixelFormat::Etc1,
            PixelFormat::Pvr4,
        ] {
            let images = chain(format, 8);
            let bytes = codec.encode_to_vec(&images, ImageQuality::default()).unwrap();
            let decoded = codec.decode(&mut Cursor::new(bytes), &LoadingParams::default()).unwrap();
            assert_eq!(decoded, images, "{format}");
        }
    }

    #[test]
    fn packed_formats_are_stored_in_disk_order() {
        let image = Image::from_vec(1, 1, PixelFormat::Rgba4444, vec![0x34, 0x12]).unwrap();
        let bytes = PvrCodec.encode_to_vec(&[image], ImageQuality::default()).unwrap();
        assert_eq!(&bytes[HEADER_SIZE..], &[0x21, 0x43]);

        // 565 keeps its memory layout
        let image = Image::from_vec(1, 1, PixelFormat::Rgb565, vec![0x1f, 0x00]).unwrap();
        let bytes = PvrCodec.encode_to_vec(&[image], ImageQuality::default()).unwrap();
        assert_eq!(&bytes[HEADER_SIZE..], &[0x1f, 0x00]);
        let decoded = PvrCodec.decode(&mut Cursor::new(bytes), &LoadingParams::default()).unwrap();
        assert_eq!(decoded[0].data, vec![0x1f, 0x00]);
    }

    #[test]
    fn base_mip_skips_leading_levels() {
        let images = chain(PixelFormat::Rgba8888, 32);
        let bytes = PvrCodec.encode_to_vec(&images, ImageQuality::default()).unwrap();
        let params = LoadingParams::new().with_minimal_size(8, 8);
        let decoded = PvrCodec.decode(&mut Cursor::new(bytes), &params).unwrap();
        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded[0].width, 8);
        assert_eq!(decoded[0].data, images[2].data);
        assert_eq!(decoded[0].mipmap_level, 0);
        assert_eq!(decoded[3].mipmap_level, 3);
    }

    #[test]
    fn dxt1a_survives_through_format_block() {
        let image = patterned(4, 4, PixelFormat::Dxt1A, 1);
        let bytes = PvrCodec.encode_to_vec(&[image], ImageQuality::default()).unwrap();
        let decoded = PvrCodec.decode(&mut Cursor::new(bytes.clone()), &LoadingParams::default()).unwrap();
        assert_eq!(decoded[0].format, PixelFormat::Dxt1A);

        // strip the block: same payload reads back as DXT1
        let mut file = PvrFile::read(&mut Cursor::new(bytes), true, true).unwrap();
        file.metadata.clear();
        file.header.metadata_size = 0;
        let stripped = file.to_bytes().unwrap();
        let decoded = PvrCodec.decode(&mut Cursor::new(stripped), &LoadingParams::default()).unwrap();
        assert_eq!(decoded[0].format, PixelFormat::Dxt1);
    }

    #[test]
    fn cubemap_round_trip() {
        let faces: Vec<Vec<Image>> = CubeFace::ALL
            .iter()
            .map(|&f| {
                chain(PixelFormat::Rgb888, 4)
                    .into_iter()
                    .map(|i| i.with_cube_face(Some(f)))
                    .collect()
            })
            .collect();
        let bytes = PvrCodec.encode_cubemap_to_vec(&faces, ImageQuality::default()).unwrap();
        let info = PvrCodec.get_info(&mut Cursor::new(bytes.clone())).unwrap();
        assert_eq!(info.face_count, 6);
        assert_eq!(info.mipmaps_count, 3);

        let decoded = PvrCodec.decode(&mut Cursor::new(bytes), &LoadingParams::default()).unwrap();
        assert_eq!(decoded.len(), 18);
        // mip-major on disk
        assert_eq!(decoded[1].cube_face, Some(CubeFace::NegativeX));
        assert_eq!(decoded[6].mipmap_level, 1);
        assert_eq!(decoded[6].cube_face, Some(CubeFace::PositiveX));
    }

    #[test]
    fn crc_block() {
        let bytes = PvrCodec.encode_to_vec(&chain(PixelFormat::A8, 2), ImageQuality::default()).unwrap();
        let mut file = PvrFile::read(&mut Cursor::new(bytes), true, true).unwrap();
        assert_eq!(file.crc(), None);
        file.add_crc(0xdead_beef);
        assert_eq!(file.header.metadata_size, 16);
        let tagged = file.to_bytes().unwrap();
        let reread = PvrFile::read(&mut Cursor::new(tagged), true, true).unwrap();
        assert_eq!(reread.crc(), Some(0xdead_beef));
        assert_eq!(reread.data, file.data);
    }

    #[test]
    fn rejects_swapped_and_foreign() {
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&PVRTEX3_IDENT_REV.to_le_bytes());
        let err = PvrCodec.decode(&mut Cursor::new(bytes), &LoadingParams::default()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::FormatUnsupported);

        let err = PvrCodec
            .decode(&mut Cursor::new(b"DDS nothing".to_vec()), &LoadingParams::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ReadFailed);
    }

    fn header_only(header: PvrHeader, payload: usize) -> Vec<u8> {
        let file = PvrFile {
            header,
            metadata: Vec::new(),
            data: vec![0; payload],
        };
        file.to_bytes().unwrap()
    }

    fn rgba_header(width: u32, height: u32, mip_count: u32) -> PvrHeader {
        PvrHeader {
            pixel_format: RGBA_8888,
            width,
            height,
            mip_count,
            ..PvrHeader::default()
        }
    }

    #[test]
    fn hostile_headers_are_errors() {
        let cases = [
            (rgba_header(0x1000_0000, 0x1000_0000, 1), crate::ErrorKind::DimensionInvalid),
            (rgba_header(1, 1, 40), crate::ErrorKind::DimensionInvalid),
            (rgba_header(0, 4, 1), crate::ErrorKind::DimensionInvalid),
            (rgba_header(4, 4, 0), crate::ErrorKind::DimensionInvalid),
            // claims far more data than the file holds
            (rgba_header(0xffff, 0xffff, 1), crate::ErrorKind::ReadFailed),
            (
                PvrHeader {
                    num_faces: u32::MAX,
                    ..rgba_header(4, 4, 1)
                },
                crate::ErrorKind::ReadFailed,
            ),
            (
                PvrHeader {
                    metadata_size: u32::MAX,
                    ..rgba_header(4, 4, 1)
                },
                crate::ErrorKind::ReadFailed,
            ),
        ];
        for (header, kind) in cases {
            let err = PvrCodec
                .decode(&mut Cursor::new(header_only(header, 64)), &LoadingParams::default())
                .unwrap_err();
            assert_eq!(err.kind(), kind, "{header:?}");
        }
    }

    #[test]
    fn failed_decode_rewinds() {
        let truncated = header_only(rgba_header(4, 4, 1), 10);
        let two_surfaces = header_only(
            PvrHeader {
                num_surfaces: 2,
                ..rgba_header(4, 4, 1)
            },
            128,
        );
        let unknown = header_only(
            PvrHeader {
                pixel_format: 8,
                ..rgba_header(4, 4, 1)
            },
            64,
        );
        for bytes in [truncated, two_surfaces, unknown, header_only(rgba_header(1, 1, 40), 4)] {
            let mut src = Cursor::new(bytes);
            assert!(PvrCodec.decode(&mut src, &LoadingParams::default()).is_err());
            assert_eq!(src.stream_position().unwrap(), 0);
        }
    }

    #[test]
    fn non_square_pvrtc_rejected() {
        let mut file = PvrFile::for_chain(&[patterned(16, 16, PixelFormat::Pvr4, 0)]).unwrap();
        file.header.height = 8;
        file.data = vec![0; size_in_bytes(16, 8, PixelFormat::Pvr4)];
        let bytes = file.to_bytes().unwrap();
        let err = PvrCodec.decode(&mut Cursor::new(bytes), &LoadingParams::default()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::DimensionInvalid);
    }
}
