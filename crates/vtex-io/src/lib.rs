//! # vtex-io
//!
//! Texture containers for vtex.
//!
//! This crate reads and writes the containers a texture pipeline deals with
//! and hands the pixels over as [`vtex_core::Image`] mip/face planes:
//!
//! - **PVR** - PowerVR v3 with metadata blocks, mip chains and cubemaps
//! - **DDS** - DirectDraw Surface, classic and DX10 headers
//! - **TGA** - Truevision Targa, raw and RLE
//! - **PNG** - RGBA and 8/16-bit grayscale
//! - **JPEG** - Lossy RGB and grayscale
//! - **WebP** - Lossless RGB/RGBA
//! - **PSD** - Photoshop composite, read-only
//! - **HDR** - Radiance RGBE
//!
//! # Architecture
//!
//! - [`ImageCodec`] - trait every container implements
//! - [`CodecRegistry`] - built-in codecs in sniffing priority order
//! - [`ImageSystem`] - load/save facade: extension lookup first, content
//!   sniffing second, pixel conversion before encode
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use vtex_io::{ImageSystem, ImageQuality, LoadingParams};
//! use vtex_core::PixelFormat;
//!
//! let system = ImageSystem::new();
//! let images = system.load_path("in.pvr".as_ref(), &LoadingParams::default())?;
//! system.save("out.dds".as_ref(), &images, PixelFormat::Invalid, ImageQuality::default())?;
//! system.add_crc_into_metadata("out.dds".as_ref())?;
//! ```
//!
//! # Supported Formats
//!
//! | Format | Read | Write | Mips | Cubemaps |
//! |--------|------|-------|------|----------|
//! | PVR | Yes | Yes | Yes | Yes |
//! | DDS | Yes | Yes | Yes | Yes |
//! | TGA | Yes | Yes | No | No |
//! | PNG | Yes | Yes | No | No |
//! | JPEG | Yes | Yes | No | No |
//! | WebP | Yes | Yes | No | No |
//! | PSD | Yes | No | No | No |
//! | HDR | Yes | Yes | No | No |
//!
//! # Feature Flags
//!
//! - `png` - PNG support (default)
//! - `jpeg` - JPEG support (default)
//! - `webp` - WebP support (default)
//! - `hdr` - Radiance HDR support (default)
//! - `psd` - Photoshop support (default)
//!
//! PVR, DDS and TGA are always built.

#![warn(rustdoc::missing_crate_level_docs)]

pub mod codec;
pub mod crc;
pub mod dds;
pub mod detect;
pub mod error;
pub mod file;
pub mod info;
pub mod pvr;
pub mod registry;
pub mod system;
pub mod tga;

mod layout;

#[cfg(feature = "hdr")]
pub mod hdr;

#[cfg(feature = "jpeg")]
pub mod jpeg;

#[cfg(feature = "png")]
pub mod png;

#[cfg(feature = "psd")]
pub mod psd;

#[cfg(feature = "webp")]
pub mod webp;

pub use codec::ImageCodec;
pub use crc::{crc32_for_buffer, crc32_for_file};
pub use detect::ImageFormat;
pub use error::{ErrorKind, IoError, IoResult};
pub use file::ImageSource;
pub use info::{ImageInfo, ImageQuality, LoadingParams, base_mipmap};
pub use registry::CodecRegistry;
pub use system::ImageSystem;
