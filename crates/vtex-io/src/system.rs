//! Entry point for loading, saving and inspecting texture files.
//!
//! [`ImageSystem`] picks a codec by file extension first and falls back to
//! content sniffing in registry order. Saving converts the in-memory images
//! into the requested pixel format before the codec sees them; codecs never
//! convert on their own.
//!
//! # Example
//!
//! ```rust,ignore
//! use vtex_io::{ImageSystem, LoadingParams, ImageQuality};
//! use vtex_core::PixelFormat;
//!
//! let system = ImageSystem::new();
//! let mips = system.load_path("brick.tga".as_ref(), &LoadingParams::default())?;
//! let chain = mips[0].create_mipmaps(false)?;
//! system.save("brick.dds".as_ref(), &chain, PixelFormat::Rgba8888, ImageQuality::default())?;
//! ```

use std::fs::OpenOptions;
use std::path::Path;

use tracing::{debug, error, warn};
use vtex_core::convert::{can_convert, convert_image};
use vtex_core::{CUBE_FACE_COUNT, CubeFace, Image, PixelFormat};

use crate::codec::ImageCodec;
use crate::crc::crc32_for_file;
use crate::dds::{DdsFile, write_crc_in_place};
use crate::detect::ImageFormat;
use crate::error::{IoError, IoResult};
use crate::file::{ImageSource, open};
use crate::info::{ImageInfo, ImageQuality, LoadingParams, base_mipmap};
use crate::pvr::PvrFile;
use crate::registry::CodecRegistry;

/// Facade over the codec registry.
#[derive(Clone, Copy)]
pub struct ImageSystem {
    registry: &'static CodecRegistry,
}

impl std::fmt::Debug for ImageSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.registry.codecs().map(|c| c.name()).collect();
        f.debug_struct("ImageSystem").field("codecs", &names).finish()
    }
}

impl Default for ImageSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageSystem {
    /// Facade over the global registry.
    pub fn new() -> Self {
        Self {
            registry: CodecRegistry::global(),
        }
    }

    /// Facade over a caller-provided registry.
    pub fn with_registry(registry: &'static CodecRegistry) -> Self {
        Self { registry }
    }

    /// Underlying registry.
    pub fn registry(&self) -> &'static CodecRegistry {
        self.registry
    }

    /// Codec for a container, if it was built in.
    pub fn codec_for(&self, format: ImageFormat) -> Option<&'static dyn ImageCodec> {
        self.registry.get(format)
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Loads every mip/face image of `path`.
    pub fn load_path(&self, path: &Path, params: &LoadingParams) -> IoResult<Vec<Image>> {
        let mut file = open(path)?;
        let codec = self.resolve(Some(path), &mut file).inspect_err(|e| {
            error!(path = %path.display(), error = %e, "no codec for file");
        })?;
        codec.decode(&mut file, params).inspect_err(|e| {
            error!(path = %path.display(), codec = codec.name(), error = %e, "failed to load");
        })
    }

    /// Loads from an already opened source, sniffing its content.
    pub fn load_from(&self, src: &mut dyn ImageSource, params: &LoadingParams) -> IoResult<Vec<Image>> {
        let codec = self.resolve(None, src)?;
        codec.decode(src, params)
    }

    /// Header-only description of `path`.
    pub fn get_image_info(&self, path: &Path) -> IoResult<ImageInfo> {
        let mut file = open(path)?;
        let codec = self.resolve(Some(path), &mut file)?;
        codec.get_info(&mut file).inspect_err(|e| {
            error!(path = %path.display(), codec = codec.name(), error = %e, "failed to read header");
        })
    }

    /// Header-only description of an opened source.
    pub fn get_image_info_from(&self, src: &mut dyn ImageSource) -> IoResult<ImageInfo> {
        let codec = self.resolve(None, src)?;
        codec.get_info(src)
    }

    /// Extension lookup, then a content check, then sniffing every codec.
    fn resolve(&self, path: Option<&Path>, src: &mut dyn ImageSource) -> IoResult<&'static dyn ImageCodec> {
        let by_ext = path
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
            .and_then(|ext| self.registry.get_by_extension(ext));

        if let Some(codec) = by_ext {
            if codec.can_process(src) {
                return Ok(codec);
            }
            debug!(codec = codec.name(), "extension does not match content, sniffing");
        }

        self.registry
            .detect(src)
            .ok_or_else(|| IoError::FormatUnrecognized("no codec recognizes the data".into()))
    }

    // ------------------------------------------------------------------------
    // Saving
    // ------------------------------------------------------------------------

    /// Writes a mip chain to `path`, picking the codec by extension.
    ///
    /// `format` is the pixel format stored in the file. Pass
    /// [`PixelFormat::Invalid`] to keep the images' own format, or the
    /// codec's first convertible format when the codec cannot store it.
    pub fn save(&self, path: &Path, images: &[Image], format: PixelFormat, quality: ImageQuality) -> IoResult<()> {
        let codec = self.codec_for_path(path)?;
        let first = images
            .first()
            .ok_or_else(|| IoError::write_failed("no images to write"))?;
        let target = self.target_format(codec, first.format, format)?;
        let converted = convert_all(images, target)?;
        codec.encode(path, &converted, quality).inspect_err(|e| {
            error!(path = %path.display(), codec = codec.name(), error = %e, "failed to save");
        })
    }

    /// Writes one image.
    pub fn save_single(&self, path: &Path, image: &Image, format: PixelFormat, quality: ImageQuality) -> IoResult<()> {
        self.save(path, std::slice::from_ref(image), format, quality)
    }

    /// Writes a cubemap given as one mip chain per face.
    ///
    /// All six faces are required and every chain must have the same
    /// length. Chains are ordered by the cube face tag of their first image;
    /// untagged chains take the face of their position.
    pub fn save_as_cubemap(
        &self,
        path: &Path,
        faces: &[Vec<Image>],
        format: PixelFormat,
        quality: ImageQuality,
    ) -> IoResult<()> {
        if faces.len() != CUBE_FACE_COUNT {
            return Err(IoError::FormatUnsupported(format!(
                "a cubemap needs {CUBE_FACE_COUNT} faces, got {}",
                faces.len()
            )));
        }
        let mip_count = faces[0].len();
        if mip_count == 0 || faces.iter().any(|f| f.len() != mip_count) {
            return Err(IoError::FormatUnsupported("cube faces have different mip counts".into()));
        }

        let codec = self.codec_for_path(path)?;
        let target = self.target_format(codec, faces[0][0].format, format)?;

        let mut ordered: Vec<Option<Vec<Image>>> = vec![None; CUBE_FACE_COUNT];
        for (index, chain) in faces.iter().enumerate() {
            let face = chain[0].cube_face.or_else(|| CubeFace::from_index(index)).ok_or_else(|| {
                IoError::FormatUnsupported(format!("face {index} has no cube face"))
            })?;
            let slot = &mut ordered[face.index()];
            if slot.is_some() {
                return Err(IoError::FormatUnsupported(format!("duplicate cube face {face:?}")));
            }
            let converted = convert_all(chain, target)?
                .into_iter()
                .map(|image| image.with_cube_face(Some(face)))
                .collect();
            *slot = Some(converted);
        }
        let ordered: Vec<Vec<Image>> = ordered.into_iter().flatten().collect();

        codec.encode_cubemap(path, &ordered, quality).inspect_err(|e| {
            error!(path = %path.display(), codec = codec.name(), error = %e, "failed to save cubemap");
        })
    }

    fn codec_for_path(&self, path: &Path) -> IoResult<&'static dyn ImageCodec> {
        self.codec_for(ImageFormat::from_extension(path)).ok_or_else(|| {
            IoError::FormatUnrecognized(format!("no codec for extension of {}", path.display()))
        })
    }

    /// Pixel format the codec will be handed.
    fn target_format(&self, codec: &dyn ImageCodec, source: PixelFormat, requested: PixelFormat) -> IoResult<PixelFormat> {
        if requested != PixelFormat::Invalid {
            if !codec.supports_format(requested) {
                return Err(IoError::FormatUnsupported(format!(
                    "{requested} cannot be written to {}",
                    codec.name()
                )));
            }
            return Ok(requested);
        }
        if codec.supports_format(source) {
            return Ok(source);
        }
        let fallback = codec.supported_formats().iter().copied().find(|&f| can_convert(source, f));
        match (fallback, codec.supported_formats().first()) {
            (Some(format), _) => {
                debug!(from = %source, to = %format, codec = codec.name(), "converting before save");
                Ok(format)
            }
            (None, Some(&first)) => Err(IoError::conversion_unsupported(source, first)),
            (None, None) => Err(IoError::FormatUnsupported(format!("{} is read-only", codec.name()))),
        }
    }

    // ------------------------------------------------------------------------
    // Format lookup
    // ------------------------------------------------------------------------

    /// Container for a file extension (with or without the dot).
    pub fn image_format_for_extension(&self, ext: &str) -> ImageFormat {
        ImageFormat::from_extension_str(ext.trim_start_matches('.'))
    }

    /// Container for a name such as `"DDS"` (case-insensitive).
    pub fn image_format_by_name(&self, name: &str) -> ImageFormat {
        ImageFormat::from_name(name)
    }

    /// Container of an existing file: extension first, then content.
    pub fn image_format_for_path(&self, path: &Path) -> IoResult<ImageFormat> {
        let mut file = open(path)?;
        Ok(self
            .resolve(Some(path), &mut file)
            .map(|codec| codec.format())
            .unwrap_or(ImageFormat::Unknown))
    }

    /// See [`base_mipmap`](crate::info::base_mipmap).
    pub fn base_mipmap(&self, width: u32, height: u32, requested_base: u32, params: &LoadingParams) -> u32 {
        base_mipmap(width, height, requested_base, params)
    }

    // ------------------------------------------------------------------------
    // CRC metadata
    // ------------------------------------------------------------------------

    /// Tags a PVR or DDS file with the CRC32 of its current bytes.
    ///
    /// Returns the stored CRC. A file that already carries one is left
    /// untouched and reported as an error.
    pub fn add_crc_into_metadata(&self, path: &Path) -> IoResult<u32> {
        match self.image_format_for_path(path)? {
            ImageFormat::Pvr => {
                let crc = crc32_for_file(path)?;
                let mut pvr = PvrFile::read(&mut open(path)?, true, true)?;
                if let Some(existing) = pvr.crc() {
                    warn!(path = %path.display(), crc = existing, "PVR already carries a CRC");
                    return Err(IoError::FormatUnsupported("PVR already carries a CRC".into()));
                }
                pvr.add_crc(crc);
                let bytes = pvr.to_bytes()?;
                std::fs::write(path, bytes).map_err(IoError::write_failed)?;
                Ok(crc)
            }
            ImageFormat::Dds => {
                let crc = crc32_for_file(path)?;
                let mut file = OpenOptions::new().read(true).write(true).open(path)?;
                write_crc_in_place(&mut file, crc).inspect_err(|_| {
                    warn!(path = %path.display(), "CRC not written");
                })?;
                Ok(crc)
            }
            other => Err(IoError::FormatUnsupported(format!("{other} files cannot carry a CRC"))),
        }
    }

    /// CRC stored by [`add_crc_into_metadata`](Self::add_crc_into_metadata).
    ///
    /// `Ok(None)` for an untagged PVR/DDS file.
    pub fn get_crc_from_metadata(&self, path: &Path) -> IoResult<Option<u32>> {
        match self.image_format_for_path(path)? {
            ImageFormat::Pvr => Ok(PvrFile::read(&mut open(path)?, true, false)?.crc()),
            ImageFormat::Dds => Ok(DdsFile::read(&mut open(path)?)?.crc()),
            other => Err(IoError::FormatUnsupported(format!("{other} files cannot carry a CRC"))),
        }
    }
}

fn convert_all(images: &[Image], format: PixelFormat) -> IoResult<Vec<Image>> {
    images
        .iter()
        .map(|image| {
            convert_image(image, format).map_err(|e| match e {
                vtex_core::Error::ConversionUnsupported { .. } => {
                    IoError::conversion_unsupported(image.format, format)
                }
                other => other.into(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_mipmap_respects_floor() {
        let system = ImageSystem::new();
        let params = LoadingParams::new().with_minimal_size(8, 8);
        assert_eq!(system.base_mipmap(32, 32, 0, &params), 2);
        assert_eq!(system.base_mipmap(32, 32, 0, &LoadingParams::default()), 0);
    }

    #[test]
    fn extension_lookup() {
        let system = ImageSystem::new();
        assert_eq!(system.image_format_for_extension(".DDS"), ImageFormat::Dds);
        assert_eq!(system.image_format_for_extension("tga"), ImageFormat::Tga);
        assert_eq!(system.image_format_for_extension("exr"), ImageFormat::Unknown);
        assert_eq!(system.image_format_by_name("pvr"), ImageFormat::Pvr);
    }

    #[test]
    fn cubemap_needs_six_faces() {
        let system = ImageSystem::new();
        let faces: Vec<Vec<Image>> = (0..5)
            .map(|_| vec![Image::create(4, 4, PixelFormat::Rgba8888).unwrap()])
            .collect();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.dds");
        let err = system
            .save_as_cubemap(&path, &faces, PixelFormat::Invalid, ImageQuality::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::FormatUnsupported);
        assert!(!path.exists());
    }

    #[test]
    fn unknown_extension_is_refused() {
        let system = ImageSystem::new();
        let dir = tempfile::tempdir().unwrap();
        let image = Image::create(2, 2, PixelFormat::Rgba8888).unwrap();
        let err = system
            .save_single(&dir.path().join("a.xyz"), &image, PixelFormat::Invalid, ImageQuality::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::FormatUnrecognized);
    }
}
