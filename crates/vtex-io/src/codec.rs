//! Common contract every container codec implements.
//!
//! Codecs never convert pixel formats on their own: images handed to
//! `encode*` must already be in a format the codec lists in
//! [`ImageCodec::supported_formats`]. [`crate::ImageSystem`] does the
//! conversion before calling in.

use std::path::Path;

use vtex_core::{Image, MAX_DIMENSION, PixelFormat};

use crate::detect::ImageFormat;
use crate::error::{IoError, IoResult};
use crate::file::{ImageSource, peek_header};
use crate::info::{ImageInfo, ImageQuality, LoadingParams};

/// Bytes read for magic-based sniffing.
pub(crate) const SNIFF_LEN: usize = 64;

/// A texture container reader/writer.
///
/// # Example
///
/// ```rust,ignore
/// use vtex_io::{ImageCodec, tga::TgaCodec};
///
/// let bytes = TgaCodec::new().encode_to_vec(&[image], Default::default())?;
/// ```
pub trait ImageCodec: Send + Sync {
    /// Container handled by this codec.
    fn format(&self) -> ImageFormat;

    /// Pixel formats the codec can write.
    fn supported_formats(&self) -> &'static [PixelFormat];

    /// Cheap identification. Leaves `src` positioned at its start.
    fn can_process(&self, src: &mut dyn ImageSource) -> bool {
        match peek_header(src, SNIFF_LEN) {
            Ok(header) => ImageFormat::from_bytes(&header) == self.format(),
            Err(_) => false,
        }
    }

    /// Header-only description.
    fn get_info(&self, src: &mut dyn ImageSource) -> IoResult<ImageInfo>;

    /// Decodes into an ordered list of mip/face images.
    fn decode(&self, src: &mut dyn ImageSource, params: &LoadingParams) -> IoResult<Vec<Image>>;

    /// Encodes a mip chain (or a single image) into container bytes.
    fn encode_to_vec(&self, images: &[Image], quality: ImageQuality) -> IoResult<Vec<u8>>;

    /// Encodes a cubemap given as one mip chain per face.
    fn encode_cubemap_to_vec(&self, faces: &[Vec<Image>], quality: ImageQuality) -> IoResult<Vec<u8>> {
        let _ = (faces, quality);
        Err(IoError::FormatUnsupported(format!(
            "cubemaps are not supported by {}",
            self.format()
        )))
    }

    /// Human-readable name.
    fn name(&self) -> &'static str {
        self.format().name()
    }

    /// File extensions without dots.
    fn extensions(&self) -> &'static [&'static str] {
        self.format().extensions()
    }

    /// True if `format` can be written without conversion.
    fn supports_format(&self, format: PixelFormat) -> bool {
        self.supported_formats().contains(&format)
    }

    /// Encodes and writes `path`.
    fn encode(&self, path: &Path, images: &[Image], quality: ImageQuality) -> IoResult<()> {
        let bytes = self.encode_to_vec(images, quality)?;
        std::fs::write(path, bytes).map_err(IoError::write_failed)
    }

    /// Encodes a cubemap and writes `path`.
    fn encode_cubemap(&self, path: &Path, faces: &[Vec<Image>], quality: ImageQuality) -> IoResult<()> {
        let bytes = self.encode_cubemap_to_vec(faces, quality)?;
        std::fs::write(path, bytes).map_err(IoError::write_failed)
    }
}

/// Returns the only image of a single-image container write.
///
/// Containers without mip support take exactly one image; extra mips are
/// rejected rather than silently dropped.
pub(crate) fn single_image<'a>(codec: &dyn ImageCodec, images: &'a [Image]) -> IoResult<&'a Image> {
    match images {
        [image] => Ok(image),
        [] => Err(IoError::write_failed("no images to write")),
        _ => Err(IoError::FormatUnsupported(format!(
            "{} stores a single image, got {}",
            codec.name(),
            images.len()
        ))),
    }
}

/// Checks that `format` is writable by `codec`.
pub(crate) fn ensure_writable(codec: &dyn ImageCodec, format: PixelFormat) -> IoResult<()> {
    if codec.supports_format(format) {
        Ok(())
    } else {
        Err(IoError::FormatUnsupported(format!(
            "{format} cannot be written to {}",
            codec.name()
        )))
    }
}

/// Rewinds `src` when `result` is an error, so a failed decode leaves the
/// source where the caller can retry another codec.
pub(crate) fn rewind_on_error<T>(src: &mut dyn ImageSource, result: IoResult<T>) -> IoResult<T> {
    if result.is_err() {
        let _ = src.rewind_to_start();
    }
    result
}

/// Size of mip `level` along one axis, never below 1.
#[inline]
pub(crate) fn mip_dimension(size: u32, level: u32) -> u32 {
    size.checked_shr(level).unwrap_or(0).max(1)
}

/// Most mip levels a `width` x `height` chain can have: 1 + log2(max side).
#[inline]
pub(crate) fn max_mip_count(width: u32, height: u32) -> u32 {
    u32::BITS - width.max(height).leading_zeros()
}

/// Checks header dimensions and mip count before anything is allocated.
pub(crate) fn validate_header_dimensions(width: u32, height: u32, mip_count: u32) -> IoResult<()> {
    if width == 0 || height == 0 {
        return Err(IoError::dimension_invalid(width, height, "zero-sized image"));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(IoError::dimension_invalid(width, height, "dimension exceeds 65535"));
    }
    let max_mips = max_mip_count(width, height);
    if mip_count == 0 || mip_count > max_mips {
        return Err(IoError::dimension_invalid(
            width,
            height,
            format!("{mip_count} mip levels, at most {max_mips} allowed"),
        ));
    }
    Ok(())
}

/// Validates a mip chain: same format throughout, halving dimensions.
pub(crate) fn validate_chain(images: &[Image]) -> IoResult<PixelFormat> {
    let first = images
        .first()
        .ok_or_else(|| IoError::write_failed("no images to write"))?;
    for (level, image) in images.iter().enumerate() {
        if image.format != first.format {
            return Err(IoError::FormatUnsupported(format!(
                "mip {level} is {}, mip 0 is {}",
                image.format, first.format
            )));
        }
        let w = mip_dimension(first.width, level as u32);
        let h = mip_dimension(first.height, level as u32);
        if image.width != w || image.height != h {
            return Err(IoError::dimension_invalid(
                image.width,
                image.height,
                format!("mip {level} must be {w}x{h}"),
            ));
        }
    }
    Ok(first.format)
}

/// Validates a cubemap: every face has the same chain.
pub(crate) fn validate_cube_faces(faces: &[Vec<Image>]) -> IoResult<PixelFormat> {
    let first = faces
        .first()
        .ok_or_else(|| IoError::write_failed("no faces to write"))?;
    let format = validate_chain(first)?;
    for (index, face) in faces.iter().enumerate().skip(1) {
        if face.len() != first.len() {
            return Err(IoError::FormatUnsupported(format!(
                "face {index} has {} mips, face 0 has {}",
                face.len(),
                first.len()
            )));
        }
        if validate_chain(face)? != format || face[0].width != first[0].width || face[0].height != first[0].height {
            return Err(IoError::FormatUnsupported(format!(
                "face {index} does not match face 0"
            )));
        }
    }
    Ok(format)
}
