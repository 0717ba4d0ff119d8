//! In-memory texture plane.
//!
//! An [`Image`] is one decoded mip level of one cube face: an owned byte
//! buffer plus the metadata needed to interpret it. Codecs produce flat
//! `Vec<Image>` lists; a cubemap set is the same list with every entry tagged
//! by [`CubeFace`].
//!
//! # Memory Layout
//!
//! Rows are stored top-to-bottom with no padding beyond what the format's
//! block size requires:
//!
//! ```text
//! row 0: [px px px ...]   pitch_in_bytes(width, format)
//! row 1: [px px px ...]
//! ```
//!
//! For block-compressed formats a "row" is a row of blocks. The buffer length
//! always equals [`size_in_bytes`](crate::format::size_in_bytes) for the
//! image's width, height and format.
//!
//! # Usage
//!
//! ```rust
//! use vtex_core::{Image, PixelFormat, Rect};
//!
//! let mut canvas = Image::create(8, 8, PixelFormat::Rgba8888).unwrap();
//! let tile = Image::create_pink_placeholder(true);
//!
//! canvas.insert_image(&tile, 4, 4, tile.bounds()).unwrap();
//! let corner = canvas.copy_image_region(Rect::new(4, 4, 4, 4)).unwrap();
//! assert_eq!(corner.data_size(), 4 * 4 * 4);
//! ```
//!
//! # Per-pixel operations
//!
//! Flips, rotations and region copies work on any byte-aligned format. The
//! pixel shuffles are written once per storage width (1, 2, 3, 4, 6, 8, 12 or
//! 16 bytes) and shared by every format of that width. Block-compressed
//! formats are refused with [`Error::UnsupportedFormat`].

use crate::convert;
use crate::error::{Error, Result};
use crate::format::{self, PixelFormat};
use crate::rect::Rect;
use std::fmt;

/// Largest width or height an image may have.
pub const MAX_DIMENSION: u32 = 0xffff;

/// Number of faces in a cubemap.
pub const CUBE_FACE_COUNT: usize = 6;

// ============================================================================
// CubeFace
// ============================================================================

/// Face of a cubemap, in the canonical +X, -X, +Y, -Y, +Z, -Z order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CubeFace {
    /// +X
    PositiveX = 0,
    /// -X
    NegativeX = 1,
    /// +Y
    PositiveY = 2,
    /// -Y
    NegativeY = 3,
    /// +Z
    PositiveZ = 4,
    /// -Z
    NegativeZ = 5,
}

impl CubeFace {
    /// All faces in canonical order.
    pub const ALL: [CubeFace; CUBE_FACE_COUNT] = [
        Self::PositiveX,
        Self::NegativeX,
        Self::PositiveY,
        Self::NegativeY,
        Self::PositiveZ,
        Self::NegativeZ,
    ];

    /// Face index 0..6.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Face from an index, `None` outside 0..6.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

// ============================================================================
// Image
// ============================================================================

/// One decoded texture plane.
///
/// Fields are public: codecs fill them directly and callers tag images with
/// mip levels and faces when assembling sets. Keep `data.len()` equal to
/// [`format::size_in_bytes`] when mutating by hand.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel encoding.
    pub format: PixelFormat,
    /// Pixel bytes, rows top-to-bottom.
    pub data: Vec<u8>,
    /// Mip level inside the set this image belongs to.
    pub mipmap_level: u32,
    /// Cube face, `None` for plain 2D images.
    pub cube_face: Option<CubeFace>,
}

impl Image {
    /// Creates a zero-filled image.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidDimensions`] for a zero or oversized dimension and
    /// [`Error::UnsupportedFormat`] for [`PixelFormat::Invalid`].
    pub fn create(width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        check_dimensions(width, height)?;
        if format == PixelFormat::Invalid {
            return Err(Error::unsupported_format(format, "create"));
        }
        Ok(Self {
            width,
            height,
            format,
            data: vec![0; format::size_in_bytes(width, height, format)],
            mipmap_level: 0,
            cube_face: None,
        })
    }

    /// Creates an image holding a copy of the first `size_in_bytes` bytes of
    /// `data`.
    pub fn create_from_data(width: u32, height: u32, format: PixelFormat, data: &[u8]) -> Result<Self> {
        let mut image = Self::create(width, height, format)?;
        let size = image.data.len();
        if data.len() < size {
            return Err(Error::BufferTooSmall {
                required: size,
                got: data.len(),
            });
        }
        image.data.copy_from_slice(&data[..size]);
        Ok(image)
    }

    /// Wraps an existing buffer without copying.
    ///
    /// Excess bytes past `size_in_bytes` are dropped.
    pub fn from_vec(width: u32, height: u32, format: PixelFormat, mut data: Vec<u8>) -> Result<Self> {
        check_dimensions(width, height)?;
        if format == PixelFormat::Invalid {
            return Err(Error::unsupported_format(format, "create"));
        }
        let size = format::size_in_bytes(width, height, format);
        if data.len() < size {
            return Err(Error::BufferTooSmall {
                required: size,
                got: data.len(),
            });
        }
        data.truncate(size);
        Ok(Self {
            width,
            height,
            format,
            data,
            mipmap_level: 0,
            cube_face: None,
        })
    }

    /// 16x16 RGBA8888 placeholder shown when a texture fails to load.
    ///
    /// With `checkers` the image alternates magenta and cyan cells, otherwise
    /// it is solid magenta.
    pub fn create_pink_placeholder(checkers: bool) -> Self {
        let mut image = Self {
            width: 16,
            height: 16,
            format: PixelFormat::Rgba8888,
            data: vec![0; 16 * 16 * 4],
            mipmap_level: 0,
            cube_face: None,
        };
        image.make_pink(checkers);
        image
    }

    /// Overwrites an RGBA8888 image with the placeholder pattern.
    ///
    /// Other formats are left untouched.
    pub fn make_pink(&mut self, checkers: bool) {
        if self.format != PixelFormat::Rgba8888 {
            return;
        }
        const PINK: u32 = 0xffff_00ff;
        let other: u32 = if checkers { 0xffff_ff00 } else { PINK };

        let mut pixels = self.data.chunks_exact_mut(4);
        let mut pink = false;
        for _ in 0..self.width {
            pink = !pink;
            for _ in 0..self.height {
                if let Some(px) = pixels.next() {
                    px.copy_from_slice(&(if pink { PINK } else { other }).to_le_bytes());
                }
                pink = !pink;
            }
        }
    }

    /// Pixel bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable pixel bytes.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Buffer size in bytes.
    #[inline]
    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    /// Bytes per row (or per block row).
    #[inline]
    pub fn pitch(&self) -> usize {
        format::pitch_in_bytes(self.width, self.format)
    }

    /// Whole-image rectangle.
    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    /// Builder-style mip level setter.
    pub fn with_mipmap_level(mut self, level: u32) -> Self {
        self.mipmap_level = level;
        self
    }

    /// Builder-style cube face setter.
    pub fn with_cube_face(mut self, face: Option<CubeFace>) -> Self {
        self.cube_face = face;
        self
    }

    // ------------------------------------------------------------------------
    // Regions
    // ------------------------------------------------------------------------

    /// Copies `src_rect` of `src` into this image at (`dst_x`, `dst_y`).
    ///
    /// The copied block is clipped to both images. Formats must match.
    ///
    /// # Errors
    ///
    /// - [`Error::FormatMismatch`] when formats differ
    /// - [`Error::InvalidRegion`] when the destination origin or the source
    ///   rectangle falls outside the respective image
    /// - [`Error::UnsupportedFormat`] for block-compressed formats
    pub fn insert_image(&mut self, src: &Image, dst_x: u32, dst_y: u32, src_rect: Rect) -> Result<()> {
        if src.format != self.format {
            return Err(Error::format_mismatch(self.format, src.format));
        }
        let px = self.pixel_size("insert")?;
        if dst_x >= self.width || dst_y >= self.height {
            return Err(Error::invalid_region(dst_x, dst_y, src_rect.width, src_rect.height, self.width, self.height));
        }
        let Some(clipped) = src_rect.clip_to(src.width, src.height) else {
            return Err(Error::invalid_region(
                src_rect.x,
                src_rect.y,
                src_rect.width,
                src_rect.height,
                src.width,
                src.height,
            ));
        };
        // Clip against the source origin only, matching where the copy starts.
        let copy_w = clipped.width.min(self.width - dst_x) as usize;
        let copy_h = clipped.height.min(self.height - dst_y) as usize;

        let (src_w, dst_w) = (src.width as usize, self.width as usize);
        for row in 0..copy_h {
            let s = ((clipped.y as usize + row) * src_w + clipped.x as usize) * px;
            let d = ((dst_y as usize + row) * dst_w + dst_x as usize) * px;
            self.data[d..d + copy_w * px].copy_from_slice(&src.data[s..s + copy_w * px]);
        }
        Ok(())
    }

    /// Extracts `rect` into a new image of the same format.
    ///
    /// The rectangle must lie fully inside the image.
    pub fn copy_image_region(&self, rect: Rect) -> Result<Image> {
        let px = self.pixel_size("copy region")?;
        if rect.is_empty() || rect.right() > self.width || rect.bottom() > self.height {
            return Err(Error::invalid_region(rect.x, rect.y, rect.width, rect.height, self.width, self.height));
        }
        let mut out = Image::create(rect.width, rect.height, self.format)?;
        let row_bytes = rect.width as usize * px;
        for (row, dst) in out.data.chunks_exact_mut(row_bytes).enumerate() {
            let s = ((rect.y as usize + row) * self.width as usize + rect.x as usize) * px;
            dst.copy_from_slice(&self.data[s..s + row_bytes]);
        }
        Ok(out)
    }

    // ------------------------------------------------------------------------
    // Flips and rotations
    // ------------------------------------------------------------------------

    /// Mirrors rows top-to-bottom.
    pub fn flip_vertical(&mut self) -> Result<()> {
        let px = self.pixel_size("flip")?;
        let row = self.width as usize * px;
        let h = self.height as usize;
        for y in 0..h / 2 {
            let (top, bottom) = self.data.split_at_mut((h - 1 - y) * row);
            top[y * row..(y + 1) * row].swap_with_slice(&mut bottom[..row]);
        }
        Ok(())
    }

    /// Mirrors every row left-to-right.
    pub fn flip_horizontal(&mut self) -> Result<()> {
        let px = self.pixel_size("flip")?;
        let row = self.width as usize * px;
        let data = &mut self.data;
        match px {
            1 => data.chunks_exact_mut(row).for_each(flip_row::<1>),
            2 => data.chunks_exact_mut(row).for_each(flip_row::<2>),
            3 => data.chunks_exact_mut(row).for_each(flip_row::<3>),
            4 => data.chunks_exact_mut(row).for_each(flip_row::<4>),
            6 => data.chunks_exact_mut(row).for_each(flip_row::<6>),
            8 => data.chunks_exact_mut(row).for_each(flip_row::<8>),
            12 => data.chunks_exact_mut(row).for_each(flip_row::<12>),
            16 => data.chunks_exact_mut(row).for_each(flip_row::<16>),
            _ => return Err(Error::unsupported_format(self.format, "flip")),
        }
        Ok(())
    }

    /// Rotates 90 degrees clockwise; width and height swap.
    pub fn rotate_90_right(&mut self) -> Result<()> {
        self.rotate(true)
    }

    /// Rotates 90 degrees counter-clockwise; width and height swap.
    pub fn rotate_90_left(&mut self) -> Result<()> {
        self.rotate(false)
    }

    /// Rotates by a multiple of 90 degrees, positive is clockwise.
    pub fn rotate_deg(&mut self, degrees: i32) -> Result<()> {
        match degrees % 360 {
            0 => Ok(()),
            90 | -270 => self.rotate_90_right(),
            180 | -180 => {
                self.flip_horizontal()?;
                self.flip_vertical()
            }
            270 | -90 => self.rotate_90_left(),
            _ => Err(Error::other(format!("cannot rotate by {degrees} degrees"))),
        }
    }

    fn rotate(&mut self, clockwise: bool) -> Result<()> {
        let px = self.pixel_size("rotate")?;
        let (w, h) = (self.width as usize, self.height as usize);
        let mut out = vec![0u8; self.data.len()];
        let rotate: fn(&[u8], &mut [u8], usize, usize) = match (px, clockwise) {
            (1, true) => rotate_right::<1>,
            (2, true) => rotate_right::<2>,
            (3, true) => rotate_right::<3>,
            (4, true) => rotate_right::<4>,
            (6, true) => rotate_right::<6>,
            (8, true) => rotate_right::<8>,
            (12, true) => rotate_right::<12>,
            (16, true) => rotate_right::<16>,
            (1, false) => rotate_left::<1>,
            (2, false) => rotate_left::<2>,
            (3, false) => rotate_left::<3>,
            (4, false) => rotate_left::<4>,
            (6, false) => rotate_left::<6>,
            (8, false) => rotate_left::<8>,
            (12, false) => rotate_left::<12>,
            (16, false) => rotate_left::<16>,
            _ => return Err(Error::unsupported_format(self.format, "rotate")),
        };
        rotate(&self.data, &mut out, w, h);
        self.data = out;
        std::mem::swap(&mut self.width, &mut self.height);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Resizing
    // ------------------------------------------------------------------------

    /// Reallocates to `width` x `height`, keeping existing rows at the
    /// origin and zero-filling the rest.
    pub fn resize_canvas(&mut self, width: u32, height: u32) -> Result<()> {
        self.pixel_size("resize canvas")?;
        check_dimensions(width, height)?;
        let old_pitch = self.pitch();
        let new_pitch = format::pitch_in_bytes(width, self.format);
        let mut out = vec![0u8; format::size_in_bytes(width, height, self.format)];
        let keep = old_pitch.min(new_pitch);
        for y in 0..self.height.min(height) as usize {
            out[y * new_pitch..y * new_pitch + keep].copy_from_slice(&self.data[y * old_pitch..y * old_pitch + keep]);
        }
        self.data = out;
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Grows the canvas to a square of the larger side.
    pub fn resize_to_square(&mut self) -> Result<()> {
        let side = self.width.max(self.height);
        self.resize_canvas(side, side)
    }

    /// Rescales to `width` x `height` by nearest sampling, no filtering.
    ///
    /// Each destination pixel takes the source pixel at the rounded scaled
    /// position; use [`convert::resize_rgba8_bilinear`] for a filtered
    /// resample.
    pub fn resize_image(&mut self, width: u32, height: u32) -> Result<()> {
        let px = self.pixel_size("resize")?;
        check_dimensions(width, height)?;
        let kx = self.width as f32 / width as f32;
        let ky = self.height as f32 / height as f32;
        let mut out = vec![0u8; format::size_in_bytes(width, height, self.format)];
        for y in 0..height as usize {
            let sy = ((y as f32 * ky + 0.5) as usize).min(self.height as usize - 1);
            for x in 0..width as usize {
                let sx = ((x as f32 * kx + 0.5) as usize).min(self.width as usize - 1);
                let s = (sy * self.width as usize + sx) * px;
                let d = (y * width as usize + x) * px;
                out[d..d + px].copy_from_slice(&self.data[s..s + px]);
            }
        }
        self.data = out;
        self.width = width;
        self.height = height;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Normal maps and mip chains
    // ------------------------------------------------------------------------

    /// Renormalizes every pixel as a direction vector.
    pub fn normalize(&mut self) -> Result<()> {
        let (w, h, pitch, fmt) = (self.width, self.height, self.pitch(), self.format);
        if convert::normalize_in_place(fmt, &mut self.data, w, h, pitch) {
            Ok(())
        } else {
            Err(Error::unsupported_format(fmt, "normalize"))
        }
    }

    /// Builds the full mip chain down to 1x1.
    ///
    /// The first entry is a copy of this image tagged as mip 0; each further
    /// entry halves the previous one. With `is_normal_map` the top level is
    /// normalized first and every reduction renormalizes its averages.
    pub fn create_mipmaps(&self, is_normal_map: bool) -> Result<Vec<Image>> {
        let mut current = self.clone();
        current.mipmap_level = 0;
        if is_normal_map {
            current.normalize()?;
        }
        let mut chain = vec![current];
        loop {
            let last = &chain[chain.len() - 1];
            if last.width <= 1 && last.height <= 1 {
                break;
            }
            let next = convert::downscale_image_twice(last, is_normal_map)?;
            chain.push(next);
        }
        Ok(chain)
    }

    fn pixel_size(&self, operation: &'static str) -> Result<usize> {
        self.format
            .bytes_per_pixel()
            .ok_or_else(|| Error::unsupported_format(self.format, operation))
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("data_size", &self.data.len())
            .field("mipmap_level", &self.mipmap_level)
            .field("cube_face", &self.cube_face)
            .finish()
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::invalid_dimensions(width, height, "zero-sized image"));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(Error::invalid_dimensions(width, height, "dimension exceeds 65535"));
    }
    Ok(())
}

// ============================================================================
// Pixel shuffles, one instance per storage width
// ============================================================================

fn flip_row<const N: usize>(row: &mut [u8]) {
    let w = row.len() / N;
    for i in 0..w / 2 {
        let (left, right) = row.split_at_mut((w - 1 - i) * N);
        left[i * N..(i + 1) * N].swap_with_slice(&mut right[..N]);
    }
}

fn rotate_right<const N: usize>(src: &[u8], dst: &mut [u8], w: usize, h: usize) {
    // destination is h wide
    for y in 0..h {
        for x in 0..w {
            let s = (y * w + x) * N;
            let d = (x * h + (h - 1 - y)) * N;
            dst[d..d + N].copy_from_slice(&src[s..s + N]);
        }
    }
}

fn rotate_left<const N: usize>(src: &[u8], dst: &mut [u8], w: usize, h: usize) {
    for y in 0..h {
        for x in 0..w {
            let s = (y * w + x) * N;
            let d = ((w - 1 - x) * h + y) * N;
            dst[d..d + N].copy_from_slice(&src[s..s + N]);
        }
    }
}
