//! Header-level image description and decode/encode configuration.

use vtex_core::PixelFormat;

/// Metadata-only projection of one container.
///
/// Produced from headers alone, without decoding pixel payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    /// Width of mip 0.
    pub width: u32,
    /// Height of mip 0.
    pub height: u32,
    /// Pixel encoding as decoded.
    pub format: PixelFormat,
    /// Payload bytes over all mips and faces.
    pub data_size: u64,
    /// Number of mip levels per face (at least 1).
    pub mipmaps_count: u32,
    /// Number of faces (1, or up to 6 for cubemaps).
    pub face_count: u32,
}

impl Default for ImageInfo {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            format: PixelFormat::Invalid,
            data_size: 0,
            mipmaps_count: 0,
            face_count: 0,
        }
    }
}

impl ImageInfo {
    /// True when the header described an image of a known format.
    pub fn is_valid(&self) -> bool {
        self.format != PixelFormat::Invalid && self.width > 0 && self.height > 0
    }
}

/// Decode configuration.
///
/// The default loads the full chain from mip 0 with no size floor.
///
/// # Example
///
/// ```
/// use vtex_io::LoadingParams;
///
/// let params = LoadingParams::new().with_minimal_size(8, 8).with_first_mipmap_index(1);
/// assert_eq!(params.minimal_width, 8);
/// assert_eq!(params.base_mipmap, 0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingParams {
    /// Width below which mip selection stops descending.
    pub minimal_width: u32,
    /// Height below which mip selection stops descending.
    pub minimal_height: u32,
    /// First mip level wanted. Zero hands the choice to the size floor.
    pub base_mipmap: u32,
    /// Level number assigned to the first returned image.
    pub first_mipmap_index: u32,
}

impl LoadingParams {
    /// Full chain, no floor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the size floor.
    pub fn with_minimal_size(mut self, width: u32, height: u32) -> Self {
        self.minimal_width = width;
        self.minimal_height = height;
        self
    }

    /// Sets the explicit base mip.
    pub fn with_base_mipmap(mut self, mip: u32) -> Self {
        self.base_mipmap = mip;
        self
    }

    /// Sets the level number of the first returned image.
    pub fn with_first_mipmap_index(mut self, index: u32) -> Self {
        self.first_mipmap_index = index;
        self
    }

    fn has_size_floor(&self) -> bool {
        self.minimal_width != 0 || self.minimal_height != 0
    }
}

/// Picks the first mip level to decode from a `width` x `height` chain.
///
/// A non-zero `requested_base` is the starting point. Otherwise, when
/// `params` sets a size floor, the search starts at the 1x1 level. The
/// start is then walked back toward mip 0 while either dimension at that
/// level is below the floor.
///
/// Callers clamp `requested_base` to their mip count beforehand and the
/// result to `mip_count - 1` afterwards.
pub fn base_mipmap(width: u32, height: u32, requested_base: u32, params: &LoadingParams) -> u32 {
    let mut mip = if requested_base > 0 {
        requested_base
    } else if params.has_size_floor() {
        let largest = width.max(height).max(1);
        31 - largest.leading_zeros()
    } else {
        return 0;
    };

    while mip != 0 && (below(width, mip, params.minimal_width) || below(height, mip, params.minimal_height)) {
        mip -= 1;
    }
    mip
}

fn below(size: u32, mip: u32, floor: u32) -> bool {
    size.checked_shr(mip).unwrap_or(0) < floor
}

/// Base mip for a container with `mip_count` levels, clamped to the chain.
pub(crate) fn base_mipmap_for_chain(width: u32, height: u32, mip_count: u32, params: &LoadingParams) -> u32 {
    let last = mip_count.saturating_sub(1);
    base_mipmap(width, height, params.base_mipmap.min(last), params).min(last)
}

/// Encoder quality, 0..=100. Only lossy codecs look at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ImageQuality(u8);

impl ImageQuality {
    /// Highest quality.
    pub const MAX: ImageQuality = ImageQuality(100);

    /// Clamps `value` to 0..=100.
    pub fn new(value: u8) -> Self {
        Self(value.min(100))
    }

    /// Raw value.
    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for ImageQuality {
    fn default() -> Self {
        Self::MAX
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_floor_from_zero_base() {
        let params = LoadingParams::new().with_minimal_size(8, 8);
        assert_eq!(base_mipmap(32, 32, 0, &params), 2);
    }

    #[test]
    fn no_floor_no_base() {
        assert_eq!(base_mipmap(32, 32, 0, &LoadingParams::new()), 0);
    }

    #[test]
    fn explicit_base_walks_back_to_floor() {
        let params = LoadingParams::new().with_minimal_size(8, 8);
        // 32 >> 3 = 4 is below the floor, 32 >> 2 = 8 is not
        assert_eq!(base_mipmap(32, 32, 3, &params), 2);
        assert_eq!(base_mipmap(32, 32, 1, &params), 1);
    }

    #[test]
    fn explicit_base_without_floor_is_kept() {
        assert_eq!(base_mipmap(32, 32, 4, &LoadingParams::new()), 4);
    }

    #[test]
    fn floor_larger_than_image_stops_at_zero() {
        let params = LoadingParams::new().with_minimal_size(64, 64);
        assert_eq!(base_mipmap(32, 32, 0, &params), 0);
    }

    #[test]
    fn non_square_uses_both_axes() {
        let params = LoadingParams::new().with_minimal_size(4, 4);
        // 64x16: the height reaches the floor first
        assert_eq!(base_mipmap(64, 16, 0, &params), 2);
    }

    #[test]
    fn chain_clamp() {
        let params = LoadingParams::new().with_base_mipmap(9);
        assert_eq!(base_mipmap_for_chain(32, 32, 3, &params), 2);
        assert_eq!(base_mipmap_for_chain(32, 32, 6, &LoadingParams::new()), 0);
    }

    #[test]
    fn quality_clamps() {
        assert_eq!(ImageQuality::new(150).value(), 100);
        assert_eq!(ImageQuality::default(), ImageQuality::MAX);
    }
}
