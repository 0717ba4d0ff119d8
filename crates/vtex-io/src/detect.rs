//! Container detection.
//!
//! Extension lookup is the fast path; magic-byte sniffing is the fallback.
//! TGA has no magic number and is only recognized by its codec's header
//! validation, never by [`ImageFormat::from_bytes`].

use std::path::Path;

/// Supported texture containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// PowerVR PVR v3.
    Pvr,
    /// DirectDraw Surface.
    Dds,
    /// Truevision TGA.
    Tga,
    /// Portable Network Graphics.
    Png,
    /// JPEG/JFIF.
    Jpeg,
    /// WebP.
    WebP,
    /// Adobe Photoshop.
    Psd,
    /// Radiance RGBE.
    Hdr,
    /// Unknown/unsupported container.
    Unknown,
}

impl ImageFormat {
    /// All known containers, in sniffing priority order.
    pub const ALL: [ImageFormat; 8] = [
        ImageFormat::Pvr,
        ImageFormat::Dds,
        ImageFormat::Png,
        ImageFormat::Jpeg,
        ImageFormat::WebP,
        ImageFormat::Psd,
        ImageFormat::Hdr,
        ImageFormat::Tga,
    ];

    /// Detects the container from a file extension only.
    pub fn from_extension<P: AsRef<Path>>(path: P) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        Self::from_extension_str(ext.as_deref().unwrap_or(""))
    }

    /// Maps a bare extension (with or without the dot, any case).
    pub fn from_extension_str(ext: &str) -> Self {
        let ext = ext.trim_start_matches('.').to_lowercase();
        match ext.as_str() {
            "pvr" => ImageFormat::Pvr,
            "dds" => ImageFormat::Dds,
            "tga" | "tpic" => ImageFormat::Tga,
            "png" => ImageFormat::Png,
            "jpg" | "jpeg" => ImageFormat::Jpeg,
            "webp" => ImageFormat::WebP,
            "psd" => ImageFormat::Psd,
            "hdr" => ImageFormat::Hdr,
            _ => ImageFormat::Unknown,
        }
    }

    /// Maps a container name as returned by [`name`](Self::name), any case.
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
            .unwrap_or(ImageFormat::Unknown)
    }

    /// Detects the container from leading bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.len() < 2 {
            return ImageFormat::Unknown;
        }

        // HDR: "#?"
        if bytes[0..2] == [b'#', b'?'] {
            return ImageFormat::Hdr;
        }

        if bytes.len() < 4 {
            return ImageFormat::Unknown;
        }

        // PVR v3: 0x03525650 little-endian
        if bytes[0..4] == [b'P', b'V', b'R', 0x03] {
            return ImageFormat::Pvr;
        }

        if bytes[0..4] == *b"DDS " {
            return ImageFormat::Dds;
        }

        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            return ImageFormat::Png;
        }

        // JPEG: 0xFF 0xD8 0xFF
        if bytes[0..3] == [0xFF, 0xD8, 0xFF] {
            return ImageFormat::Jpeg;
        }

        if bytes[0..4] == *b"8BPS" {
            return ImageFormat::Psd;
        }

        // WebP: RIFF....WEBP
        if bytes.len() >= 12 && bytes[0..4] == *b"RIFF" && bytes[8..12] == *b"WEBP" {
            return ImageFormat::WebP;
        }

        ImageFormat::Unknown
    }

    /// Human-readable container name.
    pub fn name(&self) -> &'static str {
        match self {
            ImageFormat::Pvr => "PVR",
            ImageFormat::Dds => "DDS",
            ImageFormat::Tga => "TGA",
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::WebP => "WebP",
            ImageFormat::Psd => "PSD",
            ImageFormat::Hdr => "HDR",
            ImageFormat::Unknown => "Unknown",
        }
    }

    /// File extensions without dots; the first one is used when saving.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ImageFormat::Pvr => &["pvr"],
            ImageFormat::Dds => &["dds"],
            ImageFormat::Tga => &["tga", "tpic"],
            ImageFormat::Png => &["png"],
            ImageFormat::Jpeg => &["jpg", "jpeg"],
            ImageFormat::WebP => &["webp"],
            ImageFormat::Psd => &["psd"],
            ImageFormat::Hdr => &["hdr"],
            ImageFormat::Unknown => &[],
        }
    }

    /// Returns the typical file extension for this container.
    pub fn extension(&self) -> &'static str {
        self.extensions().first().copied().unwrap_or("")
    }

    /// Returns true if the container can hold mip chains and cube faces.
    pub fn supports_mipmaps(&self) -> bool {
        matches!(self, ImageFormat::Pvr | ImageFormat::Dds)
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_detection() {
        assert_eq!(ImageFormat::from_extension("a.pvr"), ImageFormat::Pvr);
        assert_eq!(ImageFormat::from_extension("a.DDS"), ImageFormat::Dds);
        assert_eq!(ImageFormat::from_extension("dir/a.tga"), ImageFormat::Tga);
        assert_eq!(ImageFormat::from_extension("a.jpeg"), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_extension("a.webp"), ImageFormat::WebP);
        assert_eq!(ImageFormat::from_extension("a.hdr"), ImageFormat::Hdr);
        assert_eq!(ImageFormat::from_extension("a.PNG"), ImageFormat::Png);
        assert_eq!(ImageFormat::from_extension("a.gif"), ImageFormat::Unknown);
        assert_eq!(ImageFormat::from_extension("noext"), ImageFormat::Unknown);
        assert_eq!(ImageFormat::from_extension_str(".PSD"), ImageFormat::Psd);
    }

    #[test]
    fn magic_bytes() {
        assert_eq!(ImageFormat::from_bytes(&[0x50, 0x56, 0x52, 0x03, 0, 0]), ImageFormat::Pvr);
        assert_eq!(ImageFormat::from_bytes(b"DDS \x7c\0\0\0"), ImageFormat::Dds);
        assert_eq!(ImageFormat::from_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_bytes(b"RIFF\0\0\0\0WEBPVP8 "), ImageFormat::WebP);
        assert_eq!(ImageFormat::from_bytes(b"8BPS\0\x01"), ImageFormat::Psd);
        assert_eq!(ImageFormat::from_bytes(b"#?RADIANCE"), ImageFormat::Hdr);
        assert_eq!(ImageFormat::from_bytes(b"\x89PNG\r\n\x1a\n\0\0\0\x0dIHDR"), ImageFormat::Png);
        assert_eq!(ImageFormat::from_bytes(b"\x89PNG"), ImageFormat::Unknown);
        // byte-swapped PVR is not sniffed as PVR
        assert_eq!(ImageFormat::from_bytes(&[0x03, 0x52, 0x56, 0x50]), ImageFormat::Unknown);
        assert_eq!(ImageFormat::from_bytes(&[0, 0, 2, 0]), ImageFormat::Unknown);
    }

    #[test]
    fn names_round_trip() {
        for f in ImageFormat::ALL {
            assert_eq!(ImageFormat::from_name(f.name()), f);
            assert_eq!(ImageFormat::from_extension_str(f.extension()), f);
        }
        assert_eq!(ImageFormat::from_name("webp"), ImageFormat::WebP);
    }
}
