//! Codec registry used for format lookup and content sniffing.
//!
//! The registry owns one instance of every built-in codec. Codecs are kept
//! in sniffing priority order: the containers with strong magic numbers come
//! first and TGA, which has none, comes last.
//!
//! # Example
//!
//! ```ignore
//! use vtex_io::registry::CodecRegistry;
//!
//! let registry = CodecRegistry::global();
//! for codec in registry.codecs() {
//!     println!("{}: {:?}", codec.name(), codec.extensions());
//! }
//! assert!(registry.get_by_extension("dds").is_some());
//! ```

use std::collections::HashMap;
use std::sync::OnceLock;

use tracing::trace;

use crate::codec::ImageCodec;
use crate::dds::DdsCodec;
use crate::detect::ImageFormat;
use crate::file::ImageSource;
use crate::pvr::PvrCodec;
use crate::tga::TgaCodec;

/// Central table of container codecs.
///
/// The global instance is built once and is safe to share across threads.
pub struct CodecRegistry {
    codecs: Vec<Box<dyn ImageCodec>>,
    by_extension: HashMap<&'static str, usize>,
}

impl CodecRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            codecs: Vec::new(),
            by_extension: HashMap::new(),
        }
    }

    /// Returns the global registry with every codec enabled at build time.
    pub fn global() -> &'static CodecRegistry {
        static INSTANCE: OnceLock<CodecRegistry> = OnceLock::new();
        INSTANCE.get_or_init(|| {
            let mut registry = CodecRegistry::new();
            registry.register_builtin_codecs();
            registry
        })
    }

    fn register_builtin_codecs(&mut self) {
        self.register(Box::new(PvrCodec::new()));
        self.register(Box::new(DdsCodec::new()));

        #[cfg(feature = "png")]
        self.register(Box::new(crate::png::PngCodec::new()));

        #[cfg(feature = "jpeg")]
        self.register(Box::new(crate::jpeg::JpegCodec::new()));

        #[cfg(feature = "webp")]
        self.register(Box::new(crate::webp::WebpCodec::new()));

        #[cfg(feature = "psd")]
        self.register(Box::new(crate::psd::PsdCodec::new()));

        #[cfg(feature = "hdr")]
        self.register(Box::new(crate::hdr::HdrCodec::new()));

        self.register(Box::new(TgaCodec::new()));
    }

    /// Appends a codec. Later registrations sniff after earlier ones; a
    /// codec for an already registered container replaces its extensions.
    pub fn register(&mut self, codec: Box<dyn ImageCodec>) {
        let index = self.codecs.len();
        for ext in codec.extensions() {
            self.by_extension.insert(ext, index);
        }
        self.codecs.push(codec);
    }

    /// All codecs in sniffing order.
    pub fn codecs(&self) -> impl Iterator<Item = &dyn ImageCodec> + '_ {
        self.codecs.iter().map(|c| c.as_ref())
    }

    /// Codec for a container, if it was built in.
    pub fn get(&self, format: ImageFormat) -> Option<&dyn ImageCodec> {
        self.codecs().find(|c| c.format() == format)
    }

    /// Codec by file extension (case-insensitive, no dot).
    pub fn get_by_extension(&self, ext: &str) -> Option<&dyn ImageCodec> {
        self.by_extension
            .get(ext.to_ascii_lowercase().as_str())
            .map(|&index| self.codecs[index].as_ref())
    }

    /// True if some codec handles `ext`.
    pub fn supports_extension(&self, ext: &str) -> bool {
        self.by_extension.contains_key(ext.to_ascii_lowercase().as_str())
    }

    /// First codec in priority order that recognizes the content of `src`.
    ///
    /// `src` is left at its start whatever the outcome.
    pub fn detect(&self, src: &mut dyn ImageSource) -> Option<&dyn ImageCodec> {
        let found = self.codecs().find(|codec| codec.can_process(src));
        match found {
            Some(codec) => trace!(codec = codec.name(), "content sniffed"),
            None => trace!("no codec recognized the content"),
        }
        let _ = src.rewind_to_start();
        found
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn builtin_codecs_are_registered() {
        let registry = CodecRegistry::global();
        assert!(registry.get(ImageFormat::Pvr).is_some());
        assert!(registry.get(ImageFormat::Dds).is_some());
        assert!(registry.get(ImageFormat::Tga).is_some());
        assert!(registry.get(ImageFormat::Unknown).is_none());
        assert_eq!(registry.codecs().last().map(|c| c.format()), Some(ImageFormat::Tga));
    }

    #[test]
    fn extension_lookup_ignores_case() {
        let registry = CodecRegistry::global();
        assert_eq!(registry.get_by_extension("DDS").map(|c| c.format()), Some(ImageFormat::Dds));
        assert_eq!(registry.get_by_extension("pvr").map(|c| c.format()), Some(ImageFormat::Pvr));
        assert!(registry.get_by_extension("exr").is_none());
        assert!(!registry.supports_extension("txt"));

        #[cfg(feature = "png")]
        assert_eq!(registry.get_by_extension("PNG").map(|c| c.format()), Some(ImageFormat::Png));

        #[cfg(feature = "jpeg")]
        assert_eq!(
            registry.get_by_extension("jpg").map(|c| c.format()),
            registry.get_by_extension("jpeg").map(|c| c.format())
        );
    }

    #[test]
    fn detect_rewinds() {
        let registry = CodecRegistry::global();
        let mut bytes = b"DDS ".to_vec();
        bytes.resize(128, 0);
        let mut src = Cursor::new(bytes);
        src.set_position(17);
        let codec = registry.detect(&mut src).map(|c| c.format());
        assert_eq!(codec, Some(ImageFormat::Dds));
        assert_eq!(src.position(), 0);

        let mut empty = Cursor::new(Vec::new());
        assert!(registry.detect(&mut empty).is_none());
    }
}
