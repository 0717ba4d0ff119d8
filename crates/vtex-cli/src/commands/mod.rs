//! CLI command implementations

pub mod convert;
pub mod crc;
pub mod info;
pub mod mipmaps;

use anyhow::{Context, Result, anyhow};
use std::path::Path;
use vtex_core::{CubeFace, Image, PixelFormat};
use vtex_io::{ImageSystem, LoadingParams};

/// Loads every mip/face image of a file.
pub fn load_images(system: &ImageSystem, path: &Path) -> Result<Vec<Image>> {
    let images = system
        .load_path(path, &LoadingParams::default())
        .with_context(|| format!("Failed to load: {}", path.display()))?;
    if images.is_empty() {
        return Err(anyhow!("{} holds no images", path.display()));
    }
    Ok(images)
}

/// Parses a pixel format name, case-insensitive.
pub fn parse_format(name: &str) -> Result<PixelFormat> {
    match PixelFormat::from_name(name) {
        Some(PixelFormat::Invalid) | None => Err(anyhow!("unknown pixel format: {name}")),
        Some(format) => Ok(format),
    }
}

/// Splits decoded images into one mip chain per cube face.
///
/// Returns `None` when the images are not a full cubemap.
pub fn split_cube_faces(images: &[Image]) -> Option<Vec<Vec<Image>>> {
    let faces: Vec<Vec<Image>> = CubeFace::ALL
        .iter()
        .map(|&face| {
            let mut chain: Vec<Image> = images
                .iter()
                .filter(|image| image.cube_face == Some(face))
                .cloned()
                .collect();
            chain.sort_by_key(|image| image.mipmap_level);
            chain
        })
        .collect();
    let count = faces[0].len();
    (count > 0 && faces.iter().all(|f| f.len() == count)).then_some(faces)
}

/// Format file size for display
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names() {
        assert_eq!(parse_format("rgba8888").unwrap(), PixelFormat::Rgba8888);
        assert_eq!(parse_format("DXT1A").unwrap(), PixelFormat::Dxt1A);
        assert!(parse_format("rgb999").is_err());
    }

    #[test]
    fn sizes() {
        assert_eq!(format_size(12), "12 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn cube_faces_are_grouped() {
        let mut images = Vec::new();
        for level in 0..2 {
            for face in CubeFace::ALL {
                let size = 4 >> level;
                images.push(
                    Image::create(size, size, PixelFormat::A8)
                        .unwrap()
                        .with_mipmap_level(level)
                        .with_cube_face(Some(face)),
                );
            }
        }
        let faces = split_cube_faces(&images).unwrap();
        assert_eq!(faces.len(), 6);
        assert!(faces.iter().all(|f| f.len() == 2 && f[0].width == 4));

        let plain = vec![Image::create(4, 4, PixelFormat::A8).unwrap()];
        assert!(split_cube_faces(&plain).is_none());
    }
}
