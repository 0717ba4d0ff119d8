//! CRC tagging of PVR/DDS files.

use anyhow::{Context, Result};
use std::path::Path;
use vtex_io::ImageSystem;

/// Tags `file` with the CRC32 of its current content.
pub fn run_add(file: &Path) -> Result<()> {
    let crc = ImageSystem::new()
        .add_crc_into_metadata(file)
        .with_context(|| format!("Cannot tag: {}", file.display()))?;
    println!("{}: {crc:#010x}", file.display());
    Ok(())
}

/// Prints the stored CRC of `file`.
pub fn run_get(file: &Path) -> Result<()> {
    let crc = ImageSystem::new()
        .get_crc_from_metadata(file)
        .with_context(|| format!("Cannot read: {}", file.display()))?;
    match crc {
        Some(crc) => println!("{}: {crc:#010x}", file.display()),
        None => println!("{}: no CRC", file.display()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtex_core::{Image, PixelFormat};
    use vtex_io::ImageQuality;

    #[test]
    fn add_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.dds");
        let image = Image::create(4, 4, PixelFormat::Rgba8888).unwrap();
        ImageSystem::new()
            .save_single(&path, &image, PixelFormat::Invalid, ImageQuality::default())
            .unwrap();

        run_add(&path).unwrap();
        run_get(&path).unwrap();
        assert!(run_add(&path).is_err());
    }
}
