//! Container and pixel format conversion.
//!
//! Cubemaps stay cubemaps when the output container can hold them.

use crate::ConvertArgs;
use anyhow::{Context, Result};
use tracing::{debug, info};
use vtex_core::PixelFormat;
use vtex_io::{ImageFormat, ImageQuality, ImageSystem};

/// Runs the convert command.
pub fn run(args: ConvertArgs, verbose: u8) -> Result<()> {
    let system = ImageSystem::new();
    let target = match args.format.as_deref() {
        Some(name) => super::parse_format(name)?,
        None => PixelFormat::Invalid,
    };
    let quality = ImageQuality::new(args.quality);
    let output_container = ImageFormat::from_extension(&args.output);

    let images = super::load_images(&system, &args.input)?;
    info!(
        input = %args.input.display(),
        output = %args.output.display(),
        source_format = %images[0].format,
        images = images.len(),
        "Converting"
    );

    let faces = if output_container.supports_mipmaps() {
        super::split_cube_faces(&images)
    } else {
        None
    };

    match faces {
        Some(faces) => {
            debug!(mips = faces[0].len(), "saving as cubemap");
            system
                .save_as_cubemap(&args.output, &faces, target, quality)
                .with_context(|| format!("Failed to save: {}", args.output.display()))?;
        }
        None => {
            // containers without mips take the top level only
            let images = if output_container.supports_mipmaps() {
                &images[..]
            } else {
                &images[..1]
            };
            system
                .save(&args.output, images, target, quality)
                .with_context(|| format!("Failed to save: {}", args.output.display()))?;
        }
    }

    if verbose > 0 {
        println!("{} -> {}", args.input.display(), args.output.display());
    }
    Ok(())
}
