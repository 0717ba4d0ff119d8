//! Mip chain generation.

use crate::MipmapsArgs;
use anyhow::{Context, Result};
use tracing::debug;
use vtex_core::{PixelFormat, convert};
use vtex_io::{ImageFormat, ImageQuality, ImageSystem};

/// Downscales the first image of the input to 1x1 and saves the chain.
///
/// Formats the downscaler cannot filter directly go through RGBA8888 and
/// are converted back before saving when the output container stores them.
pub fn run(args: MipmapsArgs, verbose: u8) -> Result<()> {
    let system = ImageSystem::new();
    let images = super::load_images(&system, &args.input)?;
    let top = &images[0];
    let source_format = top.format;

    let chain = match top.create_mipmaps(args.normal_map) {
        Ok(chain) => chain,
        Err(e) => {
            debug!(format = %source_format, error = %e, "filtering through RGBA8888");
            convert::convert_image(top, PixelFormat::Rgba8888)?.create_mipmaps(args.normal_map)?
        }
    };

    // back to the source format when the output can store it
    let keeps_source = system
        .codec_for(ImageFormat::from_extension(&args.output))
        .is_some_and(|codec| codec.supports_format(source_format));
    let target = if keeps_source { source_format } else { PixelFormat::Invalid };

    system
        .save(&args.output, &chain, target, ImageQuality::default())
        .with_context(|| format!("Failed to save: {}", args.output.display()))?;

    if verbose > 0 {
        println!(
            "{}: {} levels from {}x{}",
            args.output.display(),
            chain.len(),
            top.width,
            top.height
        );
    }
    Ok(())
}
