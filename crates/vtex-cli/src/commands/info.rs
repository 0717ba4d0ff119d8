//! Header info command.

use crate::InfoArgs;
use anyhow::{Context, Result};
use std::fs;
use vtex_io::ImageSystem;

/// Prints header-level information for every input.
///
/// Nothing beyond the headers is decoded. With `-v` the stored CRC of
/// PVR/DDS files is shown as well.
pub fn run(args: InfoArgs, verbose: u8) -> Result<()> {
    let system = ImageSystem::new();
    for (i, path) in args.input.iter().enumerate() {
        let file_size = fs::metadata(path)
            .with_context(|| format!("Cannot stat: {}", path.display()))?
            .len();
        let container = system.image_format_for_path(path)?;
        let info = system
            .get_image_info(path)
            .with_context(|| format!("Failed to read header: {}", path.display()))?;

        if i > 0 {
            println!();
        }
        println!("{}", path.display());
        println!("  Container:  {container}");
        println!("  Resolution: {}x{}", info.width, info.height);
        println!("  Format:     {}", info.format);
        println!("  Mipmaps:    {}", info.mipmaps_count);
        if info.face_count > 1 {
            println!("  Faces:      {}", info.face_count);
        }
        println!("  Data size:  {}", super::format_size(info.data_size));
        println!("  File size:  {}", super::format_size(file_size));

        if verbose > 0 && container.supports_mipmaps() {
            match system.get_crc_from_metadata(path)? {
                Some(crc) => println!("  CRC:        {crc:#010x}"),
                None => println!("  CRC:        none"),
            }
        }
    }
    Ok(())
}
