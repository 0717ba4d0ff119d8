//! vtex - texture container tool
//!
//! Inspects, converts and mipmaps PVR, DDS, TGA, PNG, JPEG, WebP, PSD and HDR
//! files, and manages the CRC tags stored in PVR/DDS metadata.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "vtex")]
#[command(author, version, about = "Texture container tool")]
#[command(long_about = "
Reads and writes texture containers and converts between pixel formats.

Examples:
  vtex info atlas.pvr sky.dds             # Header info
  vtex convert in.tga out.dds -f DXT5     # Convert container and format
  vtex convert photo.psd photo.jpg -q 85  # Lossy save
  vtex mipmaps in.tga out.pvr --normal-map
  vtex crc add out.dds                    # Tag with CRC32
  vtex crc get out.dds
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Display header information
    #[command(visible_alias = "i")]
    Info(InfoArgs),

    /// Convert between containers and pixel formats
    #[command(visible_alias = "c")]
    Convert(ConvertArgs),

    /// Build a full mip chain and save it
    #[command(visible_alias = "m")]
    Mipmaps(MipmapsArgs),

    /// Add or read the CRC tag of a PVR/DDS file
    Crc(CrcArgs),
}

#[derive(Args)]
struct InfoArgs {
    /// Input file(s)
    #[arg(required = true)]
    input: Vec<PathBuf>,
}

#[derive(Args)]
struct ConvertArgs {
    /// Input file
    input: PathBuf,

    /// Output file, container picked by extension
    output: PathBuf,

    /// Pixel format to store, e.g. RGBA8888, RGB565, DXT1A
    #[arg(short, long)]
    format: Option<String>,

    /// Quality for lossy containers (0-100)
    #[arg(short, long, default_value = "100", value_parser = clap::value_parser!(u8).range(0..=100))]
    quality: u8,
}

#[derive(Args)]
struct MipmapsArgs {
    /// Input file, its first image is used
    input: PathBuf,

    /// Output file (PVR or DDS to keep the chain)
    output: PathBuf,

    /// Renormalize every level
    #[arg(long)]
    normal_map: bool,
}

#[derive(Args)]
struct CrcArgs {
    #[command(subcommand)]
    action: CrcAction,
}

#[derive(Subcommand)]
enum CrcAction {
    /// Tag the file with the CRC32 of its current bytes
    Add {
        /// PVR or DDS file
        file: PathBuf,
    },
    /// Print the stored CRC
    Get {
        /// PVR or DDS file
        file: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info(args) => commands::info::run(args, cli.verbose),
        Commands::Convert(args) => commands::convert::run(args, cli.verbose),
        Commands::Mipmaps(args) => commands::mipmaps::run(args, cli.verbose),
        Commands::Crc(args) => match args.action {
            CrcAction::Add { file } => commands::crc::run_add(&file),
            CrcAction::Get { file } => commands::crc::run_get(&file),
        },
    }
}
