use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "deskgif")]
#[command(author, version, about = "GIF, video and image edits driven by ffmpeg, ImageMagick and gifsicle")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the available operations
    Ops,

    /// Run one operation on a file
    Run {
        /// Operation name (see `deskgif ops`)
        operation: String,

        /// Source file
        input: PathBuf,

        /// Where to write the result
        output: PathBuf,

        /// Operation settings as a JSON object
        #[arg(long, conflicts_with = "settings_file")]
        settings: Option<String>,

        /// Read operation settings from a JSON file
        #[arg(long)]
        settings_file: Option<PathBuf>,

        /// Deadline for the whole operation, overriding the config
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// List the frames of a GIF with their delays and thumbnails
    Frames {
        /// GIF to inspect
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show size, timestamps and (for GIFs) frame count of a file
    Info {
        /// File to describe
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Delete scratch files left behind by earlier runs
    Sweep,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
