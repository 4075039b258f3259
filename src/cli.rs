//! Command-line interface for tarzst

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tarzst")]
#[command(about = "tarzst - Create, extract and identify .tar.zst archives", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new archive from files or directories
    Create {
        /// Output archive file (.tar.zst or .tzst)
        #[arg(short, long)]
        output: PathBuf,

        /// Input files or directories; a trailing slash stores a directory's contents only
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// ZSTD compression level (1-22, higher = better compression)
        #[arg(long, default_value = "3")]
        level: i32,

        /// Don't write a content checksum into the zstd frame
        #[arg(long)]
        no_checksum: bool,

        /// Delete the output file if creation fails part way
        #[arg(long)]
        remove_partial: bool,

        /// Refuse to replace an existing output file
        #[arg(long)]
        no_overwrite: bool,
    },

    /// Extract an archive
    Extract {
        /// Input archive file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Replace files that already exist in the output directory
        #[arg(long)]
        overwrite: bool,
    },

    /// List archive contents
    List {
        /// Archive file
        archive: PathBuf,
    },

    /// Report which archive format each path belongs to
    Detect {
        /// Files to inspect
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}
