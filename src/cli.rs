//! Command-line interface.

use clap::{Parser, Subcommand};
use dirstream::archive::DEFAULT_MAX_FRAME_SIZE;
use std::path::PathBuf;

/// Stream directory trees through a pipe.
///
/// `create` writes an archive of each PATH to the output; `extract` reads an
/// archive and recreates it under the extraction directory.
#[derive(Parser, Debug)]
#[command(name = "dirstream")]
#[command(version)]
pub struct Cli {
    /// Archive to write or read; `-` means stdout or stdin.
    #[arg(short = 'f', long, env = "DIRSTREAM_FILE", default_value = "-", global = true)]
    pub file: PathBuf,

    /// Directory to extract into; created when missing.
    #[arg(short = 'C', long, env = "DIRSTREAM_CHDIR", default_value = ".", global = true)]
    pub chdir: PathBuf,

    /// Report progress on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log every entry on stderr; implies --sort.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Visit directory children in name order.
    #[arg(long, global = true)]
    pub sort: bool,

    /// Largest frame payload accepted when extracting.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_FRAME_SIZE, global = true)]
    pub max_frame_size: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Archive one or more paths.
    Create {
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,
    },

    /// Recreate an archive under the extraction directory.
    Extract,
}

impl Cli {
    pub fn uses_stdio(&self) -> bool {
        self.file.as_os_str() == "-"
    }

    pub fn sort_children(&self) -> bool {
        self.sort || self.debug
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }
}
