//! CLI command definitions and handlers.

pub mod cull;

use clap::{Parser, Subcommand};

/// Photo Cull - Score, deduplicate and cull a photo shoot
#[derive(Parser)]
#[command(name = "photo-cull")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Shared cull arguments (paths, thresholds, flags).
    #[command(flatten)]
    pub cull: cull::CullArgs,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Score, group and export a batch of photos
    Cull(cull::CullArgs),
}

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Every scored photo passed.
    Success = 0,
    /// At least one photo was rejected or could not be scored.
    Rejected = 1,
    /// The run itself failed.
    Error = 2,
    /// Interrupted by the user.
    Cancelled = 130,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code as u8)
    }
}
