//! Command-line interface definition for respawn.
//!
//! # Command Structure
//!
//! - `respawn run` - Watch, rebuild and restart the target, optionally behind a proxy
//! - `respawn routes` - Run route discovery once and print the table

mod commands;
pub mod enums;
mod tests;

use clap::Parser;

pub use commands::{Command, RoutesArgs, RunArgs};
pub use enums::*;

/// respawn - rebuild and restart a server on every source change
#[derive(Parser, Debug)]
#[command(
    name = "respawn",
    version,
    about = "Rebuild and restart a server on every source change",
    long_about = "respawn watches a source tree, rebuilds the target when a watched file changes\n\
                  and restarts it. With --addr it also fronts the target with a reverse proxy\n\
                  that forwards the target's own routes over a private per-generation Unix socket\n\
                  and everything else to an optional catch-all target."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    ///
    /// Shows every watched directory, detected generator and proxy decision.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    ///
    /// Outputs plain text without ANSI color codes. Useful for logging to
    /// files or systems that don't support colored terminal output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}
