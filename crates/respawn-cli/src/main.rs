//! respawn - rebuild and restart a server on every source change.
//!
//! Parses the command line, sets up colors and dispatches to the command.
//! Logging is initialized by each command once the configured level is known.

use clap::Parser;
use miette::Result;
use respawn_cli::{cli, commands, error, logger::Logging, ui};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let logging = Logging {
        verbose: args.verbose,
        quiet: args.quiet,
        no_color: args.no_color,
    };
    ui::init_colors(args.no_color);

    let result = match args.command {
        cli::Command::Run(run_args) => commands::run_execute(run_args, logging).await,
        cli::Command::Routes(routes_args) => commands::routes_execute(routes_args, logging).await,
    };

    // Convert CLI errors to miette diagnostics for error reporting
    result.map_err(error::cli_error_to_miette)
}
