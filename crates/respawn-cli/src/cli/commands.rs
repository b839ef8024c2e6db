use super::enums::LogLevel;
use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Available respawn commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Watch, rebuild and restart the target
    ///
    /// Builds the target into a fresh temporary output path, runs it, and
    /// repeats whenever a watched file changes. With --addr the target is
    /// fronted by a reverse proxy that hands traffic over to each new
    /// generation once it has created its socket.
    Run(RunArgs),

    /// Run route discovery once and print the route table
    ///
    /// Useful for checking what the proxy would forward to the target.
    Routes(RoutesArgs),
}

/// Arguments for the run command
///
/// Every flag overrides the matching key of respawn.toml and the
/// RESPAWN_* environment variables. Flags that are not given leave the
/// configured value alone.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Configuration file (defaults to respawn.toml in the current directory)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// File extension that triggers a restart (repeatable, e.g. --ext .go)
    #[arg(long = "ext", value_name = "EXT", value_delimiter = ',')]
    pub exts: Vec<String>,

    /// Directory to watch; a trailing `...` watches the whole tree (repeatable)
    #[arg(long = "dir", value_name = "DIR", value_delimiter = ',')]
    pub dirs: Vec<String>,

    /// Directory that is never watched (repeatable)
    #[arg(long = "ignore-dir", value_name = "DIR", value_delimiter = ',')]
    pub ignore_dirs: Vec<String>,

    /// Build command; `{outpath}` is replaced by the generation's output path
    ///
    /// The command line is split on whitespace. No shell quoting is applied.
    #[arg(long, value_name = "COMMAND")]
    pub build: Option<String>,

    /// Command that runs the built target
    #[arg(long, value_name = "COMMAND")]
    pub exec: Option<String>,

    /// External listen address of the reverse proxy (enables proxy mode)
    ///
    /// Accepts `host:port` or `:port`.
    #[arg(long, value_name = "ADDR")]
    pub addr: Option<String>,

    /// Working directory of build, exec and route discovery
    #[arg(long, value_name = "DIR")]
    pub base_dir: Option<PathBuf>,

    /// Where generation binaries and sockets are created
    #[arg(long, value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Upstream for requests that match no discovered route
    ///
    /// For example a frontend dev server at http://localhost:5173.
    #[arg(long, value_name = "URL")]
    pub catch_all_target: Option<String>,

    /// Log verbosity
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Generator that may run automatically when a directive names it (repeatable)
    #[arg(long = "generator-allow", value_name = "TARGET")]
    pub generator_allow: Vec<String>,

    /// Line prefix introducing a generator directive
    #[arg(long, value_name = "PREFIX")]
    pub directive_prefix: Option<String>,

    /// Route discovery command; the base directory is appended as last argument
    #[arg(long, value_name = "COMMAND")]
    pub routes_command: Option<String>,

    /// Environment variable that tells the target where to listen
    #[arg(long, value_name = "NAME")]
    pub socket_env: Option<String>,

    /// Bounded wait for the proxy's graceful shutdown, in milliseconds
    #[arg(long, value_name = "MS")]
    pub shutdown_timeout_ms: Option<u64>,
}

/// Arguments for the routes command
#[derive(Args, Debug, Default, Clone)]
pub struct RoutesArgs {
    /// Configuration file (defaults to respawn.toml in the current directory)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory passed to the route discovery command
    #[arg(long, value_name = "DIR")]
    pub base_dir: Option<PathBuf>,

    /// Route discovery command
    #[arg(long, value_name = "COMMAND")]
    pub routes_command: Option<String>,

    /// Print the routes as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}
