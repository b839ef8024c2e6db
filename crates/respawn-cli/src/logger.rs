//! Logging infrastructure for the respawn CLI.
//!
//! Structured logging via the `tracing` ecosystem. The supervisor logs every
//! directory it watches, every generator it detects and every generation it
//! starts; the verbosity flags decide how much of that reaches the terminal.
//!
//! # Example
//!
//! ```rust,no_run
//! use respawn_cli::cli::LogLevel;
//! use respawn_cli::logger::{init_logger, resolve_filter};
//!
//! init_logger(resolve_filter(false, false, Some(LogLevel::Debug)), false);
//! tracing::debug!("watching directory");
//! ```

use crate::cli::LogLevel;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Targets whose records are shown by the level directives.
const TARGETS: &[&str] = &["respawn", "respawn_cli"];

/// Filter directive enabling `level` for the respawn crates.
pub fn directive(level: LogLevel) -> String {
    let level = level.as_str();
    TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Choose the log filter from the global flags and the configured level.
///
/// The level is determined in this order:
/// 1. `--verbose`: debug
/// 2. `--quiet`: errors only
/// 3. `--log-level` or `log-level` from the configuration
/// 4. `RUST_LOG` environment variable
/// 5. Default: info
pub fn resolve_filter(verbose: bool, quiet: bool, configured: Option<LogLevel>) -> EnvFilter {
    if verbose {
        EnvFilter::new(directive(LogLevel::Debug))
    } else if quiet {
        EnvFilter::new(directive(LogLevel::Error))
    } else if let Some(level) = configured {
        EnvFilter::new(directive(level))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(directive(LogLevel::Info)))
    }
}

/// Global verbosity flags, applied once the configured level is known.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logging {
    pub verbose: bool,
    pub quiet: bool,
    pub no_color: bool,
}

impl Logging {
    /// Install the subscriber for these flags and the configured level.
    pub fn init(self, configured: Option<LogLevel>) {
        init_logger(resolve_filter(self.verbose, self.quiet, configured), self.no_color);
    }
}

/// Install the global tracing subscriber.
///
/// Must be called once, before any logging occurs.
pub fn init_logger(filter: EnvFilter, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false) // Don't show the module path (keeps output clean)
        .with_level(true)
        .with_ansi(!no_color)
        .with_writer(std::io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
