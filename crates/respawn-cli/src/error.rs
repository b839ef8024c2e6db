//! Error handling for the respawn CLI.
//!
//! Library errors (`respawn::Error`, `respawn::ProxyError`) already carry
//! miette diagnostics and are passed through untouched. Everything the CLI
//! adds on top (configuration problems, bad arguments, signal setup) is
//! described here.
//!
//! # Example
//!
//! ```rust,no_run
//! use respawn_cli::error::{Result, ResultExt};
//! use std::path::Path;
//!
//! fn read_config(path: &Path) -> Result<String> {
//!     std::fs::read_to_string(path)
//!         .with_path(path)
//!         .with_hint("Pass --config <path> to use another file")
//! }
//! ```

pub mod miette;

pub use self::miette::cli_error_to_miette;

use std::path::PathBuf;
use thiserror::Error;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration-related errors (file not found, invalid values, etc.)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The supervisor failed to start
    #[error(transparent)]
    Supervisor(#[from] respawn::Error),

    /// Route discovery failed
    #[error(transparent)]
    Proxy(#[from] respawn::ProxyError),

    /// Invalid command-line arguments or options
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// File or directory not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// I/O errors from file system operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with custom messages
    #[error("{0}")]
    Custom(String),
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file given with --config doesn't exist
    #[error("Config file not found: {}\n\nHint: Create a respawn.toml file or specify --config <path>", .0.display())]
    NotFound(PathBuf),

    /// Merged configuration could not be extracted
    #[error("Failed to load configuration: {0}\n\nHint: Check respawn.toml syntax and RESPAWN_* environment variables")]
    Extract(#[from] figment::Error),

    /// Missing required configuration field
    #[error("Missing required field: {field}\n\nHint: {hint}")]
    MissingField {
        /// Name of the missing field
        field: String,
        /// Helpful hint for providing the field
        hint: String,
    },

    /// Invalid value for a configuration option
    #[error("Invalid value for '{field}': {value}\n\nHint: {hint}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The invalid value
        value: String,
        /// Helpful hint for correct values
        hint: String,
    },
}

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// Helpers for enriching errors with context.
pub trait ResultExt<T> {
    /// Turn a not-found I/O error into [`CliError::FileNotFound`] for `path`.
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

    /// Append a hint to the error message.
    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T>;

    /// Prefix the error message with `msg`.
    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            match err {
                CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                    CliError::FileNotFound(path.as_ref().to_path_buf())
                }
                other => other,
            }
        })
    }

    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}\n\nHint: {}", err, hint))
        })
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}: {}", msg, err))
        })
    }
}
