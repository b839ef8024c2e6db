//! respawn CLI - rebuild and restart a server on every source change.
//!
//! This crate provides the command-line interface for the `respawn`
//! supervisor: argument parsing, layered configuration, logging setup and
//! terminal output.
//!
//! - [`cli`] - clap definitions
//! - [`commands`] - `run` and `routes`
//! - [`config`] - respawn.toml, RESPAWN_* and flag merging
//! - [`error`] - CLI errors and miette conversion
//! - [`logger`] - tracing subscriber setup
//! - [`ui`] - status lines and formatting

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{CliError, ConfigError, Result, ResultExt};
