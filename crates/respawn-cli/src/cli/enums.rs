use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Log verbosity for the supervisor and the CLI
#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only failures that stop a generation or the supervisor
    #[value(name = "error")]
    Error,

    /// Failures that only affect the proxy, skipped routes
    #[value(name = "warn")]
    Warn,

    /// Generation lifecycle, restarts and discovered routes
    #[value(name = "info")]
    Info,

    /// Every watched directory, detected generator and forwarded request
    #[value(name = "debug")]
    Debug,

    /// Everything, including dependency internals enabled through RUST_LOG
    #[value(name = "trace")]
    Trace,
}

impl LogLevel {
    /// Name used in filter directives and configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
