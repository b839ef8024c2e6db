//! Error types for the supervisor.
//!
//! The supervisor reacts differently depending on where an error comes from:
//!
//! - [`Error`] aborts startup. The watch set must be fully established before
//!   the first generation runs, so nothing here is retried.
//! - [`GenerationError`] fails one generation. The supervisor backs off and
//!   waits for a file change before trying again.
//! - [`ProxyError`] disables the proxy for one generation only. The child
//!   process keeps running.
//!
//! Failures caused purely by cancellation (a restart or shutdown killed the
//! child) are recognised by [`GenerationError::is_expected_noise`] and never
//! reported.

use miette::Diagnostic;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Startup-fatal errors raised while building the watch set.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The platform file watcher could not be created
    #[error("Failed to create file watcher: {0}")]
    #[diagnostic(
        code(respawn::watch::init),
        help("Check the file watch limits of this system (e.g. fs.inotify.max_user_instances)")
    )]
    WatcherInit(#[source] notify::Error),

    /// A directory could not be subscribed to
    #[error("Failed to add directory to watcher: {}: {source}", path.display())]
    #[diagnostic(
        code(respawn::watch::subscribe),
        help("Check the file watch limits of this system (e.g. fs.inotify.max_user_watches)")
    )]
    Subscribe {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// A directory in the watch set could not be listed
    #[error("Failed to read directory {}: {source}", path.display())]
    #[diagnostic(code(respawn::watch::read_dir))]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Walking a recursive root failed part way through
    #[error("Failed to walk directory {}: {source}", path.display())]
    #[diagnostic(code(respawn::watch::walk))]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// A recursive root is missing or is a regular file
    #[error("Not a directory: {}", .0.display())]
    #[diagnostic(
        code(respawn::watch::not_a_directory),
        help("Entries in `dirs` must name directories relative to the base directory")
    )]
    NotADirectory(PathBuf),

    /// A source file could not be scanned for generator directives
    #[error("Failed to search generate directives in {}: {source}", path.display())]
    #[diagnostic(code(respawn::generator::scan))]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The directory for generation artifacts could not be created
    #[error("Failed to create temp directory {}: {source}", path.display())]
    #[diagnostic(code(respawn::temp_dir))]
    TempDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A background task panicked or was aborted
    #[error("Supervisor task failed: {0}")]
    #[diagnostic(code(respawn::task))]
    Task(#[from] tokio::task::JoinError),
}

/// Failure of a single external command.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The command template rendered to an empty argument vector
    #[error("command is empty")]
    Empty,

    /// The program could not be started
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the child failed
    #[error("failed to wait for `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully
    #[error("`{program}` exited with {status}")]
    Exit { program: String, status: ExitStatus },

    /// The command was killed because its generation was cancelled
    #[error("cancelled")]
    Cancelled,
}

impl CommandError {
    /// Whether this failure is attributable to cancellation alone.
    ///
    /// A child terminated by a signal has no exit code; that is what a
    /// restart or shutdown does to it.
    pub fn is_cancellation(&self) -> bool {
        match self {
            CommandError::Cancelled => true,
            CommandError::Exit { status, .. } => status.code().is_none(),
            _ => false,
        }
    }
}

/// Generation-local failures. Reported as `generation-failed`.
#[derive(Error, Debug, Diagnostic)]
pub enum GenerationError {
    /// A discovered code generator failed
    #[error("Failed to run generator {command:?}: {source}")]
    #[diagnostic(code(respawn::generation::generator))]
    Generator {
        command: Vec<String>,
        #[source]
        source: CommandError,
    },

    /// The build command failed
    #[error("Failed to build with {command:?}: {source}")]
    #[diagnostic(
        code(respawn::generation::build),
        help("Fix the build error; the next file change triggers a new attempt")
    )]
    Build {
        command: Vec<String>,
        #[source]
        source: CommandError,
    },

    /// The exec command failed or exited unsuccessfully
    #[error("Failed to start command {command:?}: {source}")]
    #[diagnostic(
        code(respawn::generation::exec),
        help("The server exited; the next file change triggers a new attempt")
    )]
    Exec {
        command: Vec<String>,
        #[source]
        source: CommandError,
    },
}

impl GenerationError {
    /// The command whose failure this error reports.
    pub fn command(&self) -> &[String] {
        match self {
            GenerationError::Generator { command, .. }
            | GenerationError::Build { command, .. }
            | GenerationError::Exec { command, .. } => command,
        }
    }

    /// Whether the failure is shutdown noise rather than a real failure.
    pub fn is_expected_noise(&self) -> bool {
        match self {
            GenerationError::Generator { source, .. }
            | GenerationError::Build { source, .. }
            | GenerationError::Exec { source, .. } => source.is_cancellation(),
        }
    }
}

/// Proxy-local failures. Logged; the proxy does not start for that generation.
#[derive(Error, Debug, Diagnostic)]
pub enum ProxyError {
    /// The route discovery command failed
    #[error("Failed to run route discovery {command:?}: {source}")]
    #[diagnostic(
        code(respawn::proxy::discover),
        help("The route discovery command must print {{\"paths\":[{{\"method\":...,\"path\":...}}]}}")
    )]
    Discover {
        command: Vec<String>,
        #[source]
        source: CommandError,
    },

    /// Route discovery output was not a route document
    #[error("Failed to decode route discovery output: {0}")]
    #[diagnostic(code(respawn::proxy::decode))]
    Decode(#[from] serde_json::Error),

    /// Route discovery printed nothing
    #[error("Route discovery produced no output")]
    #[diagnostic(code(respawn::proxy::empty_output))]
    EmptyOutput,

    /// The catch-all target is not a usable `http://` URL
    #[error("Invalid catch-all target '{target}': {reason}")]
    #[diagnostic(
        code(respawn::proxy::target),
        help("Use a plain http URL such as http://localhost:5173")
    )]
    InvalidTarget { target: String, reason: String },

    /// The socket directory could not be watched for readiness
    #[error("Failed to watch socket directory {}: {source}", path.display())]
    #[diagnostic(code(respawn::proxy::readiness))]
    Readiness {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// The external listen address could not be bound
    #[error("Failed to bind proxy listener on {addr}: {source}")]
    #[diagnostic(code(respawn::proxy::bind))]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The proxy server stopped with an I/O error
    #[error("Proxy server error: {0}")]
    #[diagnostic(code(respawn::proxy::serve))]
    Serve(#[source] std::io::Error),

    /// The upstream could not be reached
    #[error("Failed to connect to upstream {upstream}: {source}")]
    #[diagnostic(code(respawn::proxy::connect))]
    Connect {
        upstream: String,
        #[source]
        source: std::io::Error,
    },

    /// The upstream connection failed mid-request
    #[error("Upstream {upstream} request failed: {source}")]
    #[diagnostic(code(respawn::proxy::upstream))]
    Upstream {
        upstream: String,
        #[source]
        source: hyper::Error,
    },
}

/// Result type alias for startup operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn status(raw: i32) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(raw)
    }

    #[test]
    fn test_cancelled_is_noise() {
        let err = GenerationError::Exec {
            command: vec!["server".to_string()],
            source: CommandError::Cancelled,
        };
        assert!(err.is_expected_noise());
    }

    #[cfg(unix)]
    #[test]
    fn test_signal_exit_is_noise() {
        // Raw wait status 9: terminated by SIGKILL, no exit code.
        let err = GenerationError::Exec {
            command: vec!["server".to_string()],
            source: CommandError::Exit {
                program: "server".to_string(),
                status: status(9),
            },
        };
        assert!(err.is_expected_noise());
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_failure() {
        // Raw wait status 1 << 8: exited with code 1.
        let err = GenerationError::Build {
            command: vec!["go".to_string(), "build".to_string()],
            source: CommandError::Exit {
                program: "go".to_string(),
                status: status(1 << 8),
            },
        };
        assert!(!err.is_expected_noise());
        assert_eq!(err.command(), ["go", "build"]);
        assert!(err.to_string().contains("Failed to build"));
    }

    #[test]
    fn test_spawn_failure_is_not_noise() {
        let err = CommandError::Spawn {
            program: "missing".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(!err.is_cancellation());
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_not_a_directory_message() {
        let err = Error::NotADirectory(PathBuf::from("src/main.go"));
        assert_eq!(err.to_string(), "Not a directory: src/main.go");
    }
}
