//! Supervisor options and the watch configuration derived from them.

use crate::command::CommandTemplate;
use path_clean::PathClean;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Suffix marking a watched directory as recursive (`./...`, `src/...`).
pub const RECURSIVE_SUFFIX: &str = "...";

/// Extension of files scanned for generator directives.
pub const DEFAULT_GENERATOR_EXT: &str = ".go";

/// Line prefix that introduces a generator directive.
pub const DEFAULT_DIRECTIVE_PREFIX: &str = "//go:generate go run ";

/// Generators that may be run automatically.
pub const DEFAULT_GENERATOR_ALLOW: &[&str] = &["github.com/mackee/tanukirpc/cmd/gentypescript"];

/// Command that prints the route table of the target.
pub const DEFAULT_ROUTES_COMMAND: &[&str] =
    &["go", "run", "github.com/mackee/tanukirpc/cmd/showpaths"];

/// Environment variable carrying the private socket path to the child.
pub const DEFAULT_SOCKET_ENV: &str = "RESPAWN_UDS_PATH";

/// Bounded wait for the proxy's graceful shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// One configured watch root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRoot {
    /// Cleaned directory path, joined with the base directory
    pub path: PathBuf,
    /// Walk the whole tree below `path` instead of just `path`
    pub recursive: bool,
}

impl WatchRoot {
    /// Parse a configured directory relative to `base_dir`.
    ///
    /// A trailing `...` marks the root recursive and is stripped before the
    /// path is joined and cleaned.
    pub fn parse(entry: &str, base_dir: &Path) -> Self {
        let (dir, recursive) = match entry.strip_suffix(RECURSIVE_SUFFIX) {
            Some(rest) => (rest, true),
            None => (entry, false),
        };
        Self {
            path: base_dir.join(dir).clean(),
            recursive,
        }
    }
}

/// Which directories to subscribe to and which file changes matter.
#[derive(Debug, Clone, Default)]
pub struct WatchConfig {
    /// Roots in declaration order
    pub roots: Vec<WatchRoot>,
    /// Cleaned directory paths that are never subscribed to
    pub ignore: HashSet<PathBuf>,
    /// Extensions (with leading dot) that trigger a restart
    pub exts: HashSet<String>,
}

impl WatchConfig {
    /// Build a watch config from raw option values.
    pub fn new<S: AsRef<str>>(base_dir: &Path, dirs: &[S], ignore_dirs: &[S], exts: &[S]) -> Self {
        Self {
            roots: dirs
                .iter()
                .map(|d| WatchRoot::parse(d.as_ref(), base_dir))
                .collect(),
            ignore: ignore_dirs
                .iter()
                .map(|d| base_dir.join(d.as_ref()).clean())
                .collect(),
            exts: exts.iter().map(|e| e.as_ref().to_string()).collect(),
        }
    }

    /// Whether `dir` is in the ignore set.
    pub fn is_ignored(&self, dir: &Path) -> bool {
        self.ignore.contains(dir)
    }

    /// Whether a change to `path` should trigger a restart.
    pub fn matches_ext(&self, path: &Path) -> bool {
        dotted_extension(path).is_some_and(|ext| self.exts.contains(ext))
    }
}

/// Extension of the final path element including the leading dot.
///
/// `.gitignore` yields `.gitignore`; a name without a dot yields `None`.
pub fn dotted_extension(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    name.rfind('.').map(|idx| &name[idx..])
}

/// How generator directives are recognised in source files.
#[derive(Debug, Clone)]
pub struct DirectiveOptions {
    /// Extension of files to scan (with leading dot)
    pub file_ext: String,
    /// Line prefix introducing a directive
    pub prefix: String,
    /// Generator targets allowed to run
    pub allow: HashSet<String>,
}

impl Default for DirectiveOptions {
    fn default() -> Self {
        Self {
            file_ext: DEFAULT_GENERATOR_EXT.to_string(),
            prefix: DEFAULT_DIRECTIVE_PREFIX.to_string(),
            allow: DEFAULT_GENERATOR_ALLOW.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Reverse proxy settings. Present only in proxy mode.
#[derive(Debug, Clone)]
pub struct ProxyOptions {
    /// External listen address (`127.0.0.1:8080` or Go-style `:8080`)
    pub addr: String,
    /// Upstream for requests matching no discovered route
    pub catch_all: Option<String>,
    /// Route discovery command; the base directory is appended as last argument
    pub routes_command: Vec<String>,
    /// Environment variable that tells the child where to listen
    pub socket_env: String,
    /// Bounded wait for graceful shutdown before connections are dropped
    pub shutdown_timeout: Duration,
}

impl ProxyOptions {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            catch_all: None,
            routes_command: DEFAULT_ROUTES_COMMAND.iter().map(|s| s.to_string()).collect(),
            socket_env: DEFAULT_SOCKET_ENV.to_string(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Everything the supervisor needs to run.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Extensions (with leading dot) whose changes trigger a restart
    pub exts: Vec<String>,
    /// Directories to watch, relative to `base_dir`; `...` suffix = recursive
    pub dirs: Vec<String>,
    /// Directories never subscribed to, relative to `base_dir`
    pub ignore_dirs: Vec<String>,
    pub build: CommandTemplate,
    pub exec: CommandTemplate,
    /// Working directory of build, exec and route discovery
    pub base_dir: PathBuf,
    /// Where generation binaries and sockets are created
    pub temp_dir: PathBuf,
    pub directives: DirectiveOptions,
    /// Proxy mode; `None` runs the child without a proxy
    pub proxy: Option<ProxyOptions>,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            exts: vec![".go".to_string()],
            dirs: vec!["./".to_string()],
            ignore_dirs: vec![".git".to_string()],
            build: CommandTemplate::new(["go", "build", "-o", "{outpath}", "./"]),
            exec: CommandTemplate::new(["{outpath}"]),
            base_dir: PathBuf::from("."),
            temp_dir: std::env::temp_dir(),
            directives: DirectiveOptions::default(),
            proxy: None,
        }
    }
}

impl SupervisorOptions {
    /// Watch configuration resolved against the base directory.
    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig::new(&self.base_dir, &self.dirs, &self.ignore_dirs, &self.exts)
    }
}
