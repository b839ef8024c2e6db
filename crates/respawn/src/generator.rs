//! Code generator discovery and execution.
//!
//! Source files may carry directive lines naming a code generation command.
//! Discovered commands are collected in a [`GeneratorRegistry`] during the
//! initial walk and re-run before every build.

use crate::command;
use crate::error::{Error, GenerationError};
use crate::options::DirectiveOptions;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A generation command discovered in a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorCommand {
    argv: Vec<String>,
    dir: PathBuf,
}

impl GeneratorCommand {
    pub fn new(argv: Vec<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            argv,
            dir: dir.into(),
        }
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Directory the command runs in (the directive's source directory).
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deduplication key: argument vector plus directory.
    pub fn identity(&self) -> String {
        self.to_string()
    }

    /// Run the command to completion with inherited stdio.
    pub async fn run(&self, token: &CancellationToken) -> Result<(), GenerationError> {
        info!(command = ?self.argv, dir = %self.dir.display(), "running generator");
        command::run(&self.argv, &self.dir, &[], token)
            .await
            .map_err(|source| GenerationError::Generator {
                command: self.argv.clone(),
                source,
            })
    }
}

impl fmt::Display for GeneratorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command: {:?}, dir: {}", self.argv, self.dir.display())
    }
}

/// Concurrency-safe set of discovered generator commands.
///
/// Insertion order is preserved so generators run in discovery order.
/// Entries are never removed within a run.
#[derive(Debug, Default)]
pub struct GeneratorRegistry {
    commands: RwLock<IndexMap<String, GeneratorCommand>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a command. Returns `false` if an identical one was already present.
    pub fn register(&self, command: GeneratorCommand) -> bool {
        let identity = command.identity();
        let mut commands = self.commands.write();
        if commands.contains_key(&identity) {
            return false;
        }
        info!(generator = %identity, "detect generator");
        commands.insert(identity, command);
        true
    }

    pub fn len(&self) -> usize {
        self.commands.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.read().is_empty()
    }

    /// Current commands, copied out under the read lock.
    pub fn snapshot(&self) -> Vec<GeneratorCommand> {
        self.commands.read().values().cloned().collect()
    }

    /// Run every registered generator sequentially; the first failure aborts.
    pub async fn run_all(&self, token: &CancellationToken) -> Result<(), GenerationError> {
        for generator in self.snapshot() {
            generator.run(token).await?;
        }
        Ok(())
    }
}

/// Extract a generator argv from one source line.
///
/// The tokens after the directive marker (the first token) form the
/// command. The first token after `prefix` names the generator and must be
/// on the allow-list; anything else is ignored.
pub fn parse_directive(line: &str, options: &DirectiveOptions) -> Option<Vec<String>> {
    let rest = line.strip_prefix(options.prefix.as_str())?;
    let target = rest.split_whitespace().next()?;
    if !options.allow.contains(target) {
        return None;
    }
    let argv: Vec<String> = line.split_whitespace().skip(1).map(str::to_string).collect();
    (!argv.is_empty()).then_some(argv)
}

/// Scan `path` line by line and register every allowed directive.
///
/// Returns the number of directives found. Stops early, without error,
/// once `token` is cancelled.
pub fn scan_file(
    path: &Path,
    options: &DirectiveOptions,
    registry: &GeneratorRegistry,
    token: &CancellationToken,
) -> Result<usize, Error> {
    let scan_err = |source| Error::Scan {
        path: path.to_path_buf(),
        source,
    };
    let reader = BufReader::new(File::open(path).map_err(scan_err)?);
    let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();

    let mut found = 0;
    // Source files need not be UTF-8; only directive lines have to be.
    for line in reader.split(b'\n') {
        if token.is_cancelled() {
            break;
        }
        let mut line = line.map_err(scan_err)?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if let Some(argv) = parse_directive(&String::from_utf8_lossy(&line), options) {
            found += 1;
            registry.register(GeneratorCommand::new(argv, dir.clone()));
        }
    }
    if found > 0 {
        debug!(file = %path.display(), directives = found, "scanned generator directives");
    }
    Ok(found)
}
