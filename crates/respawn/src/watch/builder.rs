//! Startup walk over the configured watch roots.

use crate::error::{Error, Result};
use crate::generator::{GeneratorRegistry, scan_file};
use crate::options::{DirectiveOptions, WatchConfig, WatchRoot, dotted_extension};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use path_clean::PathClean;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Something directories can be registered with for change notifications.
pub trait Subscriber {
    /// Subscribe to changes of the entries directly inside `dir`.
    fn subscribe(&mut self, dir: &Path) -> notify::Result<()>;
}

impl Subscriber for RecommendedWatcher {
    fn subscribe(&mut self, dir: &Path) -> notify::Result<()> {
        self.watch(dir, RecursiveMode::NonRecursive)
    }
}

/// What the startup walk did.
#[derive(Debug, Default, Clone)]
pub struct WatchSetSummary {
    /// Directories subscribed to, in walk order
    pub subscribed: Vec<PathBuf>,
    /// Ignored directories that were scanned but not subscribed to
    pub ignored: Vec<PathBuf>,
    /// Generator directives found across all scanned files
    pub directives: usize,
}

/// Walks the watch roots once, scanning for directives and subscribing.
///
/// Every visited directory has its files scanned for generator directives
/// first. Only then is the ignore set consulted: an ignored directory is
/// neither subscribed to nor descended into.
pub struct WatchSetBuilder {
    config: WatchConfig,
    directives: DirectiveOptions,
    registry: Arc<GeneratorRegistry>,
    token: CancellationToken,
}

impl WatchSetBuilder {
    pub fn new(
        config: WatchConfig,
        directives: DirectiveOptions,
        registry: Arc<GeneratorRegistry>,
        token: CancellationToken,
    ) -> Self {
        Self {
            config,
            directives,
            registry,
            token,
        }
    }

    /// Walk every root in declaration order.
    ///
    /// Any unreadable directory or failed subscription aborts the walk.
    pub fn build<S: Subscriber>(&self, subscriber: &mut S) -> Result<WatchSetSummary> {
        let mut summary = WatchSetSummary::default();
        for root in &self.config.roots {
            if self.token.is_cancelled() {
                break;
            }
            if root.recursive {
                self.walk_tree(root, subscriber, &mut summary)?;
            } else {
                self.visit_dir(&root.path, subscriber, &mut summary)?;
            }
        }
        debug!(
            subscribed = summary.subscribed.len(),
            ignored = summary.ignored.len(),
            directives = summary.directives,
            "watch set established"
        );
        Ok(summary)
    }

    fn walk_tree<S: Subscriber>(
        &self,
        root: &WatchRoot,
        subscriber: &mut S,
        summary: &mut WatchSetSummary,
    ) -> Result<()> {
        let metadata = std::fs::metadata(&root.path).map_err(|source| Error::ReadDir {
            path: root.path.clone(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(Error::NotADirectory(root.path.clone()));
        }

        let mut walker = WalkDir::new(&root.path).sort_by_file_name().into_iter();
        while let Some(entry) = walker.next() {
            if self.token.is_cancelled() {
                return Ok(());
            }
            let entry = entry.map_err(|source| Error::Walk {
                path: root.path.clone(),
                source,
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            // walkdir joins onto the root verbatim ("./.git"); the ignore set is cleaned.
            let dir = entry.path().to_path_buf().clean();
            if !self.visit_dir(&dir, subscriber, summary)? {
                walker.skip_current_dir();
            }
        }
        Ok(())
    }

    /// Scan one directory's files, then subscribe unless ignored.
    ///
    /// Returns whether the walk should descend into `dir`.
    fn visit_dir<S: Subscriber>(
        &self,
        dir: &Path,
        subscriber: &mut S,
        summary: &mut WatchSetSummary,
    ) -> Result<bool> {
        let read_err = |source| Error::ReadDir {
            path: dir.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            if entry.file_type().map_err(read_err)?.is_dir() {
                continue;
            }
            let path = entry.path();
            if dotted_extension(&path) == Some(self.directives.file_ext.as_str()) {
                files.push(path);
            }
        }
        files.sort();
        for file in &files {
            summary.directives += scan_file(file, &self.directives, &self.registry, &self.token)?;
        }

        if self.config.is_ignored(dir) {
            debug!(directory = %dir.display(), "ignoring directory");
            summary.ignored.push(dir.to_path_buf());
            return Ok(false);
        }

        subscriber.subscribe(dir).map_err(|source| Error::Subscribe {
            path: dir.to_path_buf(),
            source,
        })?;
        info!(directory = %dir.display(), "watching directory");
        summary.subscribed.push(dir.to_path_buf());
        Ok(true)
    }
}
