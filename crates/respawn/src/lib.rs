//! Development-time process supervisor with live reverse-proxy handover.
//!
//! `respawn` watches a source tree, rebuilds and restarts a server process
//! whenever a watched file changes, and can front that server with a
//! reverse proxy that forwards the server's own routes over a private
//! per-generation Unix socket.
//!
//! # Example
//!
//! ```no_run
//! use respawn::{CommandTemplate, SupervisorOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> respawn::Result<()> {
//! let options = SupervisorOptions {
//!     exts: vec![".rs".to_string()],
//!     dirs: vec!["src/...".to_string()],
//!     build: CommandTemplate::parse("cargo build"),
//!     exec: CommandTemplate::parse("target/debug/server"),
//!     ..SupervisorOptions::default()
//! };
//! respawn::run(options, CancellationToken::new()).await
//! # }
//! ```

pub mod command;
pub mod error;
pub mod generator;
pub mod options;
pub mod pipeline;
pub mod proxy;
pub mod supervisor;
pub mod watch;

pub use command::{CommandTemplate, OUTPUT_PLACEHOLDER};
pub use error::{CommandError, Error, GenerationError, ProxyError, Result};
pub use generator::{GeneratorCommand, GeneratorRegistry};
pub use options::{DirectiveOptions, ProxyOptions, SupervisorOptions, WatchConfig, WatchRoot};
pub use pipeline::{Generation, Pipeline};
pub use supervisor::{Supervisor, SupervisorEvent, SupervisorSignal, SupervisorState};

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use watch::{FileEventDispatcher, WatchSetBuilder};

/// Capacity of the raw notification channel between watcher and dispatcher.
const WATCH_EVENT_BUFFER: usize = 100;

/// A configured supervisor run.
pub struct Respawn {
    options: SupervisorOptions,
    events: Option<mpsc::UnboundedSender<SupervisorEvent>>,
}

impl Respawn {
    pub fn new(options: SupervisorOptions) -> Self {
        Self {
            options,
            events: None,
        }
    }

    /// Report supervisor lifecycle events on `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<SupervisorEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Establish the watch set, then supervise generations until `token` is cancelled.
    ///
    /// Only startup failures are returned; generation and proxy failures are
    /// logged and handled by the supervisor.
    pub async fn run(self, token: CancellationToken) -> Result<()> {
        let options = self.options;
        tokio::fs::create_dir_all(&options.temp_dir)
            .await
            .map_err(|source| Error::TempDir {
                path: options.temp_dir.clone(),
                source,
            })?;

        let registry = Arc::new(GeneratorRegistry::new());
        let config = options.watch_config();

        let (events_tx, events_rx) = mpsc::channel(WATCH_EVENT_BUFFER);
        let (restart_tx, restart_rx) = mpsc::channel(1);

        let mut watcher = watch::watcher(events_tx)?;
        // The walk itself raises events in subscribed directories; drain them
        // from the start so the watcher thread never blocks mid-walk.
        let dispatcher = tokio::spawn(FileEventDispatcher::new(&config, restart_tx).run(events_rx));

        let builder = WatchSetBuilder::new(
            config.clone(),
            options.directives.clone(),
            registry.clone(),
            token.clone(),
        );
        let (watcher, summary) = tokio::task::spawn_blocking(move || {
            builder.build(&mut watcher).map(|summary| (watcher, summary))
        })
        .await??;
        info!(
            directories = summary.subscribed.len(),
            generators = registry.len(),
            "watch set ready"
        );

        let mut supervisor = Supervisor::new(&options, registry);
        if let Some(tx) = self.events {
            supervisor = supervisor.with_events(tx);
        }
        supervisor.run(restart_rx, token).await;

        // Dropping the watcher closes the notification channel.
        drop(watcher);
        dispatcher.await?;
        Ok(())
    }
}

/// Run the supervisor with `options` until `token` is cancelled.
pub async fn run(options: SupervisorOptions, token: CancellationToken) -> Result<()> {
    Respawn::new(options).run(token).await
}
