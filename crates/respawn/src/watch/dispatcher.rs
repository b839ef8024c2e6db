//! Turns raw filesystem notifications into restart requests.

use super::ChangeKind;
use crate::error::{Error, Result};
use crate::options::WatchConfig;
use notify::{Event, RecommendedWatcher};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info};

/// Create the platform watcher, forwarding every notification into `events`.
///
/// The callback runs on the watcher's own thread and blocks while the
/// channel is full, so the receiver must be drained before any directory
/// is subscribed. Once the receiver is gone notifications are dropped.
pub fn watcher(events: mpsc::Sender<notify::Result<Event>>) -> Result<RecommendedWatcher> {
    notify::recommended_watcher(move |res: notify::Result<Event>| {
        let _ = events.blocking_send(res);
    })
    .map_err(Error::WatcherInit)
}

/// Filters notifications by extension and requests restarts.
///
/// Single consumer of the watcher channel and single producer of the
/// restart channel. The restart channel has one slot; a request made while
/// one is already pending is dropped, so a burst of writes collapses into
/// one restart.
pub struct FileEventDispatcher {
    config: WatchConfig,
    restart_tx: mpsc::Sender<PathBuf>,
}

impl FileEventDispatcher {
    pub fn new(config: &WatchConfig, restart_tx: mpsc::Sender<PathBuf>) -> Self {
        Self {
            config: config.clone(),
            restart_tx,
        }
    }

    /// Handle one notification. Returns whether it requested a restart.
    ///
    /// An event naming several matching paths still requests only one.
    pub fn handle(&self, event: &Event) -> bool {
        if ChangeKind::classify(&event.kind).is_none() {
            return false;
        }
        let Some(path) = event.paths.iter().find(|path| self.config.matches_ext(path)) else {
            return false;
        };

        info!(filename = %path.display(), "modified file");
        match self.restart_tx.try_send(path.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("restart already pending"),
            Err(TrySendError::Closed(_)) => debug!("supervisor has stopped; restart dropped"),
        }
        true
    }

    /// Dispatch until the watcher channel closes.
    ///
    /// Closure is normal shutdown, not an error.
    pub async fn run(self, mut events: mpsc::Receiver<notify::Result<Event>>) {
        while let Some(res) = events.recv().await {
            match res {
                Ok(event) => {
                    debug!(?event, "event");
                    self.handle(&event);
                }
                Err(e) => error!(error = %e, "watcher error"),
            }
        }
        info!("watcher is closed");
    }
}
