//! Socket-creation readiness gate.

use crate::error::ProxyError;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Waits for the child to create its listen socket.
///
/// Subscribe before the child is spawned so the creation event cannot be
/// missed; the watch on the socket directory ends when the gate is dropped.
pub struct ReadinessGate {
    socket: PathBuf,
    _watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl ReadinessGate {
    /// Start watching the socket's parent directory.
    pub fn subscribe(socket: &Path) -> Result<Self, ProxyError> {
        let dir = socket
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let readiness_err = |source| ProxyError::Readiness {
            path: dir.to_path_buf(),
            source,
        };

        let (tx, events) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })
        .map_err(readiness_err)?;
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(readiness_err)?;
        info!(directory = %dir.display(), "watching directory");

        Ok(Self {
            socket: socket.to_path_buf(),
            _watcher: watcher,
            events,
        })
    }

    /// Resolve once the socket exists. Returns `false` if `token` is
    /// cancelled first or the watcher stops.
    pub async fn wait(mut self, token: &CancellationToken) -> bool {
        if self.socket.exists() {
            return true;
        }
        loop {
            let event = tokio::select! {
                _ = token.cancelled() => return false,
                event = self.events.recv() => event,
            };
            match event {
                Some(Ok(event)) if self.is_creation(&event) => {
                    debug!(socket = %self.socket.display(), "socket created");
                    return true;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => warn!(error = %e, "readiness watcher error"),
                None => {
                    info!("watcher is closed");
                    return false;
                }
            }
        }
    }

    fn is_creation(&self, event: &Event) -> bool {
        matches!(event.kind, EventKind::Create(_))
            && event
                .paths
                .iter()
                .any(|path| path.file_name() == self.socket.file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ready_on_creation() {
        let temp = TempDir::new().unwrap();
        let socket = temp.path().join("gen.sock");
        let gate = ReadinessGate::subscribe(&socket).unwrap();

        let path = socket.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            std::fs::write(path, b"").unwrap();
        });

        let token = CancellationToken::new();
        let ready = tokio::time::timeout(Duration::from_secs(10), gate.wait(&token))
            .await
            .unwrap();
        assert!(ready);
    }

    #[tokio::test]
    async fn test_other_files_do_not_open_gate() {
        let temp = TempDir::new().unwrap();
        let socket = temp.path().join("gen.sock");
        let gate = ReadinessGate::subscribe(&socket).unwrap();
        std::fs::write(temp.path().join("other.sock"), b"").unwrap();

        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            cancel.cancel();
        });
        assert!(!gate.wait(&token).await);
    }

    #[tokio::test]
    async fn test_existing_socket_is_ready() {
        let temp = TempDir::new().unwrap();
        let socket = temp.path().join("gen.sock");
        let gate = ReadinessGate::subscribe(&socket).unwrap();
        std::fs::write(&socket, b"").unwrap();

        assert!(gate.wait(&CancellationToken::new()).await);
    }

    #[test]
    fn test_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let socket = temp.path().join("missing/gen.sock");
        let err = ReadinessGate::subscribe(&socket).err().unwrap();
        assert!(matches!(err, ProxyError::Readiness { .. }));
    }
}
