//! Build/exec pipeline for one generation.

use crate::command::{self, CommandTemplate};
use crate::error::GenerationError;
use crate::options::{ProxyOptions, SupervisorOptions};
use crate::proxy::{ProxyHandover, ReadinessGate};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// One build+exec attempt with its own artifact paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    name: String,
    output_path: PathBuf,
    socket_path: Option<PathBuf>,
}

impl Generation {
    /// Mint a generation with a random name under `temp_dir`.
    pub fn new(temp_dir: &Path, with_socket: bool) -> Self {
        let name = Uuid::new_v4().simple().to_string();
        Self {
            output_path: temp_dir.join(&name),
            socket_path: with_socket.then(|| temp_dir.join(format!("{name}.sock"))),
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path substituted for the output placeholder.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Private socket path; only set in proxy mode.
    pub fn socket_path(&self) -> Option<&Path> {
        self.socket_path.as_deref()
    }
}

/// Removes a generation artifact when dropped.
struct ArtifactGuard(PathBuf);

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        remove_artifact(&self.0);
    }
}

fn remove_artifact(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed artifact"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove artifact"),
    }
}

/// Builds and runs generations.
#[derive(Debug, Clone)]
pub struct Pipeline {
    build: CommandTemplate,
    exec: CommandTemplate,
    base_dir: PathBuf,
    proxy: Option<ProxyOptions>,
}

impl Pipeline {
    pub fn new(options: &SupervisorOptions) -> Self {
        Self {
            build: options.build.clone(),
            exec: options.exec.clone(),
            base_dir: options.base_dir.clone(),
            proxy: options.proxy.clone(),
        }
    }

    /// Whether generations need a private socket.
    pub fn proxy_mode(&self) -> bool {
        self.proxy.is_some()
    }

    /// Build, then run the executable until it exits or `token` is cancelled.
    ///
    /// The output binary and socket are removed when this returns, whatever
    /// the outcome. In proxy mode the generation's proxy is spawned on
    /// `tracker` before the child starts.
    pub async fn run(
        &self,
        generation: &Generation,
        token: &CancellationToken,
        tracker: &TaskTracker,
    ) -> Result<(), GenerationError> {
        let output = generation.output_path();
        let _output_guard = ArtifactGuard(output.to_path_buf());

        let build = self.build.render(output);
        info!(command = ?build, "building command");
        command::run(&build, &self.base_dir, &[], token)
            .await
            .map_err(|source| GenerationError::Build {
                command: build.clone(),
                source,
            })?;

        let mut env = Vec::new();
        let _socket_guard = match (&self.proxy, generation.socket_path()) {
            (Some(proxy), Some(socket)) => {
                // A leftover file would satisfy readiness before the child binds.
                remove_artifact(socket);
                let guard = ArtifactGuard(socket.to_path_buf());
                env.push((proxy.socket_env.clone(), OsString::from(socket)));
                self.spawn_proxy(proxy, socket, token, tracker);
                Some(guard)
            }
            _ => None,
        };

        let exec = self.exec.render(output);
        info!(command = ?exec, "executing command");
        command::run(&exec, &self.base_dir, &env, token)
            .await
            .map_err(|source| GenerationError::Exec {
                command: exec,
                source,
            })
    }

    fn spawn_proxy(
        &self,
        proxy: &ProxyOptions,
        socket: &Path,
        token: &CancellationToken,
        tracker: &TaskTracker,
    ) {
        let gate = match ReadinessGate::subscribe(socket) {
            Ok(gate) => gate,
            Err(e) => {
                error!(error = %e, "failed to start proxy server");
                return;
            }
        };
        let handover = ProxyHandover::new(proxy.clone(), self.base_dir.clone(), socket);
        let token = token.clone();
        tracker.spawn(async move {
            if let Err(e) = handover.run(gate, token).await {
                error!(error = %e, "failed to start proxy server");
            }
        });
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pipeline(base: &Path, build: &str, exec: &str) -> Pipeline {
        let options = SupervisorOptions {
            build: CommandTemplate::new(["sh", "-c", build, "build", "{outpath}"]),
            exec: CommandTemplate::new(["sh", "-c", exec, "exec", "{outpath}"]),
            base_dir: base.to_path_buf(),
            temp_dir: base.to_path_buf(),
            ..SupervisorOptions::default()
        };
        Pipeline::new(&options)
    }

    #[test]
    fn test_generation_paths() {
        let with_socket = Generation::new(Path::new("/tmp/respawn"), true);
        assert_eq!(with_socket.output_path(), Path::new("/tmp/respawn").join(with_socket.name()));
        assert_eq!(
            with_socket.socket_path().unwrap(),
            Path::new("/tmp/respawn").join(format!("{}.sock", with_socket.name()))
        );

        let plain = Generation::new(Path::new("/tmp/respawn"), false);
        assert!(plain.socket_path().is_none());
        assert_ne!(plain.name(), with_socket.name());
    }

    #[tokio::test]
    async fn test_output_removed_after_success() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(temp.path(), "echo bin > \"$1\"", "test -f \"$1\"");
        let generation = Generation::new(temp.path(), false);

        pipeline
            .run(&generation, &CancellationToken::new(), &TaskTracker::new())
            .await
            .unwrap();
        assert!(!generation.output_path().exists());
    }

    #[tokio::test]
    async fn test_output_removed_after_exec_failure() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(temp.path(), "echo bin > \"$1\"", "exit 2");
        let generation = Generation::new(temp.path(), false);

        let err = pipeline
            .run(&generation, &CancellationToken::new(), &TaskTracker::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Exec { .. }));
        assert!(!err.is_expected_noise());
        assert!(!generation.output_path().exists());
    }

    #[tokio::test]
    async fn test_partial_output_removed_after_build_failure() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(temp.path(), "echo partial > \"$1\"; exit 1", "true");
        let generation = Generation::new(temp.path(), false);

        let err = pipeline
            .run(&generation, &CancellationToken::new(), &TaskTracker::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Build { .. }));
        assert!(!generation.output_path().exists());
    }

    #[tokio::test]
    async fn test_exec_runs_in_base_dir() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(temp.path(), "true", "touch ran-here");
        let generation = Generation::new(temp.path(), false);

        pipeline
            .run(&generation, &CancellationToken::new(), &TaskTracker::new())
            .await
            .unwrap();
        assert!(temp.path().join("ran-here").exists());
    }

    #[tokio::test]
    async fn test_socket_env_is_injected() {
        let temp = TempDir::new().unwrap();
        let mut options = SupervisorOptions {
            build: CommandTemplate::new(["true"]),
            exec: CommandTemplate::new([
                "sh",
                "-c",
                "test -n \"$RESPAWN_UDS_PATH\" && echo \"$RESPAWN_UDS_PATH\" > socket-env",
            ]),
            base_dir: temp.path().to_path_buf(),
            temp_dir: temp.path().to_path_buf(),
            ..SupervisorOptions::default()
        };
        let mut proxy = ProxyOptions::new("127.0.0.1:0");
        // Route discovery fails fast; the child still runs.
        proxy.routes_command = vec!["false".to_string()];
        options.proxy = Some(proxy);

        let pipeline = Pipeline::new(&options);
        let generation = Generation::new(temp.path(), pipeline.proxy_mode());
        let tracker = TaskTracker::new();
        pipeline
            .run(&generation, &CancellationToken::new(), &tracker)
            .await
            .unwrap();
        tracker.close();
        tracker.wait().await;

        let recorded = std::fs::read_to_string(temp.path().join("socket-env")).unwrap();
        assert_eq!(recorded.trim(), generation.socket_path().unwrap().to_str().unwrap());
    }
}
