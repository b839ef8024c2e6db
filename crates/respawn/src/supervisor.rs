//! Generation state machine.
//!
//! One loop iteration per generation:
//!
//! 1. Unless backing off, start a generation under a child token: run the
//!    registered generators, then the build/exec pipeline.
//! 2. Wait for the run token, a restart request, or a failure of the
//!    current generation.
//! 3. Retire the generation: cancel its token and wait until its child has
//!    been reaped and its proxy has released the external address.
//!
//! A failure sets the skip-start flag, so the next generation only starts
//! once a file change is observed.

use crate::generator::GeneratorRegistry;
use crate::options::SupervisorOptions;
use crate::pipeline::{Generation, Pipeline};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

/// Signals that end the wait of an iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorSignal {
    /// A watched file changed
    RestartRequested(PathBuf),
    /// The named generation failed
    GenerationFailed(String),
}

/// States of the loop, reported in debug logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    StartingGeneration,
    AwaitingSignal,
    Cancelled,
}

/// Lifecycle notifications for front ends and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// A generation began running generators and building
    GenerationStarted { name: String, output_path: PathBuf },
    /// The generation's executable exited successfully on its own
    GenerationExited { name: String },
    /// The generation failed; restarts wait for a file change
    GenerationFailed { name: String, error: String },
    /// A file change superseded the current generation
    RestartRequested { path: PathBuf },
    /// The run token was cancelled and the last generation retired
    Stopped,
}

#[derive(Debug, Clone, Default)]
struct EventSink(Option<mpsc::UnboundedSender<SupervisorEvent>>);

impl EventSink {
    fn emit(&self, event: SupervisorEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }
}

/// Orchestrates generations. At most one is alive at any time.
pub struct Supervisor {
    registry: Arc<GeneratorRegistry>,
    pipeline: Arc<Pipeline>,
    temp_dir: PathBuf,
    events: EventSink,
}

impl Supervisor {
    pub fn new(options: &SupervisorOptions, registry: Arc<GeneratorRegistry>) -> Self {
        Self {
            registry,
            pipeline: Arc::new(Pipeline::new(options)),
            temp_dir: options.temp_dir.clone(),
            events: EventSink::default(),
        }
    }

    /// Report lifecycle events on `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<SupervisorEvent>) -> Self {
        self.events = EventSink(Some(tx));
        self
    }

    /// Run until `token` is cancelled.
    ///
    /// `restarts` is the single-slot channel fed by the file event
    /// dispatcher. If it closes, only cancellation ends the loop.
    pub async fn run(self, mut restarts: mpsc::Receiver<PathBuf>, token: CancellationToken) {
        // Single producer per generation task, single consumer here.
        let (failed_tx, mut failed_rx) = mpsc::channel::<String>(1);
        let mut skip_start = false;
        let mut restarts_open = true;

        loop {
            let generation_token = token.child_token();
            let current = if skip_start {
                None
            } else {
                debug!(state = ?SupervisorState::StartingGeneration);
                Some(self.start_generation(generation_token.clone(), failed_tx.clone()))
            };

            debug!(state = ?SupervisorState::AwaitingSignal);
            let signal = loop {
                tokio::select! {
                    _ = token.cancelled() => break None,
                    path = restarts.recv(), if restarts_open => match path {
                        Some(path) => break Some(SupervisorSignal::RestartRequested(path)),
                        None => {
                            debug!("restart channel closed");
                            restarts_open = false;
                        }
                    },
                    Some(name) = failed_rx.recv() => {
                        if current.as_ref().is_some_and(|(current, _)| *current == name) {
                            break Some(SupervisorSignal::GenerationFailed(name));
                        }
                        debug!(generation = %name, "ignoring failure of retired generation");
                    }
                }
            };

            generation_token.cancel();
            if let Some((name, handle)) = current {
                if let Err(e) = handle.await {
                    error!(generation = %name, error = %e, "generation task failed");
                }
            }
            // Failures reported while retiring belong to the old generation.
            while failed_rx.try_recv().is_ok() {}

            match signal {
                None => {
                    debug!(state = ?SupervisorState::Cancelled);
                    self.events.emit(SupervisorEvent::Stopped);
                    break;
                }
                Some(SupervisorSignal::RestartRequested(path)) => {
                    info!(filename = %path.display(), "restarting");
                    self.events.emit(SupervisorEvent::RestartRequested { path });
                    skip_start = false;
                }
                Some(SupervisorSignal::GenerationFailed(name)) => {
                    info!(generation = %name, "waiting for a file change before restarting");
                    skip_start = true;
                }
            }
        }
    }

    fn start_generation(
        &self,
        token: CancellationToken,
        failed_tx: mpsc::Sender<String>,
    ) -> (String, JoinHandle<()>) {
        let generation = Generation::new(&self.temp_dir, self.pipeline.proxy_mode());
        let name = generation.name().to_string();
        self.events.emit(SupervisorEvent::GenerationStarted {
            name: name.clone(),
            output_path: generation.output_path().to_path_buf(),
        });

        let registry = self.registry.clone();
        let pipeline = self.pipeline.clone();
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            let tracker = TaskTracker::new();
            let result = match registry.run_all(&token).await {
                Ok(()) => pipeline.run(&generation, &token, &tracker).await,
                Err(e) => Err(e),
            };

            let name = generation.name().to_string();
            match result {
                Ok(()) => {
                    info!(generation = %name, "command exited");
                    events.emit(SupervisorEvent::GenerationExited { name });
                }
                Err(e) if e.is_expected_noise() || token.is_cancelled() => {
                    debug!(generation = %name, error = %e, "generation cancelled");
                }
                Err(e) => {
                    error!(
                        generation = %name,
                        command = ?e.command(),
                        error = %e,
                        "generation failed"
                    );
                    events.emit(SupervisorEvent::GenerationFailed {
                        name: name.clone(),
                        error: e.to_string(),
                    });
                    let _ = failed_tx.try_send(name);
                }
            }

            // The proxy serves until the generation is retired.
            tracker.close();
            tracker.wait().await;
        });
        (name, handle)
    }
}
