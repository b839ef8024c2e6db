//! Run command implementation.
//!
//! Loads the configuration, installs the shutdown signal handlers and runs
//! the supervisor until one of them fires. Supervisor lifecycle events are
//! turned into status lines as they arrive.

use crate::cli::RunArgs;
use crate::config::{Overrides, RespawnConfig};
use crate::error::{Result, ResultExt};
use crate::logger::Logging;
use crate::ui;
use respawn::{Respawn, SupervisorEvent, SupervisorOptions};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Execute the run command.
///
/// Returns `Ok(())` once a shutdown signal stopped the supervisor. Only
/// configuration and startup failures are errors; failing generations are
/// reported and the supervisor keeps waiting for file changes.
pub async fn execute(args: RunArgs, logging: Logging) -> Result<()> {
    let config = RespawnConfig::load(&Overrides::from(&args), args.config.as_deref())?;
    logging.init(config.log_level);
    config.validate()?;

    let options = config.into_options();
    print_banner(&options);

    let token = CancellationToken::new();
    let signals = ShutdownSignals::install().context("Failed to install signal handlers")?;
    let signal_task = tokio::spawn({
        let token = token.clone();
        async move {
            let name = signals.recv().await;
            tracing::info!(signal = name, "shutting down");
            token.cancel();
        }
    });

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let reporter = tokio::spawn(report_events(events_rx));

    let result = Respawn::new(options)
        .with_events(events_tx)
        .run(token)
        .await;

    signal_task.abort();
    // The event channel closes with the supervisor.
    if let Err(e) = reporter.await {
        tracing::debug!(error = %e, "event reporter stopped");
    }

    result?;
    ui::success("Stopped");
    Ok(())
}

fn print_banner(options: &SupervisorOptions) {
    ui::info(&format!(
        "Watching {} for {} changes",
        options.dirs.join(", "),
        options.exts.join(", ")
    ));
    ui::info(&format!("Build: {}", options.build.args().join(" ")));
    ui::info(&format!("Exec: {}", options.exec.args().join(" ")));
    if let Some(proxy) = &options.proxy {
        let target = proxy.catch_all.as_deref().unwrap_or("404");
        ui::info(&format!(
            "Proxying {} (unmatched requests: {})",
            proxy.addr, target
        ));
    }
}

/// A status line derived from a supervisor event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Info(String),
    Warning(String),
    Error(String),
}

impl Status {
    fn print(&self) {
        match self {
            Status::Info(message) => ui::info(message),
            Status::Warning(message) => ui::warning(message),
            Status::Error(message) => ui::error(message),
        }
    }
}

/// Turns supervisor events into status lines.
///
/// Remembers when the current generation started so exits and failures
/// can report its uptime.
#[derive(Debug, Default)]
pub struct EventReporter {
    current: Option<(String, Instant)>,
}

impl EventReporter {
    pub fn status(&mut self, event: SupervisorEvent) -> Option<Status> {
        match event {
            SupervisorEvent::GenerationStarted { name, .. } => {
                let status = Status::Info(format!("Starting generation {}", ui::short_name(&name)));
                self.current = Some((name, Instant::now()));
                Some(status)
            }
            SupervisorEvent::GenerationExited { name } => Some(Status::Warning(format!(
                "Generation {} exited{}, waiting for a file change",
                ui::short_name(&name),
                self.uptime(&name)
            ))),
            SupervisorEvent::GenerationFailed { name, error } => Some(Status::Error(format!(
                "Generation {} failed{}: {}\n  waiting for a file change",
                ui::short_name(&name),
                self.uptime(&name),
                error
            ))),
            SupervisorEvent::RestartRequested { path } => {
                Some(Status::Info(format!("{} changed, restarting", path.display())))
            }
            SupervisorEvent::Stopped => None,
        }
    }

    fn uptime(&self, name: &str) -> String {
        match &self.current {
            Some((current, started)) if current == name => {
                format!(" after {}", ui::format_duration(started.elapsed()))
            }
            _ => String::new(),
        }
    }
}

async fn report_events(mut events: mpsc::UnboundedReceiver<SupervisorEvent>) {
    let mut reporter = EventReporter::default();
    while let Some(event) = events.recv().await {
        if let Some(status) = reporter.status(event) {
            status.print();
        }
    }
}

/// Signals that stop the supervisor.
#[cfg(unix)]
struct ShutdownSignals {
    hangup: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self {
            hangup: signal(SignalKind::hangup())?,
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    /// Wait for the first signal and return its name.
    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.hangup.recv() => "SIGHUP",
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.quit.recv() => "SIGQUIT",
        }
    }
}

#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(self) -> &'static str {
        let _ = tokio::signal::ctrl_c().await;
        "Ctrl-C"
    }
}
