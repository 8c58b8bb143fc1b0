//! Signal intake and the one-shot TerminateAll sequence.

use events::{Event, EventBus};
use stackup_core::ShutdownConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use supervisor::{ShutdownReport, TerminationOutcome, TerminationPolicy};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::{OrchestratorError, Result};
use crate::steps::SharedSupervisor;

/// Why shutdown began.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C / SIGINT
    Interrupt,
    /// SIGHUP, the terminal went away
    Hangup,
    /// SIGTERM
    Terminate,
    /// A fatal step aborted startup
    StartupFailed,
    /// Nothing can deliver signals any more
    ListenerClosed,
}

impl ShutdownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interrupt => "interrupt",
            Self::Hangup => "hangup",
            Self::Terminate => "terminate",
            Self::StartupFailed => "startup_failed",
            Self::ListenerClosed => "listener_closed",
        }
    }
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the process signal handlers and forward every delivery to the
/// returned channel. Handlers are registered before this returns.
pub fn listen_for_signals() -> Result<mpsc::Receiver<ShutdownReason>> {
    let (tx, rx) = mpsc::channel(8);

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt()).map_err(OrchestratorError::Signal)?;
        let mut hangup = signal(SignalKind::hangup()).map_err(OrchestratorError::Signal)?;
        let mut terminate = signal(SignalKind::terminate()).map_err(OrchestratorError::Signal)?;

        tokio::spawn(async move {
            loop {
                let reason = tokio::select! {
                    Some(()) = interrupt.recv() => ShutdownReason::Interrupt,
                    Some(()) = hangup.recv() => ShutdownReason::Hangup,
                    Some(()) = terminate.recv() => ShutdownReason::Terminate,
                    else => break,
                };
                info!(reason = %reason, "Received signal");
                if tx.try_send(reason).is_err() && tx.is_closed() {
                    break;
                }
            }
        });
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                    break;
                }
                info!("Received Ctrl+C");
                if tx.try_send(ShutdownReason::Interrupt).is_err() && tx.is_closed() {
                    break;
                }
            }
        });
    }

    Ok(rx)
}

/// Runs TerminateAll exactly once, however many times it is asked.
pub struct ShutdownCoordinator {
    supervisor: SharedSupervisor,
    policy: TerminationPolicy,
    hard_timeout: Duration,
    events: EventBus,
    in_progress: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new(supervisor: SharedSupervisor, config: &ShutdownConfig, events: EventBus) -> Self {
        Self {
            supervisor,
            policy: TerminationPolicy::new(config.grace_period(), config.force_wait()),
            hard_timeout: config.hard_timeout(),
            events,
            in_progress: AtomicBool::new(false),
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Terminate every tracked process, newest first.
    ///
    /// Only the first caller does the work; later callers get `None` and a
    /// "already in progress" event. The whole sequence is bounded by the
    /// hard timeout: whatever is left when it expires is killed without
    /// waiting and reported unresponsive.
    pub async fn shutdown(&self, reason: ShutdownReason) -> Option<ShutdownReport> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!(reason = %reason, "Shutdown already in progress");
            self.events.emit(Event::ShutdownAlreadyInProgress {
                reason: reason.as_str().to_string(),
            });
            return None;
        }

        info!(reason = %reason, "Shutting down");
        self.events.emit(Event::ShutdownStarted {
            reason: reason.as_str().to_string(),
        });

        let deadline = tokio::time::Instant::now() + self.hard_timeout;
        let mut report = ShutdownReport::default();
        let mut supervisor = self.supervisor.lock().await;

        while let Some(name) = supervisor.newest().map(str::to_string) {
            match tokio::time::timeout_at(deadline, supervisor.terminate_newest(&self.policy)).await
            {
                Ok(Some(entry)) => report.outcomes.push(entry),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        service = %name,
                        timeout_secs = self.hard_timeout.as_secs(),
                        "Shutdown deadline reached"
                    );
                    // Dropping the timed-out future released `name` with a forced kill.
                    report
                        .outcomes
                        .push((name, TerminationOutcome::Unresponsive));
                    for abandoned in supervisor.abandon_all() {
                        report
                            .outcomes
                            .push((abandoned, TerminationOutcome::Unresponsive));
                    }
                    break;
                }
            }
        }
        drop(supervisor);

        info!(
            terminated = report.terminated_count(),
            forced = report.forced_count(),
            "Shutdown complete"
        );
        self.events.emit(Event::ShutdownCompleted {
            terminated: report.terminated_count(),
            forced: report.forced_count(),
            unresponsive: report.unresponsive(),
        });

        Some(report)
    }
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("policy", &self.policy)
            .field("hard_timeout", &self.hard_timeout)
            .field("in_progress", &self.is_in_progress())
            .finish()
    }
}
