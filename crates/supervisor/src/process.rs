use chrono::{DateTime, Utc};
use stackup_core::ProcessState;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::output::OutputTail;
use crate::signal;
use crate::state_machine::ProcessStateMachine;
use crate::strategy::SpawnedChild;

/// How long each termination phase may take.
#[derive(Debug, Clone, Copy)]
pub struct TerminationPolicy {
    /// Time allowed to exit after the graceful request
    pub grace_period: Duration,
    /// Time allowed to exit after the forced kill
    pub force_wait: Duration,
}

impl TerminationPolicy {
    pub fn new(grace_period: Duration, force_wait: Duration) -> Self {
        Self {
            grace_period,
            force_wait,
        }
    }
}

/// How a single process left the registry during shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// It had already exited on its own
    AlreadyExited,
    /// It exited within the grace period
    Graceful,
    /// It needed a forced kill
    Forced,
    /// It did not confirm exit even after the forced kill
    Unresponsive,
}

impl TerminationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyExited => "already_exited",
            Self::Graceful => "graceful",
            Self::Forced => "forced",
            Self::Unresponsive => "unresponsive",
        }
    }
}

/// Read-only snapshot of a tracked process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub name: String,
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub state: ProcessState,
}

/// One spawned child, owned by the supervisor.
#[derive(Debug)]
pub struct ServiceProcess {
    name: String,
    pid: Option<u32>,
    started_at: DateTime<Utc>,
    state: ProcessState,
    exit_status: Option<ExitStatus>,
    process_group: bool,
    output: Option<OutputTail>,
    child: Child,
}

impl ServiceProcess {
    pub(crate) fn new(name: impl Into<String>, spawned: SpawnedChild) -> Self {
        let mut process = Self {
            name: name.into(),
            pid: spawned.child.id(),
            started_at: Utc::now(),
            state: ProcessState::Spawned,
            exit_status: None,
            process_group: spawned.process_group,
            output: spawned.output,
            child: spawned.child,
        };
        // Liveness is all the supervisor knows about; readiness is someone else's job.
        process.transition(ProcessState::Running);
        process
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            name: self.name.clone(),
            pid: self.pid,
            started_at: self.started_at,
            state: self.state,
        }
    }

    /// Human readable exit status, once known.
    pub fn exit_description(&self) -> Option<String> {
        self.exit_status.map(|status| status.to_string())
    }

    pub fn recent_output(&self) -> Vec<String> {
        self.output
            .as_ref()
            .map(OutputTail::lines)
            .unwrap_or_default()
    }

    fn transition(&mut self, to: ProcessState) {
        match ProcessStateMachine::validate_transition(&self.state, &to) {
            Ok(()) => {
                debug!(service = %self.name, from = %self.state, to = %to, "Process state changed");
                self.state = to;
            }
            Err(e) => warn!(service = %self.name, error = %e, "Ignoring process state change"),
        }
    }

    fn mark_exited(&mut self, status: Option<ExitStatus>) {
        if status.is_some() {
            self.exit_status = status;
        }
        if !self.state.is_terminal() {
            self.transition(ProcessState::Exited);
        }
    }

    /// Non-blocking liveness probe. Notices a crash the first time it is
    /// asked after the fact.
    pub fn poll_alive(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }

        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(service = %self.name, %status, "Process has exited");
                self.mark_exited(Some(status));
                false
            }
            Err(e) => {
                warn!(service = %self.name, error = %e, "Failed to query process status");
                self.mark_exited(None);
                false
            }
        }
    }

    /// Last-resort kill with no wait for confirmation.
    fn abandon(&mut self) {
        if let Some(pid) = self.pid {
            if let Err(e) = signal::force_kill(pid, self.process_group) {
                debug!(service = %self.name, pid, error = %e, "Forced kill of process tree failed");
            }
        }
        if let Err(e) = self.child.start_kill() {
            debug!(service = %self.name, error = %e, "Forced kill of child failed");
        }
        warn!(service = %self.name, pid = ?self.pid, "Abandoned process without confirmed exit");
    }

    /// Ask the process to stop, escalating to a forced kill after the grace
    /// period. Every wait is bounded.
    pub async fn terminate(&mut self, policy: &TerminationPolicy) -> TerminationOutcome {
        if !self.poll_alive() {
            return TerminationOutcome::AlreadyExited;
        }

        self.transition(ProcessState::GraceTerminating);
        if let Some(pid) = self.pid {
            if let Err(e) = signal::request_termination(pid, self.process_group) {
                warn!(service = %self.name, pid, error = %e, "Graceful termination request failed");
            }
        }

        match tokio::time::timeout(policy.grace_period, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!(service = %self.name, %status, "Process exited gracefully");
                self.mark_exited(Some(status));
                return TerminationOutcome::Graceful;
            }
            Ok(Err(e)) => {
                warn!(service = %self.name, error = %e, "Failed waiting for graceful exit");
            }
            Err(_) => {
                warn!(
                    service = %self.name,
                    grace_ms = policy.grace_period.as_millis() as u64,
                    "Process ignored termination request, forcing"
                );
            }
        }

        self.transition(ProcessState::ForceTerminating);
        if let Some(pid) = self.pid {
            if let Err(e) = signal::force_kill(pid, self.process_group) {
                debug!(service = %self.name, pid, error = %e, "Forced kill of process tree failed");
            }
        }
        if let Err(e) = self.child.start_kill() {
            debug!(service = %self.name, error = %e, "Forced kill of child failed");
        }

        match tokio::time::timeout(policy.force_wait, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!(service = %self.name, %status, "Process killed");
                self.mark_exited(Some(status));
                TerminationOutcome::Forced
            }
            Ok(Err(e)) => {
                warn!(service = %self.name, error = %e, "Could not confirm exit after forced kill");
                TerminationOutcome::Unresponsive
            }
            Err(_) => {
                warn!(service = %self.name, "Process did not exit after forced kill, giving up");
                TerminationOutcome::Unresponsive
            }
        }
    }
}

impl Drop for ServiceProcess {
    /// A process released before confirming its exit must not outlive us.
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            self.abandon();
        }
    }
}
