use stackup_core::ServiceSpec;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Result, SupervisorError};
use crate::process::{ProcessInfo, ServiceProcess, TerminationOutcome, TerminationPolicy};
use crate::strategy::{platform_default, SpawnStrategy};

/// A child that exited without being asked to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitNotice {
    pub name: String,
    pub status: String,
    pub recent_output: Vec<String>,
}

/// Per-process outcome of [`ProcessSupervisor::terminate_all`], in the
/// order processes were handled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub outcomes: Vec<(String, TerminationOutcome)>,
}

impl ShutdownReport {
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcome(&self, name: &str) -> Option<TerminationOutcome> {
        self.outcomes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, outcome)| *outcome)
    }

    fn count(&self, wanted: TerminationOutcome) -> usize {
        self.outcomes.iter().filter(|(_, o)| *o == wanted).count()
    }

    /// Processes that were still running when shutdown began.
    pub fn terminated_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o != TerminationOutcome::AlreadyExited)
            .count()
    }

    pub fn forced_count(&self) -> usize {
        self.count(TerminationOutcome::Forced)
    }

    pub fn unresponsive(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == TerminationOutcome::Unresponsive)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Registry of spawned service processes.
///
/// The registry is the only record of what has to be cleaned up, and the
/// only holder of child handles.
pub struct ProcessSupervisor {
    strategy: Arc<dyn SpawnStrategy>,
    /// In spawn order
    processes: Vec<ServiceProcess>,
}

impl ProcessSupervisor {
    pub fn new(strategy: Arc<dyn SpawnStrategy>) -> Self {
        Self {
            strategy,
            processes: Vec::new(),
        }
    }

    pub fn with_platform_default() -> Self {
        Self::new(platform_default())
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<ProcessInfo> {
        self.position(name).map(|i| self.processes[i].info())
    }

    pub fn tracked(&self) -> Vec<ProcessInfo> {
        self.processes.iter().map(ServiceProcess::info).collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.processes.iter().position(|p| p.name() == name)
    }

    /// Start a service. Refuses if a live process already has the name;
    /// an exited one with the same name is replaced.
    pub fn spawn(&mut self, spec: &ServiceSpec) -> Result<ProcessInfo> {
        if let Some(index) = self.position(&spec.name) {
            if self.processes[index].poll_alive() {
                return Err(SupervisorError::AlreadyRunning(spec.name.clone()));
            }
            debug!(service = %spec.name, "Replacing exited process");
            self.processes.remove(index);
        }

        if !spec.working_dir.is_dir() {
            return Err(SupervisorError::WorkingDirMissing {
                name: spec.name.clone(),
                path: spec.working_dir.clone(),
            });
        }

        let spawned = self
            .strategy
            .spawn(spec)
            .map_err(|source| SupervisorError::SpawnFailed {
                name: spec.name.clone(),
                command: spec.command_line(),
                source,
            })?;

        let process = ServiceProcess::new(&spec.name, spawned);
        let info = process.info();
        info!(
            service = %spec.name,
            pid = ?info.pid,
            strategy = self.strategy.name(),
            "Spawned {}",
            spec.command_line()
        );

        self.processes.push(process);
        Ok(info)
    }

    /// Non-blocking liveness probe by name. Unknown names are not alive.
    pub fn is_alive(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(index) => self.processes[index].poll_alive(),
            None => false,
        }
    }

    /// Drop every process that has exited on its own, reporting each one.
    pub fn reap_exited(&mut self) -> Vec<ExitNotice> {
        let mut notices = Vec::new();
        let mut index = 0;
        while index < self.processes.len() {
            if self.processes[index].poll_alive() {
                index += 1;
                continue;
            }

            let process = self.processes.remove(index);
            let status = process
                .exit_description()
                .unwrap_or_else(|| "unknown status".to_string());
            warn!(service = %process.name(), %status, "Service exited unexpectedly");
            notices.push(ExitNotice {
                name: process.name().to_string(),
                status,
                recent_output: process.recent_output(),
            });
        }
        notices
    }

    /// Stop every tracked process, newest first. The registry is empty
    /// afterwards, whatever the individual outcomes.
    pub async fn terminate_all(&mut self, policy: &TerminationPolicy) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        while let Some(entry) = self.terminate_newest(policy).await {
            report.outcomes.push(entry);
        }
        report
    }

    /// Stop the most recently spawned process and drop it from the registry.
    pub async fn terminate_newest(
        &mut self,
        policy: &TerminationPolicy,
    ) -> Option<(String, TerminationOutcome)> {
        let mut process = self.processes.pop()?;
        let outcome = process.terminate(policy).await;
        debug!(service = %process.name(), outcome = outcome.as_str(), "Process released");
        Some((process.name().to_string(), outcome))
    }

    /// Name of the process [`terminate_newest`](Self::terminate_newest) would stop next.
    pub fn newest(&self) -> Option<&str> {
        self.processes.last().map(ServiceProcess::name)
    }

    /// Forget everything still tracked. Dropping a live process fires a
    /// forced kill without waiting. Returns the names, newest first.
    pub fn abandon_all(&mut self) -> Vec<String> {
        let mut names = Vec::new();
        while let Some(process) = self.processes.pop() {
            names.push(process.name().to_string());
        }
        names
    }
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("strategy", &self.strategy.name())
            .field("processes", &self.tracked())
            .finish()
    }
}
