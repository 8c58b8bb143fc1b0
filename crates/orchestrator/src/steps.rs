//! The concrete actions behind the default launch plan.

use async_trait::async_trait;
use events::{Event, EventBus};
use infra::{apply_init_script, start_infra, InfraRuntime, InitOutcome};
use stackup_core::{ServiceConfig, ServiceSpec};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use supervisor::ProcessSupervisor;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{OrchestratorError, Result};
use crate::health::HealthPoller;
use crate::plan::{StepAction, StepOutcome};

/// Shared handle to the process registry.
pub type SharedSupervisor = Arc<Mutex<ProcessSupervisor>>;

/// Fails if the infrastructure runtime does not answer.
pub struct ProbeInfra {
    runtime: Arc<dyn InfraRuntime>,
}

impl ProbeInfra {
    pub fn new(runtime: Arc<dyn InfraRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl StepAction for ProbeInfra {
    async fn run(&self) -> Result<StepOutcome> {
        if !self.runtime.is_available().await {
            return Err(OrchestratorError::InfraUnavailable(
                self.runtime.name().to_string(),
            ));
        }
        Ok(StepOutcome::Completed(format!(
            "{} is running",
            self.runtime.name()
        )))
    }
}

/// Brings the infrastructure stack up and waits for it to settle.
pub struct StartInfra {
    runtime: Arc<dyn InfraRuntime>,
    settle: Duration,
}

impl StartInfra {
    pub fn new(runtime: Arc<dyn InfraRuntime>, settle: Duration) -> Self {
        Self { runtime, settle }
    }
}

#[async_trait]
impl StepAction for StartInfra {
    async fn run(&self) -> Result<StepOutcome> {
        start_infra(self.runtime.as_ref(), self.settle).await?;
        Ok(StepOutcome::Completed("Infrastructure started".to_string()))
    }
}

/// Applies the init script, if one exists.
pub struct InitializeState {
    runtime: Arc<dyn InfraRuntime>,
    script: PathBuf,
}

impl InitializeState {
    pub fn new(runtime: Arc<dyn InfraRuntime>, script: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            script: script.into(),
        }
    }
}

#[async_trait]
impl StepAction for InitializeState {
    async fn run(&self) -> Result<StepOutcome> {
        match apply_init_script(self.runtime.as_ref(), &self.script).await? {
            InitOutcome::Applied { bytes } => {
                debug!(bytes, "Init script applied");
                Ok(StepOutcome::Completed("Database initialized".to_string()))
            }
            InitOutcome::Skipped => {
                let file = self
                    .script
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| self.script.display().to_string());
                Ok(StepOutcome::Skipped(format!(
                    "{} not found, skipping database initialization",
                    file
                )))
            }
        }
    }
}

/// Spawns one service and, when it has a health endpoint, waits for it.
///
/// Readiness never fails the step: a service that does not answer in
/// time degrades it instead.
pub struct StartService {
    supervisor: SharedSupervisor,
    spec: ServiceSpec,
    enabled: bool,
    required_tool: Option<String>,
    install_hint: Option<String>,
    health: Option<HealthPoller>,
    events: EventBus,
}

impl StartService {
    pub fn new(supervisor: SharedSupervisor, spec: ServiceSpec, events: EventBus) -> Self {
        Self {
            supervisor,
            spec,
            enabled: true,
            required_tool: None,
            install_hint: None,
            health: None,
            events,
        }
    }

    pub fn from_config(
        supervisor: SharedSupervisor,
        config: &ServiceConfig,
        root: &Path,
        events: EventBus,
    ) -> Self {
        let mut step = Self::new(supervisor, config.to_spec(root), events);
        step.enabled = config.enabled;
        step.required_tool = config.required_tool.clone();
        step.install_hint = config.install_hint.clone();
        step
    }

    pub fn with_health(mut self, poller: HealthPoller) -> Self {
        self.health = Some(poller);
        self
    }

    fn check_toolchain(&self) -> Result<()> {
        let Some(tool) = &self.required_tool else {
            return Ok(());
        };
        match which::which(tool) {
            Ok(path) => {
                debug!(tool = %tool, path = %path.display(), "Found toolchain");
                Ok(())
            }
            Err(_) => Err(OrchestratorError::ToolchainMissing {
                tool: tool.clone(),
                hint: self.install_hint.clone(),
            }),
        }
    }
}

#[async_trait]
impl StepAction for StartService {
    async fn run(&self) -> Result<StepOutcome> {
        let name = &self.spec.name;
        if !self.enabled {
            return Ok(StepOutcome::Skipped(format!("{} is disabled", name)));
        }

        self.check_toolchain()?;

        // Hold the lock only for the spawn itself.
        let spawned = {
            let mut supervisor = self.supervisor.lock().await;
            supervisor.spawn(&self.spec)?
        };
        info!(service = %name, pid = ?spawned.pid, "Service started");
        self.events.emit(Event::ServiceSpawned {
            name: name.clone(),
            pid: spawned.pid,
        });

        let Some(poller) = &self.health else {
            return Ok(StepOutcome::Completed(format!("{} started", name)));
        };

        let result = poller.poll().await;
        if result.ready {
            Ok(StepOutcome::Completed(format!(
                "{} is ready (after {} attempt{})",
                name,
                result.attempts,
                if result.attempts == 1 { "" } else { "s" }
            )))
        } else {
            Ok(StepOutcome::Degraded(format!(
                "{} may not be fully ready, but continuing...",
                name
            )))
        }
    }
}
