use events::{Event, EventBus, ServiceLine};
use infra::{ComposeRuntime, ComposeSettings, InfraRuntime};
use stackup_core::{LaunchConfig, ServiceConfig};
use std::path::PathBuf;
use std::sync::Arc;
use supervisor::{platform_default, ProcessSupervisor, ShutdownReport, SpawnStrategy};
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::executor::{PlanExecutor, PlanReport};
use crate::health::HealthPoller;
use crate::plan::{OrchestrationPlan, PlanStep};
use crate::shutdown::{ShutdownCoordinator, ShutdownReason};
use crate::steps::{InitializeState, ProbeInfra, SharedSupervisor, StartInfra, StartService};

/// How a run that reached shutdown ended.
#[derive(Debug)]
pub struct RunSummary {
    /// `None` when a signal interrupted startup
    pub plan: Option<PlanReport>,
    pub reason: ShutdownReason,
    pub shutdown: ShutdownReport,
}

/// Brings the whole stack up, keeps it up, and tears it down on a signal.
pub struct Launcher {
    config: LaunchConfig,
    root: PathBuf,
    runtime: Arc<dyn InfraRuntime>,
    supervisor: SharedSupervisor,
    events: EventBus,
}

impl Launcher {
    pub fn new(
        config: LaunchConfig,
        root: impl Into<PathBuf>,
        runtime: Arc<dyn InfraRuntime>,
        strategy: Arc<dyn SpawnStrategy>,
        events: EventBus,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            root: root.into(),
            runtime,
            supervisor: Arc::new(Mutex::new(ProcessSupervisor::new(strategy))),
            events,
        })
    }

    /// Docker compose for infrastructure, the platform's default way of
    /// spawning services.
    pub fn with_compose(
        config: LaunchConfig,
        root: impl Into<PathBuf>,
        events: EventBus,
    ) -> Result<Self> {
        let root = root.into();
        let settings = ComposeSettings::from_config(&config.infra);
        let runtime = Arc::new(ComposeRuntime::new(settings, &root));
        Self::new(config, root, runtime, platform_default(), events)
    }

    /// The default chain: runtime probe, infrastructure, data, backend,
    /// frontend.
    pub fn plan(&self) -> Result<OrchestrationPlan> {
        let backend_health =
            HealthPoller::new(&self.config.backend.name, &self.config.health)?
                .with_events(self.events.clone());

        Ok(OrchestrationPlan::new(vec![
            PlanStep::fatal(
                "Checking infrastructure runtime",
                ProbeInfra::new(self.runtime.clone()),
            ),
            PlanStep::fatal(
                "Starting infrastructure",
                StartInfra::new(self.runtime.clone(), self.config.infra.settle_duration()),
            ),
            PlanStep::advisory(
                "Initializing database",
                InitializeState::new(
                    self.runtime.clone(),
                    self.root.join(&self.config.infra.init_script),
                ),
            ),
            PlanStep::fatal(
                "Starting backend",
                self.start_service(&self.config.backend)
                    .with_health(backend_health),
            ),
            PlanStep::advisory("Starting frontend", self.start_service(&self.config.frontend)),
        ]))
    }

    fn start_service(&self, service: &ServiceConfig) -> StartService {
        StartService::from_config(
            self.supervisor.clone(),
            service,
            &self.root,
            self.events.clone(),
        )
    }

    /// Run the plan, idle until a signal, then terminate everything.
    ///
    /// Returns `Err` only when a fatal step failed; whatever was already
    /// spawned has been cleaned up by then. A signal during startup skips
    /// straight to shutdown.
    pub async fn run(&self, mut signals: mpsc::Receiver<ShutdownReason>) -> Result<RunSummary> {
        let plan = self.plan()?;
        let executor = PlanExecutor::new(self.events.clone());
        let coordinator = ShutdownCoordinator::new(
            self.supervisor.clone(),
            &self.config.shutdown,
            self.events.clone(),
        );

        let startup = tokio::select! {
            result = executor.execute(&plan) => result,
            Some(reason) = signals.recv() => {
                warn!(reason = %reason, "Signal received during startup");
                let shutdown = self.shutdown_with(&coordinator, reason, &mut signals).await;
                return Ok(RunSummary { plan: None, reason, shutdown });
            }
        };

        let report = match startup {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Startup aborted");
                if !self.supervisor.lock().await.is_empty() {
                    self.shutdown_with(&coordinator, ShutdownReason::StartupFailed, &mut signals)
                        .await;
                }
                return Err(e);
            }
        };

        self.announce_running().await;

        let reason = self.idle(&mut signals).await;
        let shutdown = self.shutdown_with(&coordinator, reason, &mut signals).await;

        Ok(RunSummary {
            plan: Some(report),
            reason,
            shutdown,
        })
    }

    async fn announce_running(&self) {
        let mut services = Vec::new();
        {
            let mut supervisor = self.supervisor.lock().await;
            // Disabled services still get a row, shown as not started.
            for service in [&self.config.backend, &self.config.frontend] {
                let running = service.enabled && supervisor.is_alive(&service.name);
                services.push(ServiceLine {
                    name: service.name.clone(),
                    url: service.url.clone(),
                    running,
                });
            }
        }

        info!(project = %self.config.project.name, "All steps finished, running");
        self.events.emit(Event::StartupComplete {
            project: self.config.project.name.clone(),
            services,
            health_url: self.config.health.url.clone(),
        });
    }

    /// Wait for a signal, reporting services that die along the way.
    async fn idle(&self, signals: &mut mpsc::Receiver<ShutdownReason>) -> ShutdownReason {
        let mut liveness = tokio::time::interval(self.config.supervision.liveness_interval());
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                received = signals.recv() => {
                    return received.unwrap_or_else(|| {
                        warn!("Signal listener closed, shutting down");
                        ShutdownReason::ListenerClosed
                    });
                }
                _ = liveness.tick() => {
                    let exited = self.supervisor.lock().await.reap_exited();
                    for notice in exited {
                        self.events.emit(Event::ServiceExited {
                            name: notice.name,
                            status: notice.status,
                            recent_output: notice.recent_output,
                        });
                    }
                }
            }
        }
    }

    /// Drive the coordinator to completion, answering any further signal
    /// with an "already in progress" notice.
    async fn shutdown_with(
        &self,
        coordinator: &ShutdownCoordinator,
        reason: ShutdownReason,
        signals: &mut mpsc::Receiver<ShutdownReason>,
    ) -> ShutdownReport {
        let shutdown = coordinator.shutdown(reason);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                report = &mut shutdown => return report.unwrap_or_default(),
                Some(again) = signals.recv() => {
                    coordinator.shutdown(again).await;
                }
            }
        }
    }
}

impl std::fmt::Debug for Launcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Launcher")
            .field("project", &self.config.project.name)
            .field("root", &self.root)
            .field("runtime", &self.runtime.name())
            .finish()
    }
}
