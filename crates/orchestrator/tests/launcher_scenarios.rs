//! End-to-end runs of the launcher against a fake infrastructure runtime
//! and real `sleep` children.
#![cfg(unix)]

use async_trait::async_trait;
use events::{Event, EventBus, EventEnvelope};
use infra::InfraRuntime;
use orchestrator::{Launcher, RunSummary, ShutdownReason};
use stackup_core::{HealthConfig, LaunchConfig, ServiceConfig, ShutdownConfig};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use supervisor::{CapturedBackground, TerminationOutcome};
use tempfile::TempDir;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct FakeInfra {
    unavailable: bool,
    calls: Mutex<Vec<String>>,
    payloads: Mutex<Vec<Vec<u8>>>,
}

impl FakeInfra {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl InfraRuntime for FakeInfra {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn is_available(&self) -> bool {
        self.calls.lock().unwrap().push("is_available".to_string());
        !self.unavailable
    }

    async fn bring_up(&self) -> infra::Result<()> {
        self.calls.lock().unwrap().push("bring_up".to_string());
        Ok(())
    }

    async fn exec_admin(&self, payload: Vec<u8>) -> infra::Result<()> {
        self.calls.lock().unwrap().push("exec_admin".to_string());
        self.payloads.lock().unwrap().push(payload);
        Ok(())
    }
}

fn project_root() -> TempDir {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir(root.path().join("backend")).unwrap();
    std::fs::create_dir(root.path().join("frontend")).unwrap();
    root
}

fn sleeper(base: ServiceConfig) -> ServiceConfig {
    ServiceConfig {
        program: "sleep".to_string(),
        args: vec!["30".to_string()],
        required_tool: base.required_tool.as_ref().map(|_| "sleep".to_string()),
        ..base
    }
}

fn config(health_url: String) -> LaunchConfig {
    let mut config = LaunchConfig::default();
    config.infra.settle_secs = 0;
    config.backend = sleeper(ServiceConfig::backend());
    config.frontend = sleeper(ServiceConfig::frontend());
    config.health = HealthConfig {
        url: health_url,
        max_attempts: 5,
        retry_interval_ms: 10,
        request_timeout_ms: 500,
    };
    config.shutdown = ShutdownConfig {
        grace_period_secs: 5,
        force_wait_secs: 5,
        hard_timeout_secs: 30,
    };
    config.supervision.liveness_interval_ms = 50;
    config
}

async fn health_endpoint(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

fn health_url(server: &MockServer) -> String {
    format!("{}/api/health", server.uri())
}

struct Run {
    handle: JoinHandle<orchestrator::Result<RunSummary>>,
    signals: Option<mpsc::Sender<ShutdownReason>>,
    events: broadcast::Receiver<EventEnvelope>,
    seen: Vec<Event>,
}

fn start(config: LaunchConfig, root: &Path, infra: Arc<FakeInfra>) -> Run {
    let bus = EventBus::new();
    let events = bus.subscribe();
    let launcher =
        Launcher::new(config, root, infra, Arc::new(CapturedBackground), bus).unwrap();
    let (signals, rx) = mpsc::channel(8);
    let handle = tokio::spawn(async move { launcher.run(rx).await });

    Run {
        handle,
        signals: Some(signals),
        events,
        seen: Vec::new(),
    }
}

impl Run {
    async fn signal(&self, reason: ShutdownReason) {
        self.signals
            .as_ref()
            .expect("signal channel closed")
            .send(reason)
            .await
            .unwrap();
    }

    /// Collect events until one matches, failing after a few seconds.
    async fn wait_for(&mut self, wanted: impl Fn(&Event) -> bool) -> Event {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let envelope = tokio::time::timeout_at(deadline, self.events.recv())
                .await
                .expect("timed out waiting for event")
                .expect("event bus closed");
            self.seen.push(envelope.event.clone());
            if wanted(&envelope.event) {
                return envelope.event;
            }
        }
    }

    async fn finish(mut self) -> (orchestrator::Result<RunSummary>, Vec<Event>) {
        let result = tokio::time::timeout(Duration::from_secs(30), self.handle)
            .await
            .expect("launcher did not finish")
            .unwrap();
        while let Ok(envelope) = self.events.try_recv() {
            self.seen.push(envelope.event);
        }
        (result, self.seen)
    }
}

fn is_running(event: &Event) -> bool {
    matches!(event, Event::StartupComplete { .. })
}

#[tokio::test]
async fn unavailable_runtime_aborts_before_bring_up() {
    let root = project_root();
    let server = health_endpoint(200).await;
    let infra = Arc::new(FakeInfra {
        unavailable: true,
        ..Default::default()
    });

    let run = start(config(health_url(&server)), root.path(), infra.clone());
    let (result, events) = run.finish().await;

    let err = result.unwrap_err();
    assert_eq!(err.failed_step(), Some("Checking infrastructure runtime"));
    assert_eq!(infra.calls(), vec!["is_available"]);
    assert!(events.iter().any(|e| matches!(e, Event::FatalFailure { .. })));
    assert!(!events.iter().any(|e| matches!(e, Event::ServiceSpawned { .. })));
    assert!(!events.iter().any(|e| matches!(e, Event::ShutdownStarted { .. })));
}

#[tokio::test]
async fn interrupt_stops_both_services_gracefully() {
    let root = project_root();
    let server = health_endpoint(200).await;
    let infra = Arc::new(FakeInfra::default());

    let mut run = start(config(health_url(&server)), root.path(), infra.clone());
    let running = run.wait_for(is_running).await;
    match running {
        Event::StartupComplete { services, .. } => {
            assert_eq!(services.len(), 2);
            assert!(services.iter().all(|s| s.running));
        }
        other => panic!("unexpected event {:?}", other),
    }

    run.signal(ShutdownReason::Interrupt).await;
    let (result, events) = run.finish().await;

    let summary = result.unwrap();
    assert_eq!(summary.reason, ShutdownReason::Interrupt);
    assert_eq!(
        summary.shutdown.outcome("backend"),
        Some(TerminationOutcome::Graceful)
    );
    assert_eq!(
        summary.shutdown.outcome("frontend"),
        Some(TerminationOutcome::Graceful)
    );
    assert_eq!(summary.shutdown.forced_count(), 0);

    let order: Vec<_> = summary
        .shutdown
        .outcomes
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(order, vec!["frontend", "backend"]);

    assert_eq!(infra.calls(), vec!["is_available", "bring_up"]);
    assert!(events.iter().any(|e| matches!(
        e,
        Event::StepSkipped { reason, .. } if reason.contains("init-db.sql not found")
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::ShutdownCompleted { terminated: 2, forced: 0, .. }
    )));
}

#[tokio::test]
async fn unready_backend_warns_and_frontend_still_starts() {
    let root = project_root();
    let server = health_endpoint(503).await;
    let infra = Arc::new(FakeInfra::default());

    let mut run = start(config(health_url(&server)), root.path(), infra);
    let degraded = run
        .wait_for(|e| matches!(e, Event::StepDegraded { .. }))
        .await;
    assert!(matches!(
        degraded,
        Event::StepDegraded { ref warning, .. } if warning.contains("may not be fully ready")
    ));

    run.wait_for(is_running).await;
    run.signal(ShutdownReason::Interrupt).await;
    let (result, events) = run.finish().await;

    let waiting = events
        .iter()
        .filter(|e| matches!(e, Event::HealthWaiting { .. }))
        .count();
    assert_eq!(waiting, 5);
    assert!(events.iter().any(|e| matches!(
        e,
        Event::ServiceSpawned { name, .. } if name == "frontend"
    )));
    assert_eq!(result.unwrap().shutdown.terminated_count(), 2);
}

#[tokio::test]
async fn init_script_is_streamed_to_runtime() {
    let root = project_root();
    let script = "CREATE TABLE IF NOT EXISTS users (id SERIAL PRIMARY KEY);\n";
    std::fs::write(root.path().join("backend/init-db.sql"), script).unwrap();
    let server = health_endpoint(200).await;
    let infra = Arc::new(FakeInfra::default());

    let mut run = start(config(health_url(&server)), root.path(), infra.clone());
    run.wait_for(is_running).await;
    run.signal(ShutdownReason::Terminate).await;
    let (result, _) = run.finish().await;

    assert_eq!(result.unwrap().reason, ShutdownReason::Terminate);
    assert_eq!(infra.calls(), vec!["is_available", "bring_up", "exec_admin"]);
    assert_eq!(infra.payloads.lock().unwrap()[0], script.as_bytes());
}

#[tokio::test]
async fn second_signal_is_reported_while_shutting_down() {
    let root = project_root();
    let server = health_endpoint(200).await;
    let mut config = config(health_url(&server));
    config.frontend.program = "sh".to_string();
    config.frontend.args = vec!["-c".to_string(), "trap '' TERM; sleep 30".to_string()];
    config.shutdown.grace_period_secs = 1;

    let mut run = start(config, root.path(), Arc::new(FakeInfra::default()));
    run.wait_for(is_running).await;
    // Let the shell install its trap.
    tokio::time::sleep(Duration::from_millis(300)).await;

    run.signal(ShutdownReason::Interrupt).await;
    run.wait_for(|e| matches!(e, Event::ShutdownStarted { .. }))
        .await;
    run.signal(ShutdownReason::Interrupt).await;
    run.wait_for(|e| matches!(e, Event::ShutdownAlreadyInProgress { .. }))
        .await;

    let (result, events) = run.finish().await;
    let summary = result.unwrap();

    let started = events
        .iter()
        .filter(|e| matches!(e, Event::ShutdownStarted { .. }))
        .count();
    assert_eq!(started, 1);
    assert_eq!(
        summary.shutdown.outcome("frontend"),
        Some(TerminationOutcome::Forced)
    );
    assert_eq!(
        summary.shutdown.outcome("backend"),
        Some(TerminationOutcome::Graceful)
    );
}

#[tokio::test]
async fn interrupt_during_startup_cleans_up_spawned_backend() {
    let root = project_root();
    let server = health_endpoint(503).await;
    let mut config = config(health_url(&server));
    config.health.retry_interval_ms = 10_000;

    let mut run = start(config, root.path(), Arc::new(FakeInfra::default()));
    run.wait_for(|e| matches!(e, Event::HealthWaiting { attempt: 1, .. }))
        .await;
    run.signal(ShutdownReason::Interrupt).await;
    let (result, events) = run.finish().await;

    let summary = result.unwrap();
    assert!(summary.plan.is_none());
    assert_eq!(
        summary.shutdown.outcome("backend"),
        Some(TerminationOutcome::Graceful)
    );
    assert_eq!(summary.shutdown.outcome("frontend"), None);
    assert!(!events.iter().any(is_running));
}

#[tokio::test]
async fn missing_backend_directory_is_fatal() {
    let root = tempfile::tempdir().unwrap();
    let server = health_endpoint(200).await;
    let infra = Arc::new(FakeInfra::default());

    let run = start(config(health_url(&server)), root.path(), infra.clone());
    let (result, events) = run.finish().await;

    let err = result.unwrap_err();
    assert_eq!(err.failed_step(), Some("Starting backend"));
    assert!(err.to_string().contains("backend directory not found"));
    assert_eq!(infra.calls(), vec!["is_available", "bring_up"]);
    assert!(!events.iter().any(|e| matches!(
        e,
        Event::StepStarted { title, .. } if title == "Starting frontend"
    )));
}

#[tokio::test]
async fn missing_frontend_toolchain_is_advisory() {
    let root = project_root();
    let server = health_endpoint(200).await;
    let mut config = config(health_url(&server));
    config.frontend.required_tool = Some("stackup-no-such-toolchain".to_string());

    let mut run = start(config, root.path(), Arc::new(FakeInfra::default()));
    let failure = run
        .wait_for(|e| matches!(e, Event::AdvisoryFailure { .. }))
        .await;
    assert!(matches!(
        failure,
        Event::AdvisoryFailure { ref hint, .. }
            if hint.as_deref() == Some("https://flutter.dev/docs/get-started/install")
    ));

    let running = run.wait_for(is_running).await;
    if let Event::StartupComplete { services, .. } = running {
        let frontend = services.iter().find(|s| s.name == "frontend").unwrap();
        assert!(!frontend.running);
    }

    run.signal(ShutdownReason::Interrupt).await;
    let (result, _) = run.finish().await;
    let summary = result.unwrap();
    assert_eq!(summary.shutdown.outcomes.len(), 1);
    assert_eq!(summary.plan.unwrap().warning_count(), 1);
}

#[tokio::test]
async fn disabled_frontend_is_listed_as_not_started() {
    let root = project_root();
    let server = health_endpoint(200).await;
    let mut config = config(health_url(&server));
    config.frontend.enabled = false;
    let expected_health = config.health.url.clone();

    let mut run = start(config, root.path(), Arc::new(FakeInfra::default()));
    let running = run.wait_for(is_running).await;
    match running {
        Event::StartupComplete {
            services,
            health_url,
            ..
        } => {
            let names: Vec<_> = services.iter().map(|s| s.name.as_str()).collect();
            assert_eq!(names, vec!["backend", "frontend"]);
            assert!(services[0].running);
            assert!(!services[1].running);
            assert_eq!(health_url, expected_health);
        }
        other => panic!("unexpected event {:?}", other),
    }

    run.signal(ShutdownReason::Interrupt).await;
    let (result, events) = run.finish().await;
    let summary = result.unwrap();
    assert_eq!(summary.shutdown.outcomes.len(), 1);
    assert!(!events.iter().any(|e| matches!(
        e,
        Event::ServiceSpawned { name, .. } if name == "frontend"
    )));
}

#[tokio::test]
async fn crashed_service_is_reported_while_idle() {
    let root = project_root();
    let server = health_endpoint(200).await;
    let mut config = config(health_url(&server));
    config.frontend.program = "sh".to_string();
    config.frontend.args = vec![
        "-c".to_string(),
        "sleep 0.3; echo 'port already in use' >&2; exit 2".to_string(),
    ];

    let mut run = start(config, root.path(), Arc::new(FakeInfra::default()));
    run.wait_for(is_running).await;
    let exited = run
        .wait_for(|e| matches!(e, Event::ServiceExited { .. }))
        .await;
    match exited {
        Event::ServiceExited {
            name,
            recent_output,
            ..
        } => {
            assert_eq!(name, "frontend");
            assert!(recent_output
                .iter()
                .any(|line| line.contains("port already in use")));
        }
        other => panic!("unexpected event {:?}", other),
    }

    run.signal(ShutdownReason::Interrupt).await;
    let (result, _) = run.finish().await;
    let summary = result.unwrap();
    assert_eq!(summary.shutdown.outcomes.len(), 1);
    assert_eq!(
        summary.shutdown.outcome("backend"),
        Some(TerminationOutcome::Graceful)
    );
}

#[tokio::test]
async fn closed_signal_channel_shuts_down() {
    let root = project_root();
    let server = health_endpoint(200).await;

    let infra = Arc::new(FakeInfra::default());

    let mut run = start(config(health_url(&server)), root.path(), infra);
    run.wait_for(is_running).await;
    run.signals = None;
    let (result, _) = run.finish().await;

    assert_eq!(result.unwrap().reason, ShutdownReason::ListenerClosed);
}
