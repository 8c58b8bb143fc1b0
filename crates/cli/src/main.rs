use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use events::EventBus;
use orchestrator::{listen_for_signals, Launcher, OrchestratorError};
use stackup_core::LaunchConfig;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod console;

const CONFIG_FILE: &str = "stackup.toml";
const RENDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "stackup")]
#[command(
    about = "Start the whole development stack and stop it cleanly on Ctrl+C",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Project root holding the compose file and the service directories
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Config file [default: <root>/stackup.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not start the frontend
    #[arg(long)]
    no_frontend: bool,

    /// Backend health check attempts
    #[arg(long)]
    health_attempts: Option<u32>,

    /// Seconds each service gets to exit before it is killed
    #[arg(long)]
    grace_period: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", format!("ERROR: {:#}", e).red());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let root = cli
        .root
        .canonicalize()
        .with_context(|| format!("Project root {} not found", cli.root.display()))?;

    let mut config = load_config(&root, cli.config.as_deref()).await?;
    apply_overrides(&mut config, &cli);
    config.validate().context("Invalid configuration")?;

    // Handlers go in before the first step so an early Ctrl+C still cleans up.
    let signals = listen_for_signals().context("Failed to install signal handlers")?;

    let bus = EventBus::new();
    let renderer = console::spawn_renderer(bus.subscribe());
    let launcher = Launcher::with_compose(config, &root, bus.clone())?;
    tracing::debug!(?launcher, "Launcher ready");

    let result = launcher.run(signals).await;

    // The renderer drains and stops once the last bus handle is gone.
    drop(launcher);
    let stats = bus.stats();
    drop(bus);
    tracing::debug!(emitted = stats.emitted, failures = stats.failures, "Event bus closed");
    if tokio::time::timeout(RENDER_DRAIN_TIMEOUT, renderer).await.is_err() {
        tracing::warn!("Console renderer did not finish in time");
    }

    match result {
        Ok(summary) => {
            tracing::info!(
                reason = %summary.reason,
                stopped = summary.shutdown.terminated_count(),
                "Exiting"
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => startup_failure(e),
    }
}

/// Step failures were already printed by the console; anything else has not
/// been shown yet and goes back to `main` for printing.
fn startup_failure(e: OrchestratorError) -> Result<ExitCode> {
    match e.failed_step() {
        Some(step) => {
            tracing::debug!(step, error = %e, "Startup aborted");
            Ok(ExitCode::FAILURE)
        }
        None => Err(anyhow::Error::new(e).context("Startup aborted")),
    }
}

/// Read the TOML config. A missing default file means defaults; a missing
/// explicit one is an error.
async fn load_config(root: &Path, explicit: Option<&Path>) -> Result<LaunchConfig> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.join(CONFIG_FILE));

    match tokio::fs::read_to_string(&path).await {
        Ok(content) => toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && explicit.is_none() => {
            tracing::debug!("No {} in {}, using defaults", CONFIG_FILE, root.display());
            Ok(LaunchConfig::default())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

fn apply_overrides(config: &mut LaunchConfig, cli: &Cli) {
    if cli.no_frontend {
        config.frontend.enabled = false;
    }
    if let Some(attempts) = cli.health_attempts {
        config.health.max_attempts = attempts;
    }
    if let Some(grace) = cli.grace_period {
        config.shutdown.grace_period_secs = grace;
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_flags() {
        let cli = Cli::try_parse_from(["stackup"]).unwrap();
        assert_eq!(cli.root, PathBuf::from("."));
        assert!(cli.config.is_none());
        assert!(!cli.no_frontend);
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "stackup",
            "--no-frontend",
            "--health-attempts",
            "10",
            "--grace-period",
            "2",
        ])
        .unwrap();
        let mut config = LaunchConfig::default();

        apply_overrides(&mut config, &cli);

        assert!(!config.frontend.enabled);
        assert_eq!(config.health.max_attempts, 10);
        assert_eq!(config.shutdown.grace_period_secs, 2);
        assert!(config.backend.enabled);
    }

    #[test]
    fn test_step_failure_is_not_printed_twice() {
        let err = OrchestratorError::step_failed(
            "Starting backend",
            OrchestratorError::InfraUnavailable("docker".to_string()),
        );
        assert_eq!(startup_failure(err).unwrap(), ExitCode::FAILURE);
    }

    #[test]
    fn test_failure_outside_any_step_is_surfaced() {
        let err = OrchestratorError::Signal(std::io::Error::other("no signal support"));
        let err = startup_failure(err).unwrap_err();
        assert_eq!(
            format!("{:#}", err),
            "Startup aborted: Failed to install signal handlers: no signal support"
        );
    }

    #[tokio::test]
    async fn test_missing_default_config_means_defaults() {
        let root = tempfile::tempdir().unwrap();
        let config = load_config(root.path(), None).await.unwrap();
        assert_eq!(config.project.name, "VibeCheck");
    }

    #[tokio::test]
    async fn test_missing_explicit_config_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("elsewhere.toml");
        let err = load_config(root.path(), Some(&missing)).await.unwrap_err();
        assert!(err.to_string().contains("elsewhere.toml"));
    }

    #[tokio::test]
    async fn test_config_file_is_read_from_root() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(
            root.path().join(CONFIG_FILE),
            "[project]\nname = \"Demo\"\n\n[health]\nmax_attempts = 3\n",
        )
        .unwrap();

        let config = load_config(root.path(), None).await.unwrap();

        assert_eq!(config.project.name, "Demo");
        assert_eq!(config.health.max_attempts, 3);
        assert_eq!(config.backend.program, "npm");
    }

    #[tokio::test]
    async fn test_malformed_config_names_the_file() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join(CONFIG_FILE), "[health\n").unwrap();
        let err = load_config(root.path(), None).await.unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE));
    }
}
