use async_trait::async_trait;
use stackup_core::InfraConfig;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{InfraError, Result};
use crate::traits::InfraRuntime;

const COMPOSE_BINARY: &str = "docker-compose";
const ADMIN_CLIENT: &str = "psql";

/// Settings for [`ComposeRuntime`], usually derived from [`InfraConfig`].
#[derive(Debug, Clone)]
pub struct ComposeSettings {
    pub runtime_program: String,
    /// Full compose invocation without the `up -d` suffix
    pub compose_command: Vec<String>,
    pub container: String,
    pub db_user: String,
    pub db_name: String,
}

impl ComposeSettings {
    pub fn from_config(config: &InfraConfig) -> Self {
        let compose_command = if config.compose_command.is_empty() {
            detect_compose_command(&config.runtime_program)
        } else {
            config.compose_command.clone()
        };

        Self {
            runtime_program: config.runtime_program.clone(),
            compose_command,
            container: config.container.clone(),
            db_user: config.db_user.clone(),
            db_name: config.db_name.clone(),
        }
    }
}

/// Prefer the standalone `docker-compose` binary, fall back to the
/// `docker compose` plugin.
fn detect_compose_command(runtime_program: &str) -> Vec<String> {
    match which::which(COMPOSE_BINARY) {
        Ok(path) => {
            debug!("Using compose binary at {:?}", path);
            vec![COMPOSE_BINARY.to_string()]
        }
        Err(_) => vec![runtime_program.to_string(), "compose".to_string()],
    }
}

/// Docker + compose backed runtime, run from the project root where the
/// compose file lives.
pub struct ComposeRuntime {
    settings: ComposeSettings,
    project_root: PathBuf,
}

impl ComposeRuntime {
    pub fn new(settings: ComposeSettings, project_root: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            project_root: project_root.into(),
        }
    }

    async fn run(&self, program: &str, args: &[String], cwd: &Path) -> Result<Output> {
        debug!("Running {} {:?} in {:?}", program, args, cwd);

        Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_error(program, e))
    }

    fn admin_args(&self) -> Vec<String> {
        vec![
            "exec".to_string(),
            "-i".to_string(),
            self.settings.container.clone(),
            ADMIN_CLIENT.to_string(),
            "-U".to_string(),
            self.settings.db_user.clone(),
            "-d".to_string(),
            self.settings.db_name.clone(),
        ]
    }
}

fn spawn_error(program: &str, error: std::io::Error) -> InfraError {
    if error.kind() == ErrorKind::NotFound {
        InfraError::CommandNotFound(program.to_string())
    } else {
        InfraError::Io(error)
    }
}

fn describe(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl InfraRuntime for ComposeRuntime {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn is_available(&self) -> bool {
        let args = ["ps".to_string()];
        match self
            .run(&self.settings.runtime_program, &args, &self.project_root)
            .await
        {
            Ok(output) => output.status.success(),
            Err(e) => {
                debug!(error = %e, "Container runtime probe failed");
                false
            }
        }
    }

    async fn bring_up(&self) -> Result<()> {
        let (program, rest) = self
            .settings
            .compose_command
            .split_first()
            .ok_or_else(|| InfraError::CommandNotFound("compose".to_string()))?;

        let mut args = rest.to_vec();
        args.extend(["up".to_string(), "-d".to_string()]);

        let output = self.run(program, &args, &self.project_root).await?;
        if !output.status.success() {
            return Err(InfraError::command_failed(
                describe(program, &args),
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }

        Ok(())
    }

    async fn exec_admin(&self, payload: Vec<u8>) -> Result<()> {
        let program = &self.settings.runtime_program;
        let args = self.admin_args();
        debug!(bytes = payload.len(), "Streaming init payload via {} {:?}", program, args);

        let mut child = Command::new(program)
            .args(&args)
            .current_dir(&self.project_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(program, e))?;

        // Write concurrently with reading so neither pipe can fill up and stall.
        let writer = child.stdin.take().map(|mut stdin| {
            tokio::spawn(async move {
                stdin.write_all(&payload).await?;
                stdin.shutdown().await
            })
        });

        let output = child.wait_with_output().await?;

        if let Some(writer) = writer {
            match writer.await {
                Ok(Err(e)) => warn!(error = %e, "Failed writing init payload"),
                Err(e) => warn!(error = %e, "Init payload writer panicked"),
                Ok(Ok(())) => {}
            }
        }

        if !output.status.success() {
            return Err(InfraError::command_failed(
                describe(program, &args),
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }

        Ok(())
    }
}
