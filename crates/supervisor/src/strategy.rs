//! How service children are started.
//!
//! Two interchangeable strategies sit behind [`SpawnStrategy`]. The
//! supervisor does not care which one is active; both hand back a
//! waitable [`Child`].

use stackup_core::ServiceSpec;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::{Child, Command};

use crate::output::OutputTail;

/// A freshly started child plus what the strategy set up around it.
#[derive(Debug)]
pub struct SpawnedChild {
    pub child: Child,
    /// Captured output, when the strategy pipes the standard streams
    pub output: Option<OutputTail>,
    /// Whether the child leads its own process group
    pub process_group: bool,
}

pub trait SpawnStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn spawn(&self, spec: &ServiceSpec) -> std::io::Result<SpawnedChild>;
}

/// Background child with stdout/stderr captured for diagnostics.
///
/// On unix the child gets its own process group, so terminal Ctrl+C does
/// not reach it directly and termination can address its whole tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapturedBackground;

impl SpawnStrategy for CapturedBackground {
    fn name(&self) -> &'static str {
        "captured-background"
    }

    fn spawn(&self, spec: &ServiceSpec) -> std::io::Result<SpawnedChild> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn()?;

        let output = OutputTail::new();
        if let Some(stdout) = child.stdout.take() {
            output.drain(stdout, spec.name.clone(), "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            output.drain(stderr, spec.name.clone(), "stderr");
        }

        Ok(SpawnedChild {
            child,
            output: Some(output),
            process_group: cfg!(unix),
        })
    }
}

/// Child running in its own, user-visible console window.
#[cfg(windows)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VisibleTerminal;

#[cfg(windows)]
impl SpawnStrategy for VisibleTerminal {
    fn name(&self) -> &'static str {
        "visible-terminal"
    }

    fn spawn(&self, spec: &ServiceSpec) -> std::io::Result<SpawnedChild> {
        const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;

        let script = format!(
            "cd '{}'; Write-Host 'Starting {}...' -ForegroundColor Cyan; {}",
            spec.working_dir.display(),
            spec.name,
            spec.command_line()
        );

        let child = Command::new("powershell")
            .args(["-NoExit", "-Command", &script])
            .current_dir(&spec.working_dir)
            .creation_flags(CREATE_NEW_CONSOLE)
            .spawn()?;

        Ok(SpawnedChild {
            child,
            output: None,
            process_group: false,
        })
    }
}

/// Visible console windows on Windows, captured background elsewhere.
pub fn platform_default() -> Arc<dyn SpawnStrategy> {
    #[cfg(windows)]
    {
        Arc::new(VisibleTerminal)
    }

    #[cfg(not(windows))]
    {
        Arc::new(CapturedBackground)
    }
}
