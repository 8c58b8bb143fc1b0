//! Turns bus events into the colored lines the user sees.

use colored::{ColoredString, Colorize};
use events::{Event, EventEnvelope, ServiceLine};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Print every event until the bus closes.
pub fn spawn_renderer(mut rx: broadcast::Receiver<EventEnvelope>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    for line in render(&envelope.event) {
                        println!("{}", line);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Console fell behind, dropped progress lines");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn warning(text: impl AsRef<str>) -> ColoredString {
    format!("WARNING: {}", text.as_ref()).yellow()
}

fn error(text: impl AsRef<str>) -> ColoredString {
    format!("ERROR: {}", text.as_ref()).red()
}

fn note(text: impl AsRef<str>) -> ColoredString {
    text.as_ref().bright_black()
}

pub fn render(event: &Event) -> Vec<ColoredString> {
    match event {
        Event::StepStarted {
            index,
            total,
            title,
        } => vec![
            "".normal(),
            format!("[{}/{}] {}...", index, total, title).yellow(),
        ],
        Event::StepSucceeded { detail, .. } => vec![format!("✓ {}", detail).green()],
        Event::StepSkipped { reason, .. } => vec![warning(reason)],
        Event::StepDegraded { warning: text, .. } => vec![warning(text)],
        Event::AdvisoryFailure { title, cause, hint } => {
            let mut lines = vec![warning(format!("{} failed: {}", title, cause))];
            if let Some(hint) = hint {
                lines.push(note(format!("  Install from: {}", hint)));
            }
            lines
        }
        Event::FatalFailure { title, cause } => {
            vec![error(format!("{} failed: {}", title, cause))]
        }
        Event::HealthWaiting {
            service,
            attempt,
            max_attempts,
        } => vec![note(format!(
            "Waiting for {}... ({}/{})",
            service, attempt, max_attempts
        ))],
        Event::ServiceSpawned { name, pid } => {
            let pid = pid
                .map(|pid| format!(" (pid {})", pid))
                .unwrap_or_default();
            vec![note(format!("  {} started{}", name, pid))]
        }
        Event::ServiceExited {
            name,
            status,
            recent_output,
        } => {
            let mut lines = vec![error(format!(
                "Service '{}' exited unexpectedly ({})",
                name, status
            ))];
            lines.extend(recent_output.iter().map(|line| note(format!("  | {}", line))));
            lines
        }
        Event::StartupComplete {
            project,
            services,
            health_url,
        } => banner(project, services, health_url),
        Event::ShutdownStarted { reason } if reason == "startup_failed" => {
            vec![note("Cleaning up started services...")]
        }
        Event::ShutdownStarted { .. } => vec!["".normal(), "Stopping application...".yellow()],
        Event::ShutdownAlreadyInProgress { .. } => {
            vec![note("Shutdown already in progress, please wait...")]
        }
        Event::ShutdownCompleted {
            forced,
            unresponsive,
            ..
        } => {
            let mut lines = Vec::new();
            if *forced > 0 {
                lines.push(warning(format!(
                    "{} service{} had to be force-killed",
                    forced,
                    if *forced == 1 { "" } else { "s" }
                )));
            }
            if !unresponsive.is_empty() {
                lines.push(error(format!(
                    "Could not confirm exit of: {}",
                    unresponsive.join(", ")
                )));
            }
            lines.push("✓ Application stopped.".green());
            lines
        }
    }
}

fn banner(project: &str, services: &[ServiceLine], health_url: &str) -> Vec<ColoredString> {
    let mut lines = vec![
        "".normal(),
        format!("=== {} is Running! ===", project).cyan().bold(),
        "".normal(),
    ];

    let width = services.iter().map(|s| s.name.len()).max().unwrap_or(0);
    for service in services {
        let state = match (&service.url, service.running) {
            (_, false) => "not started".to_string(),
            (Some(url), true) => url.clone(),
            (None, true) => "running".to_string(),
        };
        let label = format!("{}:", service.name);
        lines.push(format!("  {:<width$}  {}", label, state, width = width + 1).normal());
    }

    if services.iter().any(|s| !s.running) {
        lines.push("".normal());
        lines.push(note(format!("  Test the API with: curl {}", health_url)));
    }

    lines.push("".normal());
    lines.push("Press Ctrl+C to stop all services.".bold());
    lines
}
