//! Runs an [`OrchestrationPlan`] strictly in order.

use events::{Event, EventBus};
use stackup_core::StepSeverity;
use tracing::{error, info, warn};

use crate::error::{OrchestratorError, Result};
use crate::plan::{OrchestrationPlan, StepOutcome};

/// How a step ended, as recorded in the [`PlanReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Completed(String),
    Skipped(String),
    Degraded(String),
    /// An advisory step failed; the cause is kept
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub title: String,
    pub severity: StepSeverity,
    pub status: StepStatus,
}

/// Trace of every step that ran, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanReport {
    pub records: Vec<StepRecord>,
}

impl PlanReport {
    /// Number of advisory failures and degraded steps.
    pub fn warning_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.status, StepStatus::Failed(_) | StepStatus::Degraded(_)))
            .count()
    }
}

pub struct PlanExecutor {
    events: EventBus,
}

impl PlanExecutor {
    pub fn new(events: EventBus) -> Self {
        Self { events }
    }

    /// Each step completes before the next starts. A fatal failure returns
    /// immediately; an advisory one is reported and the plan carries on.
    pub async fn execute(&self, plan: &OrchestrationPlan) -> Result<PlanReport> {
        let total = plan.len();
        let mut report = PlanReport::default();

        for (index, step) in plan.steps().iter().enumerate() {
            let title = step.title().to_string();
            info!(step = %title, index = index + 1, total, "Running step");
            self.events.emit(Event::StepStarted {
                index: index + 1,
                total,
                title: title.clone(),
            });

            let status = match step.run().await {
                Ok(StepOutcome::Completed(detail)) => {
                    self.events.emit(Event::StepSucceeded {
                        title: title.clone(),
                        detail: detail.clone(),
                    });
                    StepStatus::Completed(detail)
                }
                Ok(StepOutcome::Skipped(reason)) => {
                    self.events.emit(Event::StepSkipped {
                        title: title.clone(),
                        reason: reason.clone(),
                    });
                    StepStatus::Skipped(reason)
                }
                Ok(StepOutcome::Degraded(warning)) => {
                    warn!(step = %title, "{}", warning);
                    self.events.emit(Event::StepDegraded {
                        title: title.clone(),
                        warning: warning.clone(),
                    });
                    StepStatus::Degraded(warning)
                }
                Err(e) if step.severity().is_fatal() => {
                    error!(step = %title, error = %e, "Fatal step failed");
                    self.events.emit(Event::FatalFailure {
                        title: title.clone(),
                        cause: e.to_string(),
                    });
                    return Err(OrchestratorError::step_failed(title, e));
                }
                Err(e) => {
                    warn!(step = %title, error = %e, "Advisory step failed, continuing");
                    self.events.emit(Event::AdvisoryFailure {
                        title: title.clone(),
                        cause: e.to_string(),
                        hint: e.hint().map(str::to_string),
                    });
                    StepStatus::Failed(e.to_string())
                }
            };

            report.records.push(StepRecord {
                title,
                severity: step.severity(),
                status,
            });
        }

        Ok(report)
    }
}
