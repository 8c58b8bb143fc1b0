//! The fixed, ordered list of steps a launch runs through.

use async_trait::async_trait;
use stackup_core::StepSeverity;

use crate::error::Result;

/// What a successful step has to say for itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Done, with a line for the user
    Completed(String),
    /// Nothing to do
    Skipped(String),
    /// Done, but with a caveat worth a warning
    Degraded(String),
}

/// The work behind one plan step.
#[async_trait]
pub trait StepAction: Send + Sync {
    async fn run(&self) -> Result<StepOutcome>;
}

pub struct PlanStep {
    title: String,
    severity: StepSeverity,
    action: Box<dyn StepAction>,
}

impl PlanStep {
    pub fn new(
        title: impl Into<String>,
        severity: StepSeverity,
        action: impl StepAction + 'static,
    ) -> Self {
        Self {
            title: title.into(),
            severity,
            action: Box::new(action),
        }
    }

    /// A step whose failure aborts the run.
    pub fn fatal(title: impl Into<String>, action: impl StepAction + 'static) -> Self {
        Self::new(title, StepSeverity::Fatal, action)
    }

    /// A step whose failure is only logged.
    pub fn advisory(title: impl Into<String>, action: impl StepAction + 'static) -> Self {
        Self::new(title, StepSeverity::Advisory, action)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn severity(&self) -> StepSeverity {
        self.severity
    }

    pub(crate) async fn run(&self) -> Result<StepOutcome> {
        self.action.run().await
    }
}

impl std::fmt::Debug for PlanStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanStep")
            .field("title", &self.title)
            .field("severity", &self.severity)
            .finish()
    }
}

/// Ordered steps, fixed at construction.
#[derive(Debug)]
pub struct OrchestrationPlan {
    steps: Vec<PlanStep>,
}

impl OrchestrationPlan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
