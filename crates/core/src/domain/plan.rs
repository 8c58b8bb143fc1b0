use serde::{Deserialize, Serialize};

/// How a plan step's failure affects the rest of the run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepSeverity {
    /// Abort the whole run and exit non-zero.
    Fatal,
    /// Log a warning and continue with the next step.
    Advisory,
}

impl StepSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fatal => "fatal",
            Self::Advisory => "advisory",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal)
    }
}
