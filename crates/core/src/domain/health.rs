use serde::{Deserialize, Serialize};

/// Outcome of one health poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// Whether any attempt returned a 2xx status
    pub ready: bool,
    /// Number of requests actually made
    pub attempts: u32,
}

impl HealthCheckResult {
    pub fn ready(attempts: u32) -> Self {
        Self {
            ready: true,
            attempts,
        }
    }

    pub fn not_ready(attempts: u32) -> Self {
        Self {
            ready: false,
            attempts,
        }
    }
}
