use stackup_core::ProcessState;

use crate::error::{Result, SupervisorError};

pub struct ProcessStateMachine;

impl ProcessStateMachine {
    pub fn validate_transition(from: &ProcessState, to: &ProcessState) -> Result<()> {
        if Self::allowed_transitions(from).contains(to) {
            Ok(())
        } else {
            Err(SupervisorError::InvalidTransition {
                from: *from,
                to: *to,
            })
        }
    }

    fn allowed_transitions(from: &ProcessState) -> &'static [ProcessState] {
        match from {
            // A child can die before we ever look at it
            ProcessState::Spawned => &[ProcessState::Running, ProcessState::Exited],
            ProcessState::Running => &[ProcessState::GraceTerminating, ProcessState::Exited],
            ProcessState::GraceTerminating => {
                &[ProcessState::ForceTerminating, ProcessState::Exited]
            }
            ProcessState::ForceTerminating => &[ProcessState::Exited],
            ProcessState::Exited => &[],
        }
    }

    pub fn can_transition(from: &ProcessState, to: &ProcessState) -> bool {
        Self::validate_transition(from, to).is_ok()
    }
}
