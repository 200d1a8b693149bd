//! State machine tracking one package through its pipeline
//!
//! Transitions are kept in memory with timestamps and emitted as tracing
//! events. Nothing is persisted; a run is not resumable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline state of a package
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Pending,
    Uploading,
    UploadFailed,
    UploadSucceeded,
    Publishing,
    PublishFailed,
    Published,
}

impl PipelineState {
    /// Check whether `to` is reachable from this state in one step
    ///
    /// Failed states may go back to their stage once for a retry; the
    /// pipeline enforces the single-retry limit.
    pub fn can_transition_to(self, to: PipelineState) -> bool {
        use PipelineState::*;

        matches!(
            (self, to),
            (Pending, Uploading)
                | (Pending, UploadFailed)
                | (Uploading, UploadFailed)
                | (Uploading, UploadSucceeded)
                | (UploadFailed, Uploading)
                | (UploadSucceeded, Publishing)
                | (Publishing, PublishFailed)
                | (Publishing, Published)
                | (PublishFailed, Publishing)
        )
    }
}

/// State transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateTransition {
    pub from: PipelineState,
    pub to: PipelineState,
    pub timestamp: DateTime<Utc>,
}

/// State machine for one package pipeline
#[derive(Debug)]
pub struct PackageStateMachine {
    package: String,
    current_state: PipelineState,
    transitions: Vec<StateTransition>,
}

impl PackageStateMachine {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            current_state: PipelineState::Pending,
            transitions: Vec::new(),
        }
    }

    /// Transition to a new state
    pub fn transition(&mut self, to: PipelineState) {
        debug_assert!(
            self.current_state.can_transition_to(to),
            "invalid transition {:?} -> {:?}",
            self.current_state,
            to
        );

        tracing::debug!(
            package = %self.package,
            from = ?self.current_state,
            to = ?to,
            "pipeline transition"
        );

        self.transitions.push(StateTransition {
            from: self.current_state,
            to,
            timestamp: Utc::now(),
        });
        self.current_state = to;
    }

    /// Get current state
    pub fn get_state(&self) -> PipelineState {
        self.current_state
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// Elapsed milliseconds between first and last transition
    pub fn get_elapsed_time(&self) -> i64 {
        match (self.transitions.first(), self.transitions.last()) {
            (Some(first), Some(last)) => (last.timestamp - first.timestamp).num_milliseconds(),
            _ => 0,
        }
    }

    /// Get transition history as human-readable string
    pub fn get_history(&self) -> String {
        self.transitions
            .iter()
            .map(|t| format!("{}: {:?} → {:?}", t.timestamp.to_rfc3339(), t.from, t.to))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_machine() {
        let state_machine = PackageStateMachine::new("test1");

        assert_eq!(state_machine.get_state(), PipelineState::Pending);
        assert!(state_machine.transitions().is_empty());
        assert_eq!(state_machine.get_elapsed_time(), 0);
    }

    #[test]
    fn test_upload_and_publish_path() {
        let mut state_machine = PackageStateMachine::new("test1");

        state_machine.transition(PipelineState::Uploading);
        state_machine.transition(PipelineState::UploadSucceeded);
        state_machine.transition(PipelineState::Publishing);
        state_machine.transition(PipelineState::Published);

        assert_eq!(state_machine.get_state(), PipelineState::Published);
        assert_eq!(state_machine.transitions().len(), 4);
    }

    #[test]
    fn test_retry_transitions() {
        let mut state_machine = PackageStateMachine::new("test1");

        state_machine.transition(PipelineState::Uploading);
        state_machine.transition(PipelineState::UploadFailed);
        state_machine.transition(PipelineState::Uploading);
        state_machine.transition(PipelineState::UploadFailed);

        let uploads = state_machine
            .transitions()
            .iter()
            .filter(|t| t.to == PipelineState::Uploading)
            .count();
        assert_eq!(uploads, 2);
        assert_eq!(state_machine.get_state(), PipelineState::UploadFailed);
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!PipelineState::Pending.can_transition_to(PipelineState::Publishing));
        assert!(!PipelineState::UploadFailed.can_transition_to(PipelineState::Publishing));
        assert!(!PipelineState::Published.can_transition_to(PipelineState::Uploading));
        assert!(PipelineState::Pending.can_transition_to(PipelineState::UploadFailed));
    }

    #[test]
    fn test_get_history() {
        let mut state_machine = PackageStateMachine::new("test1");

        state_machine.transition(PipelineState::Uploading);
        state_machine.transition(PipelineState::UploadSucceeded);

        let history = state_machine.get_history();
        assert!(history.contains("Pending → Uploading"));
        assert!(history.contains("Uploading → UploadSucceeded"));
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&PipelineState::UploadFailed).unwrap();
        assert_eq!(json, r#""UPLOAD_FAILED""#);
    }
}
