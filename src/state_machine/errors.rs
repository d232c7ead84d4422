use thiserror::Error;

/// Errors raised while validating or applying a state transition
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateMachineError {
    #[error("invalid transition: cannot apply '{event}' from state '{from}'")]
    InvalidTransition { from: String, event: String },

    #[error("task has no prior state to resume to")]
    NoPriorState,

    #[error("internal state machine error: {0}")]
    Internal(String),
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;

/// Helper for building invalid-transition errors
pub fn invalid_transition(from: impl ToString, event: impl Into<String>) -> StateMachineError {
    StateMachineError::InvalidTransition {
        from: from.to_string(),
        event: event.into(),
    }
}
