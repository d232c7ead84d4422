//! # Error Types
//!
//! Structured error handling for the task service using thiserror
//! instead of `Box<dyn Error>` patterns. Authorization and state machine
//! failures travel back to callers as typed payloads over the same
//! correlation channel as successful outcomes; `TransportFailure` and
//! `DuplicateCorrelation` are synthesized on the client side.

use thiserror::Error;

/// Errors produced by the task service, the state machine, the
/// authorization engine, and the client protocol layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskServiceError {
    #[error("permission denied: user '{user}' may not {operation} task {task_id}")]
    PermissionDenied {
        task_id: i64,
        user: String,
        operation: String,
    },

    #[error("invalid state: task {task_id} is {status}, cannot {operation}")]
    InvalidState {
        task_id: i64,
        status: String,
        operation: String,
    },

    #[error("task not found: {task_id}")]
    TaskNotFound { task_id: i64 },

    #[error("content not found: {content_id}")]
    ContentNotFound { content_id: i64 },

    #[error("transport failure: {message}")]
    TransportFailure { message: String },

    #[error("duplicate correlation id: {correlation_id}")]
    DuplicateCorrelation { correlation_id: String },

    #[error("invalid task spec: {message}")]
    InvalidTaskSpec { message: String },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("internal task service error: {message}")]
    Internal { message: String },
}

impl TaskServiceError {
    /// Create a permission denial for an operation attempted by a user
    pub fn permission_denied(
        task_id: i64,
        user: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self::PermissionDenied {
            task_id,
            user: user.into(),
            operation: operation.into(),
        }
    }

    /// Create an invalid-state rejection for an operation
    pub fn invalid_state(
        task_id: i64,
        status: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            task_id,
            status: status.into(),
            operation: operation.into(),
        }
    }

    /// Create a transport failure error
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self::TransportFailure {
            message: message.into(),
        }
    }

    /// Create a duplicate-correlation protocol error
    pub fn duplicate_correlation(correlation_id: impl Into<String>) -> Self {
        Self::DuplicateCorrelation {
            correlation_id: correlation_id.into(),
        }
    }

    /// Create an invalid task spec error
    pub fn invalid_task_spec(message: impl Into<String>) -> Self {
        Self::InvalidTaskSpec {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error indicates the task was in the wrong state,
    /// as opposed to the actor being the wrong one
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }

    /// Whether this error indicates an unauthorized actor
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }
}

pub type Result<T> = std::result::Result<T, TaskServiceError>;
