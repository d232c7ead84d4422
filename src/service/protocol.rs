//! # Wire Types for the Client/Service Protocol
//!
//! Correlated request/response structures. Authorization and state
//! machine failures are carried inside the response payload, never at
//! the transport level, so callers can tell "wrong state" from "wrong
//! actor" from "connection lost".

use crate::error::TaskServiceError;
use crate::models::{Content, NewTask, Task, TaskSummary};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A lifecycle operation against one task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TaskOperation {
    Claim,
    Start,
    Complete { result: Option<Vec<u8>> },
    Fail { fault: Option<Vec<u8>> },
    Skip,
    Exit,
    Release,
    Suspend,
    Resume,
}

impl TaskOperation {
    /// Operation name used in logs and error payloads
    pub fn name(&self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::Start => "start",
            Self::Complete { .. } => "complete",
            Self::Fail { .. } => "fail",
            Self::Skip => "skip",
            Self::Exit => "exit",
            Self::Release => "release",
            Self::Suspend => "suspend",
            Self::Resume => "resume",
        }
    }
}

/// A single correlated request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub correlation_id: Uuid,
    pub command: TaskCommand,
}

/// Commands the service understands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TaskCommand {
    /// Apply a lifecycle operation as the given user
    Operate {
        task_id: i64,
        user: String,
        operation: TaskOperation,
    },
    /// Create a task from a spec
    AddTask { spec: NewTask },
    /// Fetch a full task snapshot
    GetTask { task_id: i64 },
    /// Fetch a content payload
    GetContent { content_id: i64 },
    /// Open tasks for which the user and/or groups are potential owners.
    /// `language` selects the human-readable projection locale.
    QueryPotentialOwner {
        user: Option<String>,
        groups: Vec<String>,
        language: String,
    },
    /// Open children of a parent task visible to the given potential owner
    QuerySubTasksPotentialOwner {
        parent_id: i64,
        user: String,
        language: String,
    },
}

impl TaskCommand {
    /// Command name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Operate { operation, .. } => operation.name(),
            Self::AddTask { .. } => "add_task",
            Self::GetTask { .. } => "get_task",
            Self::GetContent { .. } => "get_content",
            Self::QueryPotentialOwner { .. } => "query_potential_owner",
            Self::QuerySubTasksPotentialOwner { .. } => "query_sub_tasks_potential_owner",
        }
    }
}

/// A single correlated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub correlation_id: Uuid,
    pub outcome: ResponseOutcome,
}

/// Exactly one of these is delivered per request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ResponseOutcome {
    /// Operation applied; nothing to return
    Ack,
    /// Task created
    TaskAdded { task_id: i64 },
    /// Full task snapshot
    Task(Box<Task>),
    /// Content payload
    Content(Content),
    /// Query projection
    Summaries(Vec<TaskSummary>),
    /// Typed failure generated server-side
    Failure(TaskFailureKind),
}

/// Serializable mirror of the server-side failures delivered through the
/// correlation channel. Transport-level failures are synthesized on the
/// client and never appear here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TaskFailureKind {
    PermissionDenied {
        task_id: i64,
        user: String,
        operation: String,
    },
    InvalidState {
        task_id: i64,
        status: String,
        operation: String,
    },
    TaskNotFound {
        task_id: i64,
    },
    ContentNotFound {
        content_id: i64,
    },
    InvalidTaskSpec {
        message: String,
    },
    Internal {
        message: String,
    },
}

impl From<TaskServiceError> for TaskFailureKind {
    fn from(error: TaskServiceError) -> Self {
        match error {
            TaskServiceError::PermissionDenied {
                task_id,
                user,
                operation,
            } => Self::PermissionDenied {
                task_id,
                user,
                operation,
            },
            TaskServiceError::InvalidState {
                task_id,
                status,
                operation,
            } => Self::InvalidState {
                task_id,
                status,
                operation,
            },
            TaskServiceError::TaskNotFound { task_id } => Self::TaskNotFound { task_id },
            TaskServiceError::ContentNotFound { content_id } => {
                Self::ContentNotFound { content_id }
            }
            TaskServiceError::InvalidTaskSpec { message } => Self::InvalidTaskSpec { message },
            other => Self::Internal {
                message: other.to_string(),
            },
        }
    }
}

impl From<TaskFailureKind> for TaskServiceError {
    fn from(kind: TaskFailureKind) -> Self {
        match kind {
            TaskFailureKind::PermissionDenied {
                task_id,
                user,
                operation,
            } => Self::PermissionDenied {
                task_id,
                user,
                operation,
            },
            TaskFailureKind::InvalidState {
                task_id,
                status,
                operation,
            } => Self::InvalidState {
                task_id,
                status,
                operation,
            },
            TaskFailureKind::TaskNotFound { task_id } => Self::TaskNotFound { task_id },
            TaskFailureKind::ContentNotFound { content_id } => {
                Self::ContentNotFound { content_id }
            }
            TaskFailureKind::InvalidTaskSpec { message } => Self::InvalidTaskSpec { message },
            TaskFailureKind::Internal { message } => Self::Internal { message },
        }
    }
}
