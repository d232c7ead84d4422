//! Server side: wire protocol types, the request-processing service,
//! and sub-task cascade evaluation.

mod cascade;
pub mod protocol;
pub mod task_service;

pub use protocol::{
    ResponseOutcome, TaskCommand, TaskFailureKind, TaskOperation, TaskRequest, TaskResponse,
};
pub use task_service::{ServiceConnection, TaskService, ADMINISTRATOR_USER};
