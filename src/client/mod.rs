//! # Client Side
//!
//! Correlated asynchronous client and the response-handler types callers
//! use to receive outcomes, including blocking adapters for callers that
//! need to park a thread until a response lands.

pub mod responders;
pub mod task_client;

pub use responders::{
    BlockingAddTaskResponseHandler, BlockingGetContentResponseHandler,
    BlockingGetTaskResponseHandler, BlockingTaskOperationResponseHandler,
    BlockingTaskSummaryResponseHandler, ResponseHandler,
};
pub use task_client::TaskClient;
