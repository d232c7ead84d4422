//! # Response Handlers
//!
//! A response handler receives exactly one of success-with-result,
//! success-with-no-result, or typed failure. The blocking variants layer
//! a set-once slot with a timed wait over the async delivery path:
//! `wait_till_done` returning false means "not yet complete", never
//! "gone" — the eventual outcome is still accepted and still surfaces
//! from the result accessors, including failures that arrive after a
//! waiter gave up.

use crate::error::{Result, TaskServiceError};
use crate::models::{Content, Task, TaskSummary};
use crate::service::protocol::ResponseOutcome;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Receives the correlated outcome of one request, exactly once
pub trait ResponseHandler: Send + Sync {
    fn deliver(&self, outcome: Result<ResponseOutcome>);
}

/// Closures work as fire-and-forget handlers
impl<F> ResponseHandler for F
where
    F: Fn(Result<ResponseOutcome>) + Send + Sync,
{
    fn deliver(&self, outcome: Result<ResponseOutcome>) {
        self(outcome);
    }
}

/// Single-resolution slot shared between the caller and the client's
/// receive loop
#[derive(Default)]
struct Slot {
    outcome: Mutex<Option<Result<ResponseOutcome>>>,
    resolved: Condvar,
}

impl Slot {
    /// Store the outcome and wake every waiter. Returns false if the
    /// slot was already resolved.
    fn resolve(&self, outcome: Result<ResponseOutcome>) -> bool {
        let mut slot = self.outcome.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(outcome);
        self.resolved.notify_all();
        true
    }

    /// Wait until resolved or the timeout elapses. Returns whether the
    /// slot is resolved.
    fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slot = self.outcome.lock();
        while slot.is_none() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            if self
                .resolved
                .wait_for(&mut slot, deadline - now)
                .timed_out()
                && slot.is_none()
            {
                return false;
            }
        }
        true
    }

    fn current(&self) -> Result<ResponseOutcome> {
        match self.outcome.lock().clone() {
            Some(outcome) => outcome,
            None => Err(TaskServiceError::internal("response not yet delivered")),
        }
    }
}

macro_rules! blocking_handler {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Default)]
        pub struct $name {
            slot: Arc<Slot>,
        }

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }

            /// Block until the outcome arrives or the timeout elapses.
            /// Returns whether the outcome has arrived.
            pub fn wait_till_done(&self, timeout: Duration) -> bool {
                self.slot.wait(timeout)
            }

            /// Whether the outcome has been delivered
            pub fn is_done(&self) -> bool {
                self.slot.outcome.lock().is_some()
            }
        }

        impl ResponseHandler for $name {
            fn deliver(&self, outcome: Result<ResponseOutcome>) {
                self.slot.resolve(outcome);
            }
        }
    };
}

blocking_handler! {
    /// Blocking handler for lifecycle operations (claim, start, ...)
    BlockingTaskOperationResponseHandler
}

impl BlockingTaskOperationResponseHandler {
    /// The operation outcome; failures surface as errors
    pub fn result(&self) -> Result<()> {
        match self.slot.current()? {
            ResponseOutcome::Ack => Ok(()),
            other => Err(unexpected(&other)),
        }
    }
}

blocking_handler! {
    /// Blocking handler for task creation
    BlockingAddTaskResponseHandler
}

impl BlockingAddTaskResponseHandler {
    pub fn get_task_id(&self) -> Result<i64> {
        match self.slot.current()? {
            ResponseOutcome::TaskAdded { task_id } => Ok(task_id),
            other => Err(unexpected(&other)),
        }
    }
}

blocking_handler! {
    /// Blocking handler for full task snapshots
    BlockingGetTaskResponseHandler
}

impl BlockingGetTaskResponseHandler {
    pub fn get_task(&self) -> Result<Task> {
        match self.slot.current()? {
            ResponseOutcome::Task(task) => Ok(*task),
            other => Err(unexpected(&other)),
        }
    }
}

blocking_handler! {
    /// Blocking handler for content payload fetches
    BlockingGetContentResponseHandler
}

impl BlockingGetContentResponseHandler {
    pub fn get_content(&self) -> Result<Content> {
        match self.slot.current()? {
            ResponseOutcome::Content(content) => Ok(content),
            other => Err(unexpected(&other)),
        }
    }
}

blocking_handler! {
    /// Blocking handler for task summary queries
    BlockingTaskSummaryResponseHandler
}

impl BlockingTaskSummaryResponseHandler {
    pub fn get_results(&self) -> Result<Vec<TaskSummary>> {
        match self.slot.current()? {
            ResponseOutcome::Summaries(summaries) => Ok(summaries),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(outcome: &ResponseOutcome) -> TaskServiceError {
    TaskServiceError::internal(format!("unexpected response payload: {outcome:?}"))
}
