//! # Task Client
//!
//! Asynchronous, multi-caller front end. Every call records its handler
//! under a fresh correlation id and pushes the request down the channel;
//! the send path never waits for the round trip. A background receive
//! loop pairs each response with its pending handler and delivers it
//! exactly once. When the transport closes, every still-pending handler
//! resolves with a transport failure instead of hanging forever.

use crate::error::{Result, TaskServiceError};
use crate::service::protocol::{
    ResponseOutcome, TaskCommand, TaskOperation, TaskRequest, TaskResponse,
};
use crate::service::TaskService;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};
use uuid::Uuid;

use super::responders::ResponseHandler;

#[derive(Default)]
struct ProtocolErrors {
    errors: Mutex<Vec<TaskServiceError>>,
}

impl ProtocolErrors {
    fn record(&self, error: TaskServiceError) {
        error!(%error, "Protocol error");
        self.errors.lock().push(error);
    }

    fn take(&self) -> Vec<TaskServiceError> {
        std::mem::take(&mut self.errors.lock())
    }
}

pub struct TaskClient {
    request_tx: mpsc::Sender<TaskRequest>,
    pending: Arc<DashMap<Uuid, Arc<dyn ResponseHandler>>>,
    protocol_errors: Arc<ProtocolErrors>,
}

impl TaskClient {
    /// Connect to an in-process task service
    pub fn connect(service: &TaskService) -> Self {
        let connection = service.connect();
        Self::from_transport(connection.request_tx, connection.response_rx)
    }

    /// Build a client over raw transport halves. The receive loop runs
    /// until `response_rx` closes, then flushes all pending handlers
    /// with a transport failure.
    pub fn from_transport(
        request_tx: mpsc::Sender<TaskRequest>,
        mut response_rx: mpsc::Receiver<TaskResponse>,
    ) -> Self {
        let pending: Arc<DashMap<Uuid, Arc<dyn ResponseHandler>>> = Arc::new(DashMap::new());
        let protocol_errors = Arc::new(ProtocolErrors::default());

        let receiving = pending.clone();
        let receive_errors = protocol_errors.clone();
        tokio::spawn(async move {
            while let Some(response) = response_rx.recv().await {
                match receiving.remove(&response.correlation_id) {
                    Some((_, handler)) => {
                        debug!(correlation_id = %response.correlation_id, "Response delivered");
                        handler.deliver(match response.outcome {
                            ResponseOutcome::Failure(kind) => Err(kind.into()),
                            outcome => Ok(outcome),
                        });
                    }
                    // A response for an unknown or already-resolved id is
                    // a protocol invariant violation, not noise
                    None => receive_errors.record(TaskServiceError::duplicate_correlation(
                        response.correlation_id.to_string(),
                    )),
                }
            }

            // Transport closed: resolve everything still in flight
            let stranded: Vec<Uuid> = receiving.iter().map(|entry| *entry.key()).collect();
            for correlation_id in stranded {
                if let Some((_, handler)) = receiving.remove(&correlation_id) {
                    handler.deliver(Err(TaskServiceError::transport_failure(
                        "connection closed before response arrived",
                    )));
                }
            }
        });

        Self {
            request_tx,
            pending,
            protocol_errors,
        }
    }

    /// Protocol errors observed by the receive loop so far
    pub fn take_protocol_errors(&self) -> Vec<TaskServiceError> {
        self.protocol_errors.take()
    }

    /// Number of requests awaiting a response
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    async fn send(
        &self,
        command: TaskCommand,
        handler: impl ResponseHandler + 'static,
    ) -> Result<Uuid> {
        let correlation_id = Uuid::new_v4();
        self.pending
            .insert(correlation_id, Arc::new(handler) as Arc<dyn ResponseHandler>);

        debug!(%correlation_id, command = command.name(), "Request sent");
        if self
            .request_tx
            .send(TaskRequest {
                correlation_id,
                command,
            })
            .await
            .is_err()
        {
            // Channel gone; resolve the handler we just parked
            if let Some((_, handler)) = self.pending.remove(&correlation_id) {
                handler.deliver(Err(TaskServiceError::transport_failure(
                    "connection closed before request could be sent",
                )));
            }
            return Err(TaskServiceError::transport_failure(
                "connection closed before request could be sent",
            ));
        }
        Ok(correlation_id)
    }

    async fn operate(
        &self,
        task_id: i64,
        user: &str,
        operation: TaskOperation,
        handler: impl ResponseHandler + 'static,
    ) -> Result<Uuid> {
        self.send(
            TaskCommand::Operate {
                task_id,
                user: user.to_string(),
                operation,
            },
            handler,
        )
        .await
    }

    pub async fn claim(
        &self,
        task_id: i64,
        user: &str,
        handler: impl ResponseHandler + 'static,
    ) -> Result<Uuid> {
        self.operate(task_id, user, TaskOperation::Claim, handler).await
    }

    pub async fn start(
        &self,
        task_id: i64,
        user: &str,
        handler: impl ResponseHandler + 'static,
    ) -> Result<Uuid> {
        self.operate(task_id, user, TaskOperation::Start, handler).await
    }

    pub async fn complete(
        &self,
        task_id: i64,
        user: &str,
        result: Option<Vec<u8>>,
        handler: impl ResponseHandler + 'static,
    ) -> Result<Uuid> {
        self.operate(task_id, user, TaskOperation::Complete { result }, handler)
            .await
    }

    pub async fn fail(
        &self,
        task_id: i64,
        user: &str,
        fault: Option<Vec<u8>>,
        handler: impl ResponseHandler + 'static,
    ) -> Result<Uuid> {
        self.operate(task_id, user, TaskOperation::Fail { fault }, handler)
            .await
    }

    pub async fn skip(
        &self,
        task_id: i64,
        user: &str,
        handler: impl ResponseHandler + 'static,
    ) -> Result<Uuid> {
        self.operate(task_id, user, TaskOperation::Skip, handler).await
    }

    pub async fn exit(
        &self,
        task_id: i64,
        user: &str,
        handler: impl ResponseHandler + 'static,
    ) -> Result<Uuid> {
        self.operate(task_id, user, TaskOperation::Exit, handler).await
    }

    pub async fn release(
        &self,
        task_id: i64,
        user: &str,
        handler: impl ResponseHandler + 'static,
    ) -> Result<Uuid> {
        self.operate(task_id, user, TaskOperation::Release, handler).await
    }

    pub async fn suspend(
        &self,
        task_id: i64,
        user: &str,
        handler: impl ResponseHandler + 'static,
    ) -> Result<Uuid> {
        self.operate(task_id, user, TaskOperation::Suspend, handler).await
    }

    pub async fn resume(
        &self,
        task_id: i64,
        user: &str,
        handler: impl ResponseHandler + 'static,
    ) -> Result<Uuid> {
        self.operate(task_id, user, TaskOperation::Resume, handler).await
    }

    pub async fn add_task(
        &self,
        spec: crate::models::NewTask,
        handler: impl ResponseHandler + 'static,
    ) -> Result<Uuid> {
        self.send(TaskCommand::AddTask { spec }, handler).await
    }

    pub async fn get_task(
        &self,
        task_id: i64,
        handler: impl ResponseHandler + 'static,
    ) -> Result<Uuid> {
        self.send(TaskCommand::GetTask { task_id }, handler).await
    }

    pub async fn get_content(
        &self,
        content_id: i64,
        handler: impl ResponseHandler + 'static,
    ) -> Result<Uuid> {
        self.send(TaskCommand::GetContent { content_id }, handler).await
    }

    /// Open tasks for which the user and/or the given groups are
    /// potential owners
    pub async fn get_tasks_assigned_as_potential_owner(
        &self,
        user: Option<&str>,
        groups: &[String],
        language: &str,
        handler: impl ResponseHandler + 'static,
    ) -> Result<Uuid> {
        self.send(
            TaskCommand::QueryPotentialOwner {
                user: user.map(str::to_string),
                groups: groups.to_vec(),
                language: language.to_string(),
            },
            handler,
        )
        .await
    }

    /// Open children of a parent task visible to the given potential owner
    pub async fn get_sub_tasks_assigned_as_potential_owner(
        &self,
        parent_id: i64,
        user: &str,
        language: &str,
        handler: impl ResponseHandler + 'static,
    ) -> Result<Uuid> {
        self.send(
            TaskCommand::QuerySubTasksPotentialOwner {
                parent_id,
                user: user.to_string(),
                language: language.to_string(),
            },
            handler,
        )
        .await
    }

    /// Close the connection. In-flight requests already accepted by the
    /// service still produce responses; anything the transport drops is
    /// resolved as a transport failure by the receive loop.
    pub fn disconnect(self) {
        drop(self.request_tx);
    }
}
