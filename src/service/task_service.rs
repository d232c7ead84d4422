//! # Task Service
//!
//! Server side of the protocol. Each connection feeds a request loop
//! that spawns one processing task per request, so requests are handled
//! in isolation with no ordering between correlation ids. Per-task
//! consistency comes from a per-task-id async mutex: concurrent
//! operations against the same task serialize, operations against
//! different tasks proceed independently.

use crate::authorization::AuthorizationEngine;
use crate::bridge::{ProcessEventListener, RESULTS_ACTOR_ID_KEY, RESULTS_RESULT_KEY};
use crate::config::HumanTaskConfig;
use crate::content_store::ContentStore;
use crate::directory::UserDirectory;
use crate::error::{Result, TaskServiceError};
use crate::models::{NewTask, Task};
use crate::repository::{InMemoryTaskRepository, TaskRepository};
use crate::state_machine::{StateMachineError, TaskEvent, TaskStateMachine, TaskStatus};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use super::cascade;
use super::protocol::{ResponseOutcome, TaskCommand, TaskOperation, TaskRequest, TaskResponse};

/// User id the service acts as when the owning process aborts a work item
pub const ADMINISTRATOR_USER: &str = "Administrator";

/// Per-task-id mutual exclusion. Locks are created on first use and
/// acquired one at a time; callers never hold two of them at once.
#[derive(Default)]
pub(crate) struct TaskLockRegistry {
    locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl TaskLockRegistry {
    pub(crate) async fn acquire(&self, task_id: i64) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(task_id).or_default().clone();
        lock.lock_owned().await
    }

    /// Forget the lock of a task that no longer exists. Outstanding
    /// guards stay valid through their own `Arc`.
    pub(crate) fn discard(&self, task_id: i64) {
        self.locks.remove(&task_id);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}

/// One client connection: a request sender and a response receiver over
/// a reliable ordered channel pair.
pub struct ServiceConnection {
    pub request_tx: mpsc::Sender<TaskRequest>,
    pub response_rx: mpsc::Receiver<TaskResponse>,
}

pub(crate) struct ServiceInner {
    repository: Arc<dyn TaskRepository>,
    content_store: Arc<ContentStore>,
    directory: Arc<dyn UserDirectory>,
    authorization: AuthorizationEngine,
    locks: TaskLockRegistry,
    listeners: DashMap<i64, Arc<dyn ProcessEventListener>>,
    config: HumanTaskConfig,
}

/// Handle to a running task service. Cheap to clone; all clones share
/// the same state.
#[derive(Clone)]
pub struct TaskService {
    inner: Arc<ServiceInner>,
}

impl TaskService {
    pub fn new(
        repository: Arc<dyn TaskRepository>,
        directory: Arc<dyn UserDirectory>,
        config: HumanTaskConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                repository,
                content_store: Arc::new(ContentStore::new()),
                directory,
                authorization: AuthorizationEngine::new(config.unclaimed_skip_policy),
                locks: TaskLockRegistry::default(),
                listeners: DashMap::new(),
                config,
            }),
        }
    }

    /// Convenience constructor backed by the in-memory repository
    pub fn in_memory(directory: Arc<dyn UserDirectory>, config: HumanTaskConfig) -> Self {
        Self::new(Arc::new(InMemoryTaskRepository::new()), directory, config)
    }

    /// Open a connection for one client. Requests flowing in are
    /// processed concurrently; each response carries the correlation id
    /// of the request that produced it.
    pub fn connect(&self) -> ServiceConnection {
        let (request_tx, mut request_rx) =
            mpsc::channel::<TaskRequest>(self.inner.config.request_channel_capacity);
        let (response_tx, response_rx) =
            mpsc::channel::<TaskResponse>(self.inner.config.response_channel_capacity);

        let inner = self.inner.clone();
        tokio::spawn(async move {
            while let Some(request) = request_rx.recv().await {
                let inner = inner.clone();
                let response_tx = response_tx.clone();
                tokio::spawn(async move {
                    debug!(
                        correlation_id = %request.correlation_id,
                        command = request.command.name(),
                        "Processing request"
                    );
                    let outcome = match inner.execute(request.command).await {
                        Ok(outcome) => outcome,
                        Err(error) => ResponseOutcome::Failure(error.into()),
                    };
                    let _ = response_tx
                        .send(TaskResponse {
                            correlation_id: request.correlation_id,
                            outcome,
                        })
                        .await;
                });
            }
        });

        ServiceConnection {
            request_tx,
            response_rx,
        }
    }

    /// Register the listener receiving terminal callbacks for a process
    /// instance
    pub fn register_process_listener(
        &self,
        process_instance_id: i64,
        listener: Arc<dyn ProcessEventListener>,
    ) {
        self.inner.listeners.insert(process_instance_id, listener);
    }

    /// Stop delivering terminal callbacks for a process instance
    pub fn unregister_process_listener(&self, process_instance_id: i64) {
        self.inner.listeners.remove(&process_instance_id);
    }

    /// Create a task from a spec, storing any payload and performing
    /// initial placement. Returns the new task id.
    pub async fn add_task(&self, spec: NewTask) -> Result<i64> {
        self.inner.add_task(spec).await
    }

    /// Drive one task to Skipped (when permitted) or Exited on behalf of
    /// its aborting process
    pub async fn abort_task(&self, task_id: i64) -> Result<()> {
        self.inner.abort_task(task_id).await
    }

    /// Abort every open task of a process instance
    pub async fn abort_process_tasks(&self, process_instance_id: i64) -> Result<()> {
        let tasks = self
            .inner
            .repository
            .find_by_process_instance(process_instance_id)
            .await?;
        for task in tasks {
            // An earlier abort may have cascaded into this task; decide
            // from its current status, not the query snapshot
            let current = self.inner.repository.find_by_id(task.task_id).await?;
            if !current.status.is_terminal() {
                self.inner.abort_task(current.task_id).await?;
            }
        }
        Ok(())
    }

    /// Direct (in-process) task snapshot lookup
    pub async fn get_task(&self, task_id: i64) -> Result<Task> {
        self.inner.repository.find_by_id(task_id).await
    }

    /// Administrative removal of a task record, including its lock entry
    pub async fn purge_task(&self, task_id: i64) -> Result<()> {
        {
            let _guard = self.inner.locks.acquire(task_id).await;
            self.inner.repository.purge(task_id).await?;
        }
        self.inner.locks.discard(task_id);
        Ok(())
    }
}

impl ServiceInner {
    pub(crate) async fn execute(self: &Arc<Self>, command: TaskCommand) -> Result<ResponseOutcome> {
        match command {
            TaskCommand::Operate {
                task_id,
                user,
                operation,
            } => self.operate(task_id, &user, operation).await,
            TaskCommand::AddTask { spec } => {
                let task_id = self.add_task(spec).await?;
                Ok(ResponseOutcome::TaskAdded { task_id })
            }
            TaskCommand::GetTask { task_id } => {
                let task = self.repository.find_by_id(task_id).await?;
                Ok(ResponseOutcome::Task(Box::new(task)))
            }
            TaskCommand::GetContent { content_id } => {
                let content = self.content_store.get(content_id)?;
                Ok(ResponseOutcome::Content(content))
            }
            TaskCommand::QueryPotentialOwner {
                user,
                groups,
                language,
            } => {
                debug!(?user, ?groups, language, "Potential-owner query");
                let groups = self.effective_groups(user.as_deref(), groups).await;
                let summaries = self
                    .repository
                    .find_by_potential_owner(user.as_deref(), &groups)
                    .await?;
                Ok(ResponseOutcome::Summaries(summaries))
            }
            TaskCommand::QuerySubTasksPotentialOwner {
                parent_id,
                user,
                language,
            } => {
                debug!(parent_id, user, language, "Sub-task query");
                let groups = self.effective_groups(Some(&user), Vec::new()).await;
                let summaries = self
                    .repository
                    .find_sub_tasks_for_potential_owner(parent_id, &user, &groups)
                    .await?;
                Ok(ResponseOutcome::Summaries(summaries))
            }
        }
    }

    /// Union of the caller-provided group set and the directory's view of
    /// the user, queried at operation time
    async fn effective_groups(&self, user: Option<&str>, mut groups: Vec<String>) -> Vec<String> {
        if let Some(user) = user {
            for group in self.directory.groups_of(user).await {
                if !groups.contains(&group) {
                    groups.push(group);
                }
            }
        }
        groups
    }

    async fn add_task(self: &Arc<Self>, spec: NewTask) -> Result<i64> {
        if let Some(parent_id) = spec.parent_id {
            // Parent must exist before a child can reference it
            self.repository.find_by_id(parent_id).await?;
        }

        let task_id = self.repository.next_task_id();
        let content_id = spec
            .content
            .as_ref()
            .map(|bytes| self.content_store.put(bytes.clone()));

        let mut task = Task::from_spec(task_id, &spec, content_id);
        TaskStateMachine::new(&mut task)
            .transition(TaskEvent::Activate)
            .map_err(|e| TaskServiceError::internal(e.to_string()))?;

        info!(
            task_id,
            name = %task.name,
            status = %task.status,
            parent_id = ?task.parent_id,
            process_instance_id = task.process_instance_id,
            "Task created"
        );
        self.repository.save(task).await?;
        Ok(task_id)
    }

    async fn operate(
        self: &Arc<Self>,
        task_id: i64,
        user: &str,
        operation: TaskOperation,
    ) -> Result<ResponseOutcome> {
        let groups = self.directory.groups_of(user).await;
        let completion_payload = match &operation {
            TaskOperation::Complete { result } => result.clone(),
            _ => None,
        };
        let fault_payload = match &operation {
            TaskOperation::Fail { fault } => fault.clone(),
            _ => None,
        };

        let task = {
            let _guard = self.locks.acquire(task_id).await;
            let mut task = self.repository.find_by_id(task_id).await?;
            self.authorization
                .authorize(&operation, &task, user, &groups)?;

            let event = event_for(&operation, user);
            if let Err(error) = TaskStateMachine::new(&mut task).transition(event) {
                return Err(match error {
                    StateMachineError::InvalidTransition { .. }
                    | StateMachineError::NoPriorState => TaskServiceError::invalid_state(
                        task_id,
                        task.status.to_string(),
                        operation.name(),
                    ),
                    StateMachineError::Internal(message) => TaskServiceError::internal(message),
                });
            }
            if let Some(bytes) = &completion_payload {
                task.output_content_id = self.content_store.put(bytes.clone());
            }
            if let Some(bytes) = &fault_payload {
                task.fault_content_id = self.content_store.put(bytes.clone());
            }
            self.repository.save(task.clone()).await?;
            task
        };

        info!(
            task_id,
            user,
            operation = operation.name(),
            status = %task.status,
            "Operation applied"
        );

        if task.status.is_terminal() {
            self.notify_terminal(&task, user, completion_payload.as_deref())
                .await;
            let forced = cascade::drive(&self.repository, &self.locks, task_id).await?;
            for task in forced {
                let actor = task
                    .actual_owner
                    .clone()
                    .unwrap_or_else(|| ADMINISTRATOR_USER.to_string());
                self.notify_terminal(&task, &actor, None).await;
            }
        }

        Ok(ResponseOutcome::Ack)
    }

    async fn abort_task(self: &Arc<Self>, task_id: i64) -> Result<()> {
        let task = self.repository.find_by_id(task_id).await?;
        let operation = if task.skippable
            && matches!(
                task.status,
                TaskStatus::Created | TaskStatus::Ready | TaskStatus::Reserved
            ) {
            TaskOperation::Skip
        } else {
            TaskOperation::Exit
        };
        self.operate(task_id, ADMINISTRATOR_USER, operation)
            .await
            .map(|_| ())
    }

    /// Invoke the process callback for a task that just reached a
    /// terminal state. Fires at most once per task: tasks only enter a
    /// terminal state once, and cascade re-evaluation of an already
    /// terminal task is a no-op.
    async fn notify_terminal(&self, task: &Task, actor: &str, result: Option<&[u8]>) {
        let listener = self
            .listeners
            .get(&task.process_instance_id)
            .map(|entry| entry.value().clone());
        let Some(listener) = listener else {
            return;
        };

        match task.status {
            TaskStatus::Completed => {
                let mut results: HashMap<String, Value> = HashMap::new();
                results.insert(
                    RESULTS_ACTOR_ID_KEY.to_string(),
                    Value::String(actor.to_string()),
                );
                if let Some(bytes) = result {
                    results.insert(RESULTS_RESULT_KEY.to_string(), decode_payload(bytes));
                }
                info!(
                    task_id = task.task_id,
                    process_instance_id = task.process_instance_id,
                    "Completion callback"
                );
                listener
                    .on_completed(task.process_instance_id, results)
                    .await;
            }
            TaskStatus::Failed | TaskStatus::Skipped | TaskStatus::Exited => {
                info!(
                    task_id = task.task_id,
                    process_instance_id = task.process_instance_id,
                    status = %task.status,
                    "Abort callback"
                );
                listener.on_aborted(task.process_instance_id).await;
            }
            _ => {}
        }
    }
}

/// Map a wire operation to its state machine event
fn event_for(operation: &TaskOperation, user: &str) -> TaskEvent {
    let user = user.to_string();
    match operation {
        TaskOperation::Claim => TaskEvent::Claim { user },
        TaskOperation::Start => TaskEvent::Start { user },
        TaskOperation::Complete { .. } => TaskEvent::Complete { user },
        TaskOperation::Fail { .. } => TaskEvent::Fail { user },
        TaskOperation::Skip => TaskEvent::Skip { user },
        TaskOperation::Exit => TaskEvent::Exit { user },
        TaskOperation::Release => TaskEvent::Release { user },
        TaskOperation::Suspend => TaskEvent::Suspend { user },
        TaskOperation::Resume => TaskEvent::Resume { user },
    }
}

/// Completion payloads are JSON when producible; anything else is
/// surfaced as a lossy string
fn decode_payload(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;

    fn service() -> TaskService {
        TaskService::in_memory(Arc::new(StaticDirectory::new()), HumanTaskConfig::default())
    }

    #[tokio::test]
    async fn test_add_task_places_single_actor_in_reserved() {
        let service = service();
        let task_id = service
            .add_task(NewTask::new("TaskName", "Comment", 10).with_actor("Darth Vader"))
            .await
            .unwrap();

        let task = service.get_task(task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Reserved);
        assert_eq!(task.actual_owner.as_deref(), Some("Darth Vader"));
    }

    #[tokio::test]
    async fn test_add_task_stores_content() {
        let service = service();
        let task_id = service
            .add_task(
                NewTask::new("TaskName", "Comment", 10)
                    .with_actor("Darth Vader")
                    .with_content(b"This is the content".to_vec()),
            )
            .await
            .unwrap();

        let task = service.get_task(task_id).await.unwrap();
        let content_id = task.content_id().expect("content id assigned");
        let content = service.inner.content_store.get(content_id).unwrap();
        assert_eq!(content.bytes, b"This is the content".to_vec());
    }

    #[tokio::test]
    async fn test_add_task_rejects_unknown_parent() {
        let service = service();
        let result = service
            .add_task(
                NewTask::new("child", "", 1)
                    .with_actor("Darth Vader")
                    .with_parent(999),
            )
            .await;
        assert_eq!(
            result,
            Err(TaskServiceError::TaskNotFound { task_id: 999 })
        );
    }

    #[tokio::test]
    async fn test_abort_task_skips_when_skippable() {
        let service = service();
        let task_id = service
            .add_task(NewTask::new("t", "", 1).with_actor("Darth Vader"))
            .await
            .unwrap();
        service.abort_task(task_id).await.unwrap();
        assert_eq!(
            service.get_task(task_id).await.unwrap().status,
            TaskStatus::Skipped
        );
    }

    #[tokio::test]
    async fn test_abort_task_exits_when_not_skippable() {
        let service = service();
        let task_id = service
            .add_task(
                NewTask::new("t", "", 1)
                    .with_actor("Darth Vader")
                    .with_skippable(false),
            )
            .await
            .unwrap();
        service.abort_task(task_id).await.unwrap();
        assert_eq!(
            service.get_task(task_id).await.unwrap().status,
            TaskStatus::Exited
        );
    }

    #[tokio::test]
    async fn test_purge_task() {
        let service = service();
        let task_id = service
            .add_task(NewTask::new("t", "", 1).with_actor("Darth Vader"))
            .await
            .unwrap();
        service.purge_task(task_id).await.unwrap();
        assert!(service.get_task(task_id).await.is_err());
    }

    #[tokio::test]
    async fn test_purge_discards_the_lock_entry() {
        let service = service();
        let task_id = service
            .add_task(NewTask::new("t", "", 1).with_actor("Darth Vader"))
            .await
            .unwrap();

        service
            .inner
            .operate(task_id, "Darth Vader", TaskOperation::Start)
            .await
            .unwrap();
        assert_eq!(service.inner.locks.len(), 1);

        service.purge_task(task_id).await.unwrap();
        assert_eq!(service.inner.locks.len(), 0);
    }

    #[derive(Default)]
    struct CountingListener {
        completed: std::sync::atomic::AtomicUsize,
        aborted: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ProcessEventListener for CountingListener {
        async fn on_completed(&self, _process_instance_id: i64, _results: HashMap<String, Value>) {
            self.completed
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }

        async fn on_aborted(&self, _process_instance_id: i64) {
            self.aborted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_unregistered_listener_receives_no_callbacks() {
        let service = service();
        let listener = Arc::new(CountingListener::default());
        service.register_process_listener(10, listener.clone());
        service.unregister_process_listener(10);

        let task_id = service
            .add_task(
                NewTask::new("t", "", 1)
                    .with_actor("Darth Vader")
                    .with_process(10, 3),
            )
            .await
            .unwrap();
        service.abort_task(task_id).await.unwrap();

        assert_eq!(
            listener.aborted.load(std::sync::atomic::Ordering::SeqCst),
            0
        );
        assert_eq!(
            listener.completed.load(std::sync::atomic::Ordering::SeqCst),
            0
        );
    }

    #[tokio::test]
    async fn test_completion_payload_is_stored() {
        let service = service();
        let task_id = service
            .add_task(NewTask::new("t", "", 1).with_actor("Darth Vader"))
            .await
            .unwrap();

        service
            .inner
            .operate(task_id, "Darth Vader", TaskOperation::Start)
            .await
            .unwrap();
        service
            .inner
            .operate(
                task_id,
                "Darth Vader",
                TaskOperation::Complete {
                    result: Some(b"\"done\"".to_vec()),
                },
            )
            .await
            .unwrap();

        let task = service.get_task(task_id).await.unwrap();
        let output_id = task.output_content_id().expect("output stored");
        let content = service.inner.content_store.get(output_id).unwrap();
        assert_eq!(content.bytes, b"\"done\"".to_vec());
        assert_eq!(task.fault_content_id(), None);
    }

    #[tokio::test]
    async fn test_fault_payload_is_stored() {
        let service = service();
        let task_id = service
            .add_task(NewTask::new("t", "", 1).with_actor("Darth Vader"))
            .await
            .unwrap();

        service
            .inner
            .operate(task_id, "Darth Vader", TaskOperation::Start)
            .await
            .unwrap();
        service
            .inner
            .operate(
                task_id,
                "Darth Vader",
                TaskOperation::Fail {
                    fault: Some(b"fault data".to_vec()),
                },
            )
            .await
            .unwrap();

        let task = service.get_task(task_id).await.unwrap();
        let fault_id = task.fault_content_id().expect("fault stored");
        let content = service.inner.content_store.get(fault_id).unwrap();
        assert_eq!(content.bytes, b"fault data".to_vec());
        assert_eq!(task.output_content_id(), None);
    }
}
