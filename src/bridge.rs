//! # Process Bridge
//!
//! Glue between an external process/workflow engine and the task
//! service. The engine suspends at a task boundary and hands off a work
//! item; when the task reaches a terminal state the engine's completion
//! or abort callback fires with a results mapping.

use crate::error::{Result, TaskServiceError};
use crate::models::{NewTask, SubTaskStrategy};
use crate::service::TaskService;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Fixed results-map key carrying the id of the user who completed the task
pub const RESULTS_ACTOR_ID_KEY: &str = "ActorId";
/// Fixed results-map key carrying the unmarshalled completion payload
pub const RESULTS_RESULT_KEY: &str = "Result";

/// Outbound callbacks into the process engine. Invoked exactly once per
/// task reaching a terminal state.
#[async_trait]
pub trait ProcessEventListener: Send + Sync {
    /// The task completed successfully. `results` always carries the
    /// acting user id under [`RESULTS_ACTOR_ID_KEY`] and, when a
    /// completion payload exists, its decoded value under
    /// [`RESULTS_RESULT_KEY`].
    async fn on_completed(&self, process_instance_id: i64, results: HashMap<String, Value>);

    /// The task failed, was skipped, or was exited
    async fn on_aborted(&self, process_instance_id: i64);
}

/// A unit of work dispatched by the process engine
#[derive(Debug, Clone, Default)]
pub struct WorkItem {
    pub id: i64,
    pub process_instance_id: i64,
    pub process_session_id: i32,
    pub parameters: HashMap<String, Value>,
}

impl WorkItem {
    pub fn new(id: i64, process_instance_id: i64, process_session_id: i32) -> Self {
        Self {
            id,
            process_instance_id,
            process_session_id,
            parameters: HashMap::new(),
        }
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.parameters.insert(name.into(), value.into());
    }

    fn string_parameter(&self, name: &str) -> Option<String> {
        match self.parameters.get(name) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        }
    }

    fn integer_parameter(&self, name: &str) -> Result<Option<i64>> {
        match self.parameters.get(name) {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_i64()),
            Some(Value::String(s)) => s.parse().map(Some).map_err(|e| {
                TaskServiceError::invalid_task_spec(format!("invalid {name}: {e}"))
            }),
            Some(other) => Err(TaskServiceError::invalid_task_spec(format!(
                "invalid {name}: {other}"
            ))),
        }
    }
}

/// Inbound side of the bridge: turns dispatched work items into tasks
/// and drives skip-or-exit when the owning process aborts.
#[derive(Clone)]
pub struct WorkItemHandler {
    service: TaskService,
}

impl WorkItemHandler {
    pub fn new(service: TaskService) -> Self {
        Self { service }
    }

    /// Create a task for a dispatched work item and register the listener
    /// that receives the terminal callback. Returns the new task id.
    pub async fn execute_work_item(
        &self,
        work_item: &WorkItem,
        listener: Arc<dyn ProcessEventListener>,
    ) -> Result<i64> {
        let spec = new_task_from_work_item(work_item)?;
        self.service
            .register_process_listener(work_item.process_instance_id, listener);
        self.service.add_task(spec).await
    }

    /// The owning process aborted: drive every open task of the process
    /// instance to Skipped (when permitted) or Exited, then drop the
    /// listener registration.
    pub async fn abort_work_item(&self, work_item: &WorkItem) -> Result<()> {
        self.service
            .abort_process_tasks(work_item.process_instance_id)
            .await?;
        self.service
            .unregister_process_listener(work_item.process_instance_id);
        Ok(())
    }
}

/// Parse a work item's delimited parameters into a task creation spec.
///
/// When the work item carries no explicit `Content` parameter, the full
/// parameter map is serialized as the task's input payload so the human
/// participant still sees the dispatch context.
pub fn new_task_from_work_item(work_item: &WorkItem) -> Result<NewTask> {
    let name = work_item
        .string_parameter("TaskName")
        .ok_or_else(|| TaskServiceError::invalid_task_spec("missing TaskName parameter"))?;
    let description = work_item.string_parameter("Comment").unwrap_or_default();
    let priority = work_item
        .integer_parameter("Priority")?
        .unwrap_or(0)
        .try_into()
        .map_err(|_| TaskServiceError::invalid_task_spec("Priority out of range"))?;

    let mut spec = NewTask::new(name, description, priority)
        .with_process(work_item.process_instance_id, work_item.process_session_id);

    if let Some(actors) = work_item.string_parameter("ActorId") {
        for actor in actors.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            spec = spec.with_actor(actor);
        }
    }
    if let Some(groups) = work_item.string_parameter("GroupId") {
        for group in groups.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            spec = spec.with_group(group);
        }
    }

    if let Some(flag) = work_item.string_parameter("Skippable") {
        spec = spec.with_skippable(flag.trim() != "false");
    }

    if let Some(parent_id) = work_item.integer_parameter("ParentId")? {
        spec = spec.with_parent(parent_id);
    }

    if let Some(strategy) = work_item.string_parameter("SubTaskStrategies") {
        let strategy: SubTaskStrategy = strategy
            .parse()
            .map_err(TaskServiceError::invalid_task_spec)?;
        spec = spec.with_strategy(strategy);
    }

    let content = match work_item.parameters.get("Content") {
        Some(value) => serde_json::to_vec(value),
        // Automatic mapping: no explicit content element, copy the inputs
        None => serde_json::to_vec(&work_item.parameters),
    }
    .map_err(|e| TaskServiceError::internal(format!("content serialization failed: {e}")))?;

    Ok(spec.with_content(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrganizationalEntity;

    fn work_item() -> WorkItem {
        let mut item = WorkItem::new(1, 10, 3);
        item.set_parameter("TaskName", "TaskName");
        item.set_parameter("Comment", "Comment");
        item.set_parameter("Priority", "10");
        item
    }

    #[test]
    fn test_parses_delimited_actors_and_groups() {
        let mut item = work_item();
        item.set_parameter("ActorId", "Darth Vader, Dalai Lama");
        item.set_parameter("GroupId", "Crusaders");

        let spec = new_task_from_work_item(&item).unwrap();
        assert_eq!(spec.name, "TaskName");
        assert_eq!(spec.description, "Comment");
        assert_eq!(spec.priority, 10);
        assert_eq!(
            spec.potential_owners,
            vec![
                OrganizationalEntity::User("Darth Vader".to_string()),
                OrganizationalEntity::User("Dalai Lama".to_string()),
                OrganizationalEntity::Group("Crusaders".to_string()),
            ]
        );
        assert_eq!(spec.process_instance_id, 10);
        assert_eq!(spec.process_session_id, 3);
        assert!(spec.skippable);
    }

    #[test]
    fn test_skippable_opt_out() {
        let mut item = work_item();
        item.set_parameter("Skippable", "false");
        assert!(!new_task_from_work_item(&item).unwrap().skippable);
    }

    #[test]
    fn test_parent_and_strategy() {
        let mut item = work_item();
        item.set_parameter("ParentId", 7);
        item.set_parameter("SubTaskStrategies", "OnAllSubTasksEndParentEnd");

        let spec = new_task_from_work_item(&item).unwrap();
        assert_eq!(spec.parent_id, Some(7));
        assert_eq!(
            spec.sub_task_strategy,
            Some(SubTaskStrategy::OnAllSubTasksEndParentEnd)
        );
    }

    #[test]
    fn test_explicit_content_wins() {
        let mut item = work_item();
        item.set_parameter("Content", "This is the content");

        let spec = new_task_from_work_item(&item).unwrap();
        let decoded: Value = serde_json::from_slice(&spec.content.unwrap()).unwrap();
        assert_eq!(decoded, Value::String("This is the content".to_string()));
    }

    #[test]
    fn test_automatic_parameter_mapping() {
        let mut item = work_item();
        item.set_parameter("MyObject", "MyObjectValue");

        let spec = new_task_from_work_item(&item).unwrap();
        let decoded: HashMap<String, Value> =
            serde_json::from_slice(&spec.content.unwrap()).unwrap();
        assert_eq!(
            decoded.get("MyObject"),
            Some(&Value::String("MyObjectValue".to_string()))
        );
        assert_eq!(
            decoded.get("Priority"),
            Some(&Value::String("10".to_string()))
        );
    }

    #[test]
    fn test_missing_task_name_rejected() {
        let item = WorkItem::new(1, 10, 3);
        assert!(matches!(
            new_task_from_work_item(&item).unwrap_err(),
            TaskServiceError::InvalidTaskSpec { .. }
        ));
    }
}
