//! Durable keyed storage for task records and their hierarchy links.
//!
//! The storage technology is abstract; the trait exposes the lookup and
//! query capabilities the service needs, and the in-memory implementation
//! backs tests and embedded deployments. Callers mutate records by
//! read-modify-save under the service's per-task lock.

use crate::error::{Result, TaskServiceError};
use crate::models::{Task, TaskSummary};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Allocate the next task id
    fn next_task_id(&self) -> i64;

    /// Insert or replace a task record
    async fn save(&self, task: Task) -> Result<()>;

    /// Load a task by id
    async fn find_by_id(&self, task_id: i64) -> Result<Task>;

    /// Open tasks in which the user (directly, via the given groups, or
    /// as current actual owner) is eligible, ordered by task id. Terminal
    /// tasks never appear.
    async fn find_by_potential_owner(
        &self,
        user: Option<&str>,
        groups: &[String],
    ) -> Result<Vec<TaskSummary>>;

    /// All children of a parent task, ordered by task id
    async fn find_sub_tasks(&self, parent_id: i64) -> Result<Vec<Task>>;

    /// Open children of a parent task visible to the given potential owner
    async fn find_sub_tasks_for_potential_owner(
        &self,
        parent_id: i64,
        user: &str,
        groups: &[String],
    ) -> Result<Vec<TaskSummary>>;

    /// All tasks created for a process instance, ordered by task id
    async fn find_by_process_instance(&self, process_instance_id: i64) -> Result<Vec<Task>>;

    /// Administrative removal of a record. Normal terminal transitions
    /// never delete; they only mark the task terminal.
    async fn purge(&self, task_id: i64) -> Result<()>;
}

/// Map-backed repository with an atomic id sequence
#[derive(Debug, Default)]
pub struct InMemoryTaskRepository {
    tasks: DashMap<i64, Task>,
    sequence: AtomicI64,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches_potential_owner(task: &Task, user: Option<&str>, groups: &[String]) -> bool {
        if let Some(user) = user {
            if task.is_actual_owner(user) || task.is_potential_owner(user, groups) {
                return true;
            }
        }
        // Group-only queries: any group entry in the set qualifies
        user.is_none() && task.is_potential_owner("", groups)
    }

    fn sorted(mut tasks: Vec<Task>) -> Vec<Task> {
        tasks.sort_by_key(|task| task.task_id);
        tasks
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    fn next_task_id(&self) -> i64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn save(&self, task: Task) -> Result<()> {
        self.tasks.insert(task.task_id, task);
        Ok(())
    }

    async fn find_by_id(&self, task_id: i64) -> Result<Task> {
        self.tasks
            .get(&task_id)
            .map(|entry| entry.value().clone())
            .ok_or(TaskServiceError::TaskNotFound { task_id })
    }

    async fn find_by_potential_owner(
        &self,
        user: Option<&str>,
        groups: &[String],
    ) -> Result<Vec<TaskSummary>> {
        let matching = self
            .tasks
            .iter()
            .filter(|entry| entry.value().status.is_open())
            .filter(|entry| Self::matches_potential_owner(entry.value(), user, groups))
            .map(|entry| entry.value().clone())
            .collect();
        Ok(Self::sorted(matching).iter().map(TaskSummary::from).collect())
    }

    async fn find_sub_tasks(&self, parent_id: i64) -> Result<Vec<Task>> {
        let children = self
            .tasks
            .iter()
            .filter(|entry| entry.value().parent_id == Some(parent_id))
            .map(|entry| entry.value().clone())
            .collect();
        Ok(Self::sorted(children))
    }

    async fn find_sub_tasks_for_potential_owner(
        &self,
        parent_id: i64,
        user: &str,
        groups: &[String],
    ) -> Result<Vec<TaskSummary>> {
        let children = self
            .tasks
            .iter()
            .filter(|entry| entry.value().parent_id == Some(parent_id))
            .filter(|entry| entry.value().status.is_open())
            .filter(|entry| Self::matches_potential_owner(entry.value(), Some(user), groups))
            .map(|entry| entry.value().clone())
            .collect();
        Ok(Self::sorted(children).iter().map(TaskSummary::from).collect())
    }

    async fn find_by_process_instance(&self, process_instance_id: i64) -> Result<Vec<Task>> {
        let matching = self
            .tasks
            .iter()
            .filter(|entry| entry.value().process_instance_id == process_instance_id)
            .map(|entry| entry.value().clone())
            .collect();
        Ok(Self::sorted(matching))
    }

    async fn purge(&self, task_id: i64) -> Result<()> {
        self.tasks
            .remove(&task_id)
            .map(|_| ())
            .ok_or(TaskServiceError::TaskNotFound { task_id })
    }
}
