//! Sub-task cascade evaluation.
//!
//! When a task reaches a terminal state, its parent or children may have
//! to follow per the parent's sub-task strategy. The cascade runs as an
//! explicit work-list processed to fixpoint rather than recursion, which
//! bounds stack depth and keeps every step auditable. Locks are taken on
//! one task at a time and never nested, so the cascade cannot deadlock
//! through parent/child links. Re-evaluating an already terminal task is
//! a no-op.

use crate::error::Result;
use crate::models::{SubTaskStrategy, Task};
use crate::repository::TaskRepository;
use crate::state_machine::{TaskEvent, TaskStateMachine, TaskStatus};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};

use super::task_service::TaskLockRegistry;

/// Propagate the terminal state of `seed` through the task hierarchy.
/// Returns every task the cascade force-completed, in the order the
/// completions happened, so the service can emit their process callbacks.
pub(crate) async fn drive(
    repository: &Arc<dyn TaskRepository>,
    locks: &TaskLockRegistry,
    seed: i64,
) -> Result<Vec<Task>> {
    let mut forced = Vec::new();
    let mut work_list = VecDeque::from([seed]);

    while let Some(task_id) = work_list.pop_front() {
        let task = repository.find_by_id(task_id).await?;
        if !task.status.is_terminal() {
            continue;
        }
        debug!(task_id, status = %task.status, "Cascade evaluating terminal task");

        // Upward: a successful child may satisfy its parent's
        // all-sub-tasks-end condition.
        if let (Some(parent_id), true) = (task.parent_id, task.status.is_success()) {
            if let Some(parent) =
                try_complete_parent(repository, locks, parent_id).await?
            {
                forced.push(parent);
                work_list.push_back(parent_id);
            }
        }

        // Downward: an aborted parent absorbs its children's remaining
        // work by force-completing them.
        if matches!(task.status, TaskStatus::Skipped | TaskStatus::Exited)
            && task.sub_task_strategy == Some(SubTaskStrategy::OnParentAbortAllSubTasksEnd)
        {
            for child in repository.find_sub_tasks(task_id).await? {
                if let Some(child) = force_complete(repository, locks, child.task_id).await? {
                    work_list.push_back(child.task_id);
                    forced.push(child);
                }
            }
        }
    }

    Ok(forced)
}

/// Complete the parent if its strategy demands it and every child has
/// ended successfully. Returns the completed parent snapshot, or `None`
/// when the condition does not (or no longer) holds.
async fn try_complete_parent(
    repository: &Arc<dyn TaskRepository>,
    locks: &TaskLockRegistry,
    parent_id: i64,
) -> Result<Option<Task>> {
    let _guard = locks.acquire(parent_id).await;

    let parent = match repository.find_by_id(parent_id).await {
        Ok(parent) => parent,
        // Parent purged while the child finished; nothing to propagate
        Err(_) => return Ok(None),
    };
    if parent.status.is_terminal()
        || parent.sub_task_strategy != Some(SubTaskStrategy::OnAllSubTasksEndParentEnd)
    {
        return Ok(None);
    }

    let children = repository.find_sub_tasks(parent_id).await?;
    if children.is_empty() || !children.iter().all(|child| child.status.is_success()) {
        return Ok(None);
    }

    let mut parent = parent;
    if TaskStateMachine::new(&mut parent)
        .transition(TaskEvent::ForceComplete)
        .is_err()
    {
        return Ok(None);
    }
    repository.save(parent.clone()).await?;
    info!(
        parent_id,
        "All sub-tasks ended; parent auto-completed"
    );
    Ok(Some(parent))
}

/// Force-complete one task if it is still non-terminal
async fn force_complete(
    repository: &Arc<dyn TaskRepository>,
    locks: &TaskLockRegistry,
    task_id: i64,
) -> Result<Option<Task>> {
    let _guard = locks.acquire(task_id).await;

    let mut task = repository.find_by_id(task_id).await?;
    if task.status.is_terminal() {
        return Ok(None);
    }
    if TaskStateMachine::new(&mut task)
        .transition(TaskEvent::ForceComplete)
        .is_err()
    {
        return Ok(None);
    }
    repository.save(task.clone()).await?;
    info!(task_id, "Sub-task force-completed by parent abort");
    Ok(Some(task))
}
