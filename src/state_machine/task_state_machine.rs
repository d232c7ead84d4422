use super::{
    errors::{invalid_transition, StateMachineError, StateMachineResult},
    events::TaskEvent,
    states::TaskStatus,
};
use crate::models::{Task, TaskTransition};
use chrono::Utc;
use tracing::debug;

/// Validates and applies lifecycle transitions against a single task
/// record. Authorization happens before this layer; the state machine
/// only enforces which transitions are structurally valid and performs
/// the record bookkeeping they imply (owner set/clear, suspend memory,
/// audit trail).
pub struct TaskStateMachine<'a> {
    task: &'a mut Task,
}

impl<'a> TaskStateMachine<'a> {
    pub fn new(task: &'a mut Task) -> Self {
        Self { task }
    }

    /// Current state of the underlying task
    pub fn current_state(&self) -> TaskStatus {
        self.task.status
    }

    /// Attempt to transition the task, returning the state it lands in
    pub fn transition(&mut self, event: TaskEvent) -> StateMachineResult<TaskStatus> {
        let current = self.task.status;
        let target = self.determine_target_state(current, &event)?;

        self.apply_effects(current, target, &event)?;

        self.task.transitions.push(TaskTransition {
            from_status: Some(current),
            to_status: target,
            event: event.event_type().to_string(),
            user: event.acting_user().map(str::to_string),
            occurred_at: Utc::now(),
        });
        self.task.status = target;

        debug!(
            task_id = self.task.task_id,
            from = %current,
            to = %target,
            event = event.event_type(),
            "Task transition applied"
        );

        Ok(target)
    }

    /// Determine the target state based on current state and event
    fn determine_target_state(
        &self,
        current: TaskStatus,
        event: &TaskEvent,
    ) -> StateMachineResult<TaskStatus> {
        let target = match (current, event) {
            // Initial placement: one individual and no groups collapses
            // straight to Reserved; any other non-empty owner set goes to
            // Ready; an empty owner set stays Created.
            (TaskStatus::Created, TaskEvent::Activate) => {
                if self.task.sole_potential_owner().is_some() {
                    TaskStatus::Reserved
                } else if self.task.potential_owners.is_empty() {
                    TaskStatus::Created
                } else {
                    TaskStatus::Ready
                }
            }

            // Claim and release
            (TaskStatus::Ready, TaskEvent::Claim { .. }) => TaskStatus::Reserved,
            (TaskStatus::Reserved, TaskEvent::Release { .. }) => TaskStatus::Ready,

            // Start (auto-claims from Ready)
            (TaskStatus::Ready | TaskStatus::Reserved, TaskEvent::Start { .. }) => {
                TaskStatus::InProgress
            }

            // Owner-driven terminal transitions
            (TaskStatus::InProgress, TaskEvent::Complete { .. }) => TaskStatus::Completed,
            (TaskStatus::InProgress, TaskEvent::Fail { .. }) => TaskStatus::Failed,

            // Skip is not valid once work has started
            (
                TaskStatus::Created | TaskStatus::Ready | TaskStatus::Reserved,
                TaskEvent::Skip { .. },
            ) => TaskStatus::Skipped,

            // Administrative exit from any non-terminal state
            (state, TaskEvent::Exit { .. }) if !state.is_terminal() => TaskStatus::Exited,

            // Suspend remembers the prior state; resume restores it
            (TaskStatus::Reserved | TaskStatus::InProgress, TaskEvent::Suspend { .. }) => {
                TaskStatus::Suspended
            }
            (TaskStatus::Suspended, TaskEvent::Resume { .. }) => self
                .task
                .previous_status
                .ok_or(StateMachineError::NoPriorState)?,

            // Cascade-driven closure from any non-terminal state
            (state, TaskEvent::ForceComplete) if !state.is_terminal() => TaskStatus::Completed,

            (from, event) => {
                return Err(invalid_transition(from, event.event_type()));
            }
        };

        Ok(target)
    }

    /// Record bookkeeping implied by a validated transition
    fn apply_effects(
        &mut self,
        current: TaskStatus,
        target: TaskStatus,
        event: &TaskEvent,
    ) -> StateMachineResult<()> {
        match event {
            TaskEvent::Activate => {
                if target == TaskStatus::Reserved {
                    self.task.actual_owner =
                        self.task.sole_potential_owner().map(str::to_string);
                }
            }
            TaskEvent::Claim { user } => {
                self.task.actual_owner = Some(user.clone());
            }
            TaskEvent::Start { user } => {
                if current == TaskStatus::Ready {
                    self.task.actual_owner = Some(user.clone());
                }
            }
            TaskEvent::Release { .. } => {
                self.task.actual_owner = None;
            }
            TaskEvent::Complete { .. } => {
                self.task.completed_on = Some(Utc::now());
            }
            TaskEvent::Fail { .. } => {
                self.task.completed_on = Some(Utc::now());
            }
            TaskEvent::Skip { .. } | TaskEvent::Exit { .. } => {
                self.task.actual_owner = None;
                self.task.completed_on = Some(Utc::now());
            }
            TaskEvent::Suspend { .. } => {
                self.task.previous_status = Some(current);
            }
            TaskEvent::Resume { .. } => {
                self.task.previous_status = None;
            }
            TaskEvent::ForceComplete => {
                self.task.completed_on = Some(Utc::now());
            }
        }

        Ok(())
    }
}
