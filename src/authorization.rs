//! # Authorization Engine
//!
//! Pure, total decision function: given an operation, a task snapshot,
//! the acting user and that user's current group memberships, decide
//! allow or deny. Every operation/state pair has a defined outcome.
//! Operations attempted on terminal tasks are always denied with
//! `InvalidState`, never `PermissionDenied`, so callers can distinguish
//! "wrong state" from "wrong actor". State checks run before actor
//! checks for the same reason.

use crate::config::UnclaimedSkipPolicy;
use crate::error::{Result, TaskServiceError};
use crate::models::Task;
use crate::service::protocol::TaskOperation;
use crate::state_machine::TaskStatus;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct AuthorizationEngine {
    unclaimed_skip_policy: UnclaimedSkipPolicy,
}

impl AuthorizationEngine {
    pub fn new(unclaimed_skip_policy: UnclaimedSkipPolicy) -> Self {
        Self {
            unclaimed_skip_policy,
        }
    }

    /// Decide whether `user` may apply `operation` to `task`
    pub fn authorize(
        &self,
        operation: &TaskOperation,
        task: &Task,
        user: &str,
        groups: &[String],
    ) -> Result<()> {
        let decision = self.decide(operation, task, user, groups);
        if let Err(error) = &decision {
            warn!(
                task_id = task.task_id,
                user,
                operation = operation.name(),
                status = %task.status,
                %error,
                "Operation denied"
            );
        }
        decision
    }

    fn decide(
        &self,
        operation: &TaskOperation,
        task: &Task,
        user: &str,
        groups: &[String],
    ) -> Result<()> {
        if task.status.is_terminal() {
            return Err(self.wrong_state(task, operation));
        }

        let admin = task.is_business_administrator(user, groups);

        match operation {
            TaskOperation::Claim => {
                if task.status != TaskStatus::Ready {
                    return Err(self.wrong_state(task, operation));
                }
                if !task.is_potential_owner(user, groups) {
                    return Err(self.wrong_actor(task, user, operation));
                }
            }
            TaskOperation::Start => match task.status {
                TaskStatus::Ready => {
                    if !task.is_potential_owner(user, groups) {
                        return Err(self.wrong_actor(task, user, operation));
                    }
                }
                TaskStatus::Reserved => {
                    if !task.is_actual_owner(user) {
                        return Err(self.wrong_actor(task, user, operation));
                    }
                }
                _ => return Err(self.wrong_state(task, operation)),
            },
            TaskOperation::Complete { .. } | TaskOperation::Fail { .. } => {
                if task.status != TaskStatus::InProgress {
                    return Err(self.wrong_state(task, operation));
                }
                if !task.is_actual_owner(user) {
                    return Err(self.wrong_actor(task, user, operation));
                }
            }
            TaskOperation::Skip => {
                if !task.skippable {
                    return Err(self.wrong_actor(task, user, operation));
                }
                match task.status {
                    TaskStatus::Created | TaskStatus::Ready => {
                        let potential_allowed = matches!(
                            self.unclaimed_skip_policy,
                            UnclaimedSkipPolicy::PotentialOwners
                        ) && task.is_potential_owner(user, groups);
                        if !admin && !potential_allowed {
                            return Err(self.wrong_actor(task, user, operation));
                        }
                    }
                    TaskStatus::Reserved => {
                        if !admin && !task.is_actual_owner(user) {
                            return Err(self.wrong_actor(task, user, operation));
                        }
                    }
                    _ => return Err(self.wrong_state(task, operation)),
                }
            }
            TaskOperation::Exit => {
                if !admin {
                    return Err(self.wrong_actor(task, user, operation));
                }
            }
            TaskOperation::Release => {
                if task.status != TaskStatus::Reserved {
                    return Err(self.wrong_state(task, operation));
                }
                if !admin && !task.is_actual_owner(user) {
                    return Err(self.wrong_actor(task, user, operation));
                }
            }
            TaskOperation::Suspend => {
                if !matches!(task.status, TaskStatus::Reserved | TaskStatus::InProgress) {
                    return Err(self.wrong_state(task, operation));
                }
                if !admin && !task.is_actual_owner(user) {
                    return Err(self.wrong_actor(task, user, operation));
                }
            }
            TaskOperation::Resume => {
                if task.status != TaskStatus::Suspended {
                    return Err(self.wrong_state(task, operation));
                }
                if !admin && !task.is_actual_owner(user) {
                    return Err(self.wrong_actor(task, user, operation));
                }
            }
        }

        Ok(())
    }

    fn wrong_state(&self, task: &Task, operation: &TaskOperation) -> TaskServiceError {
        TaskServiceError::invalid_state(task.task_id, task.status.to_string(), operation.name())
    }

    fn wrong_actor(&self, task: &Task, user: &str, operation: &TaskOperation) -> TaskServiceError {
        TaskServiceError::permission_denied(task.task_id, user, operation.name())
    }
}
