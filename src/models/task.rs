//! Task record, assignment entities and creation specs.

use crate::state_machine::states::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel stored in `content_id` when a task carries no payload
pub const NO_CONTENT: i64 = -1;

/// An assignee reference: either an individual user or a group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id")]
pub enum OrganizationalEntity {
    User(String),
    Group(String),
}

impl OrganizationalEntity {
    pub fn id(&self) -> &str {
        match self {
            Self::User(id) | Self::Group(id) => id,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Self::User(_))
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }
}

impl fmt::Display for OrganizationalEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Group(id) => write!(f, "group:{id}"),
        }
    }
}

/// Parent-task policy governing how child terminal states propagate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubTaskStrategy {
    /// When every child ends successfully, auto-complete the parent
    OnAllSubTasksEndParentEnd,
    /// When the parent is skipped or exited, force-complete every
    /// non-terminal child
    OnParentAbortAllSubTasksEnd,
}

impl std::str::FromStr for SubTaskStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OnAllSubTasksEndParentEnd" | "on_all_sub_tasks_end_parent_end" => {
                Ok(Self::OnAllSubTasksEndParentEnd)
            }
            "OnParentAbortAllSubTasksEnd" | "on_parent_abort_all_sub_tasks_end" => {
                Ok(Self::OnParentAbortAllSubTasksEnd)
            }
            _ => Err(format!("Invalid sub-task strategy: {s}")),
        }
    }
}

/// One entry in a task's append-only audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTransition {
    pub from_status: Option<TaskStatus>,
    pub to_status: TaskStatus,
    pub event: String,
    pub user: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// The central task entity.
///
/// Status only ever advances through the state machine; there is no
/// direct external mutation. `previous_status` is the single-level
/// memory used by suspend/resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: i64,
    pub name: String,
    pub description: String,
    pub priority: i32,
    pub status: TaskStatus,
    pub potential_owners: Vec<OrganizationalEntity>,
    pub actual_owner: Option<String>,
    pub business_administrators: Vec<OrganizationalEntity>,
    pub skippable: bool,
    pub parent_id: Option<i64>,
    pub sub_task_strategy: Option<SubTaskStrategy>,
    /// Content store reference; `NO_CONTENT` when the task has no payload
    pub content_id: i64,
    /// Result payload stored at completion; `NO_CONTENT` until then
    pub output_content_id: i64,
    /// Fault payload stored at failure; `NO_CONTENT` until then
    pub fault_content_id: i64,
    pub process_instance_id: i64,
    pub process_session_id: i32,
    pub created_on: DateTime<Utc>,
    pub completed_on: Option<DateTime<Utc>>,
    pub previous_status: Option<TaskStatus>,
    pub transitions: Vec<TaskTransition>,
}

impl Task {
    /// Materialize a task record from a creation spec. The task starts in
    /// Created; the state machine's activate event performs initial
    /// placement into Ready or Reserved.
    pub fn from_spec(task_id: i64, spec: &NewTask, content_id: Option<i64>) -> Self {
        Self {
            task_id,
            name: spec.name.clone(),
            description: spec.description.clone(),
            priority: spec.priority,
            status: TaskStatus::Created,
            potential_owners: spec.potential_owners.clone(),
            actual_owner: None,
            business_administrators: spec.business_administrators.clone(),
            skippable: spec.skippable,
            parent_id: spec.parent_id,
            sub_task_strategy: spec.sub_task_strategy,
            content_id: content_id.unwrap_or(NO_CONTENT),
            output_content_id: NO_CONTENT,
            fault_content_id: NO_CONTENT,
            process_instance_id: spec.process_instance_id,
            process_session_id: spec.process_session_id,
            created_on: Utc::now(),
            completed_on: None,
            previous_status: None,
            transitions: Vec::new(),
        }
    }

    /// Content store reference, with the sentinel folded away
    pub fn content_id(&self) -> Option<i64> {
        (self.content_id != NO_CONTENT).then_some(self.content_id)
    }

    /// Stored completion result, if one was supplied
    pub fn output_content_id(&self) -> Option<i64> {
        (self.output_content_id != NO_CONTENT).then_some(self.output_content_id)
    }

    /// Stored fault payload, if one was supplied
    pub fn fault_content_id(&self) -> Option<i64> {
        (self.fault_content_id != NO_CONTENT).then_some(self.fault_content_id)
    }

    /// Whether the user is a potential owner, either directly or through
    /// one of the given group memberships
    pub fn is_potential_owner(&self, user: &str, groups: &[String]) -> bool {
        self.potential_owners.iter().any(|entity| match entity {
            OrganizationalEntity::User(id) => id == user,
            OrganizationalEntity::Group(id) => groups.iter().any(|g| g == id),
        })
    }

    /// Whether the user is a business administrator, either directly or
    /// through one of the given group memberships
    pub fn is_business_administrator(&self, user: &str, groups: &[String]) -> bool {
        self.business_administrators
            .iter()
            .any(|entity| match entity {
                OrganizationalEntity::User(id) => id == user,
                OrganizationalEntity::Group(id) => groups.iter().any(|g| g == id),
            })
    }

    /// Whether the user currently holds the task
    pub fn is_actual_owner(&self, user: &str) -> bool {
        self.actual_owner.as_deref() == Some(user)
    }

    /// The single individual a task collapses onto at creation: exactly
    /// one `User` entry and no groups
    pub fn sole_potential_owner(&self) -> Option<&str> {
        match self.potential_owners.as_slice() {
            [OrganizationalEntity::User(id)] => Some(id),
            _ => None,
        }
    }
}

/// Compact projection returned by task queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task_id: i64,
    pub name: String,
    pub description: String,
    pub priority: i32,
    pub status: TaskStatus,
    pub actual_owner: Option<String>,
    pub parent_id: Option<i64>,
    pub process_instance_id: i64,
    pub created_on: DateTime<Utc>,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.task_id,
            name: task.name.clone(),
            description: task.description.clone(),
            priority: task.priority,
            status: task.status,
            actual_owner: task.actual_owner.clone(),
            parent_id: task.parent_id,
            process_instance_id: task.process_instance_id,
            created_on: task.created_on,
        }
    }
}

/// Creation spec handed to the service by the process bridge or by an
/// embedding application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub name: String,
    pub description: String,
    pub priority: i32,
    pub potential_owners: Vec<OrganizationalEntity>,
    pub business_administrators: Vec<OrganizationalEntity>,
    pub skippable: bool,
    pub parent_id: Option<i64>,
    pub sub_task_strategy: Option<SubTaskStrategy>,
    pub content: Option<Vec<u8>>,
    pub process_instance_id: i64,
    pub process_session_id: i32,
}

impl NewTask {
    /// Create a spec with the default administrator set and skippable on
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        priority: i32,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            priority,
            potential_owners: Vec::new(),
            business_administrators: vec![
                OrganizationalEntity::User("Administrator".to_string()),
                OrganizationalEntity::Group("Administrators".to_string()),
            ],
            skippable: true,
            parent_id: None,
            sub_task_strategy: None,
            content: None,
            process_instance_id: 0,
            process_session_id: 0,
        }
    }

    pub fn with_actor(mut self, user: impl Into<String>) -> Self {
        self.potential_owners
            .push(OrganizationalEntity::User(user.into()));
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.potential_owners
            .push(OrganizationalEntity::Group(group.into()));
        self
    }

    pub fn with_skippable(mut self, skippable: bool) -> Self {
        self.skippable = skippable;
        self
    }

    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_strategy(mut self, strategy: SubTaskStrategy) -> Self {
        self.sub_task_strategy = Some(strategy);
        self
    }

    pub fn with_content(mut self, content: Vec<u8>) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_process(mut self, process_instance_id: i64, process_session_id: i32) -> Self {
        self.process_instance_id = process_instance_id;
        self.process_session_id = process_session_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> NewTask {
        NewTask::new("TaskName", "Comment", 10).with_actor("Darth Vader")
    }

    #[test]
    fn test_sole_potential_owner() {
        let task = Task::from_spec(1, &spec(), None);
        assert_eq!(task.sole_potential_owner(), Some("Darth Vader"));

        let multi = Task::from_spec(2, &spec().with_actor("Dalai Lama"), None);
        assert_eq!(multi.sole_potential_owner(), None);

        let grouped = Task::from_spec(3, &spec().with_group("Crusaders"), None);
        assert_eq!(grouped.sole_potential_owner(), None);
    }

    #[test]
    fn test_potential_owner_membership() {
        let task = Task::from_spec(1, &NewTask::new("t", "", 1).with_group("Crusaders"), None);
        assert!(task.is_potential_owner("Tony Stark", &["Crusaders".to_string()]));
        assert!(!task.is_potential_owner("Tony Stark", &["Avengers".to_string()]));
        assert!(!task.is_potential_owner("Tony Stark", &[]));
    }

    #[test]
    fn test_default_business_administrators() {
        let task = Task::from_spec(1, &spec(), None);
        assert!(task.is_business_administrator("Administrator", &[]));
        assert!(task.is_business_administrator("anyone", &["Administrators".to_string()]));
        assert!(!task.is_business_administrator("Darth Vader", &[]));
    }

    #[test]
    fn test_content_id_sentinel() {
        let none = Task::from_spec(1, &spec(), None);
        assert_eq!(none.content_id, NO_CONTENT);
        assert_eq!(none.content_id(), None);

        let some = Task::from_spec(2, &spec(), Some(42));
        assert_eq!(some.content_id(), Some(42));
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "OnAllSubTasksEndParentEnd".parse::<SubTaskStrategy>().unwrap(),
            SubTaskStrategy::OnAllSubTasksEndParentEnd
        );
        assert_eq!(
            "OnParentAbortAllSubTasksEnd".parse::<SubTaskStrategy>().unwrap(),
            SubTaskStrategy::OnParentAbortAllSubTasksEnd
        );
        assert!("OnWhatever".parse::<SubTaskStrategy>().is_err());
    }

    #[test]
    fn test_summary_projection() {
        let task = Task::from_spec(7, &spec().with_process(10, 3), None);
        let summary = TaskSummary::from(&task);
        assert_eq!(summary.task_id, 7);
        assert_eq!(summary.name, "TaskName");
        assert_eq!(summary.description, "Comment");
        assert_eq!(summary.priority, 10);
        assert_eq!(summary.process_instance_id, 10);
    }
}
