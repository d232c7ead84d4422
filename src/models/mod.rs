//! Data model for the task service: the task record itself, assignment
//! entities, creation specs, summaries and content blobs.

pub mod content;
pub mod task;

pub use content::Content;
pub use task::{
    NewTask, OrganizationalEntity, SubTaskStrategy, Task, TaskSummary, TaskTransition, NO_CONTENT,
};
