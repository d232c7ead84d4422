use serde::{Deserialize, Serialize};

/// Events that can trigger task state transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TaskEvent {
    /// Move a freshly created task into Ready or Reserved depending on
    /// its potential-owner set
    Activate,
    /// A potential owner claims the task
    Claim { user: String },
    /// The owner starts working on the task (auto-claims from Ready)
    Start { user: String },
    /// The owner finishes the task successfully
    Complete { user: String },
    /// The owner reports a fault
    Fail { user: String },
    /// An eligible actor skips the task
    Skip { user: String },
    /// A business administrator forces the task out
    Exit { user: String },
    /// The owner gives the task back to the pool
    Release { user: String },
    /// Pause the task, remembering the state to return to
    Suspend { user: String },
    /// Return a suspended task to its prior state
    Resume { user: String },
    /// Sub-task cascade closes the task without an explicit complete call
    ForceComplete,
}

impl TaskEvent {
    /// Get a string representation of the event type for logging and audit
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Activate => "activate",
            Self::Claim { .. } => "claim",
            Self::Start { .. } => "start",
            Self::Complete { .. } => "complete",
            Self::Fail { .. } => "fail",
            Self::Skip { .. } => "skip",
            Self::Exit { .. } => "exit",
            Self::Release { .. } => "release",
            Self::Suspend { .. } => "suspend",
            Self::Resume { .. } => "resume",
            Self::ForceComplete => "force_complete",
        }
    }

    /// The user driving this event, when there is one
    pub fn acting_user(&self) -> Option<&str> {
        match self {
            Self::Claim { user }
            | Self::Start { user }
            | Self::Complete { user }
            | Self::Fail { user }
            | Self::Skip { user }
            | Self::Exit { user }
            | Self::Release { user }
            | Self::Suspend { user }
            | Self::Resume { user } => Some(user),
            Self::Activate | Self::ForceComplete => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        let event = TaskEvent::Claim {
            user: "Darth Vader".to_string(),
        };
        assert_eq!(event.event_type(), "claim");
        assert_eq!(TaskEvent::ForceComplete.event_type(), "force_complete");
    }

    #[test]
    fn test_acting_user() {
        let event = TaskEvent::Start {
            user: "Darth Vader".to_string(),
        };
        assert_eq!(event.acting_user(), Some("Darth Vader"));
        assert_eq!(TaskEvent::Activate.acting_user(), None);
    }
}
