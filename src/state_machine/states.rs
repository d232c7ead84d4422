use serde::{Deserialize, Serialize};
use std::fmt;

/// Task lifecycle states.
///
/// Tasks move Created -> Ready/Reserved -> InProgress -> a terminal state.
/// Suspended is reachable from Reserved or InProgress and returns to the
/// prior state on resume. Administrative and abort paths can force any
/// non-terminal task to Exited, Skipped or Obsolete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Initial state before potential owners are resolved
    #[default]
    Created,
    /// Waiting for a potential owner to claim it
    Ready,
    /// Claimed by (or preset to) a single actual owner
    Reserved,
    /// Actual owner is actively working on it
    InProgress,
    /// Paused; remembers the state to return to on resume
    Suspended,
    /// Finished successfully by its actual owner
    Completed,
    /// Finished unsuccessfully by its actual owner
    Failed,
    /// Forced out by a business administrator
    Exited,
    /// Skipped by an eligible actor
    Skipped,
    /// A post-completion callback failed
    Error,
    /// Administratively marked for purge
    Obsolete,
}

impl TaskStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed
                | Self::Failed
                | Self::Exited
                | Self::Skipped
                | Self::Error
                | Self::Obsolete
        )
    }

    /// Check if this is the successful terminal state
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Check if this is an active state (task is being worked on)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// States in which a task shows up in potential-owner queries
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            Self::Ready | Self::Reserved | Self::InProgress | Self::Suspended
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Ready => write!(f, "ready"),
            Self::Reserved => write!(f, "reserved"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Suspended => write!(f, "suspended"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Exited => write!(f, "exited"),
            Self::Skipped => write!(f, "skipped"),
            Self::Error => write!(f, "error"),
            Self::Obsolete => write!(f, "obsolete"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "ready" => Ok(Self::Ready),
            "reserved" => Ok(Self::Reserved),
            "in_progress" => Ok(Self::InProgress),
            "suspended" => Ok(Self::Suspended),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "exited" => Ok(Self::Exited),
            "skipped" => Ok(Self::Skipped),
            "error" => Ok(Self::Error),
            "obsolete" => Ok(Self::Obsolete),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}
