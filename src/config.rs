//! Service and client configuration, sourced from the environment with
//! sensible defaults for embedded use.

use crate::error::{Result, TaskServiceError};
use std::str::FromStr;

/// Policy for whether a potential owner may skip a group-assigned task
/// that nobody has claimed yet. The lifecycle rules do not pin this down,
/// so it is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnclaimedSkipPolicy {
    /// Any potential owner (direct or via group) may skip an unclaimed task
    #[default]
    PotentialOwners,
    /// Only business administrators may skip an unclaimed task
    AdministratorsOnly,
}

impl FromStr for UnclaimedSkipPolicy {
    type Err = TaskServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "potential_owners" => Ok(Self::PotentialOwners),
            "administrators_only" => Ok(Self::AdministratorsOnly),
            other => Err(TaskServiceError::configuration(format!(
                "invalid unclaimed skip policy: {other}"
            ))),
        }
    }
}

/// Runtime configuration for the task service and client
#[derive(Debug, Clone)]
pub struct HumanTaskConfig {
    /// Capacity of the per-connection request channel
    pub request_channel_capacity: usize,
    /// Capacity of the per-connection response channel
    pub response_channel_capacity: usize,
    /// Default timeout for blocking response handlers, in milliseconds
    pub default_wait_timeout_ms: u64,
    /// Who may skip a group-assigned task nobody has claimed
    pub unclaimed_skip_policy: UnclaimedSkipPolicy,
}

impl Default for HumanTaskConfig {
    fn default() -> Self {
        Self {
            request_channel_capacity: 256,
            response_channel_capacity: 256,
            default_wait_timeout_ms: 5000,
            unclaimed_skip_policy: UnclaimedSkipPolicy::default(),
        }
    }
}

impl HumanTaskConfig {
    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(capacity) = std::env::var("HUMANTASK_REQUEST_CHANNEL_CAPACITY") {
            config.request_channel_capacity = capacity.parse().map_err(|e| {
                TaskServiceError::configuration(format!("invalid request channel capacity: {e}"))
            })?;
        }

        if let Ok(capacity) = std::env::var("HUMANTASK_RESPONSE_CHANNEL_CAPACITY") {
            config.response_channel_capacity = capacity.parse().map_err(|e| {
                TaskServiceError::configuration(format!("invalid response channel capacity: {e}"))
            })?;
        }

        if let Ok(timeout) = std::env::var("HUMANTASK_DEFAULT_WAIT_TIMEOUT_MS") {
            config.default_wait_timeout_ms = timeout.parse().map_err(|e| {
                TaskServiceError::configuration(format!("invalid wait timeout: {e}"))
            })?;
        }

        if let Ok(policy) = std::env::var("HUMANTASK_UNCLAIMED_SKIP_POLICY") {
            config.unclaimed_skip_policy = policy.parse()?;
        }

        Ok(config)
    }
}
