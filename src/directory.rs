//! Directory adapter: resolves a user to its group memberships.
//!
//! Membership is queried at operation time and never cached on the task
//! record, since group membership can change between operations.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Group ids the user currently belongs to
    async fn groups_of(&self, user_id: &str) -> Vec<String>;
}

/// Map-backed directory for tests and embedded deployments
#[derive(Debug, Default)]
pub struct StaticDirectory {
    memberships: RwLock<HashMap<String, Vec<String>>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user to a group
    pub fn add_member(&self, group: impl Into<String>, user: impl Into<String>) {
        let group = group.into();
        let user = user.into();
        let mut memberships = self.memberships.write();
        let groups = memberships.entry(user).or_default();
        if !groups.contains(&group) {
            groups.push(group);
        }
    }

    /// Remove a user from a group
    pub fn remove_member(&self, group: &str, user: &str) {
        let mut memberships = self.memberships.write();
        if let Some(groups) = memberships.get_mut(user) {
            groups.retain(|g| g != group);
        }
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn groups_of(&self, user_id: &str) -> Vec<String> {
        self.memberships
            .read()
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_membership_lookup() {
        let directory = StaticDirectory::new();
        directory.add_member("Crusaders", "Tony Stark");
        directory.add_member("Crusaders", "Tony Stark");
        directory.add_member("Avengers", "Tony Stark");

        let groups = directory.groups_of("Tony Stark").await;
        assert_eq!(groups, vec!["Crusaders".to_string(), "Avengers".to_string()]);
        assert!(directory.groups_of("Nobody").await.is_empty());
    }

    #[tokio::test]
    async fn test_membership_changes_are_visible() {
        let directory = StaticDirectory::new();
        directory.add_member("Crusaders", "Tony Stark");
        directory.remove_member("Crusaders", "Tony Stark");
        assert!(directory.groups_of("Tony Stark").await.is_empty());
    }
}
