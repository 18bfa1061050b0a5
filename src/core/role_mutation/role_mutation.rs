// Ports for changing a member's roles and for telling the bot owner when we
// couldn't. The Discord layer implements both over serenity's HTTP client;
// tests implement them in memory.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoleMutationError {
    /// Discord refused the change (missing Manage Roles, or role above ours).
    #[error("Missing permissions to change roles")]
    PermissionDenied,

    #[error("Role update failed: {0}")]
    Other(String),
}

#[async_trait]
pub trait RoleMutator: Send + Sync {
    async fn add_roles(
        &self,
        guild_id: u64,
        user_id: u64,
        role_ids: &[u64],
        reason: &str,
    ) -> Result<(), RoleMutationError>;

    async fn remove_roles(
        &self,
        guild_id: u64,
        user_id: u64,
        role_ids: &[u64],
        reason: &str,
    ) -> Result<(), RoleMutationError>;
}

/// Where permission problems get reported instead of being raised.
#[async_trait]
pub trait OwnerNotifier: Send + Sync {
    async fn notify(&self, message: &str);
}

/// Message sent to the owner when a role change was refused.
pub fn permission_denied_notice(feature: &str, guild_id: u64, user_id: u64) -> String {
    format!(
        "[{}] I lack permission to change roles of <@{}> in guild `{}`. \
         Check that I have Manage Roles and that my role sits above the ladder roles.",
        feature, user_id, guild_id
    )
}

#[cfg(test)]
pub mod testing {
    //! In-memory ports shared by the service tests.

    use super::*;
    use dashmap::{DashMap, DashSet};
    use std::sync::Mutex;

    /// Tracks role sets per (guild, user). Users in `denied` always fail with
    /// `PermissionDenied`. Roles in `denied_roles` fail when reached, after the
    /// roles before them were applied, like Discord answering one call at a time.
    #[derive(Default)]
    pub struct MockRoleMutator {
        pub roles: DashMap<(u64, u64), Vec<u64>>,
        pub denied: DashSet<u64>,
        pub denied_roles: DashSet<u64>,
    }

    impl MockRoleMutator {
        pub fn roles_of(&self, guild_id: u64, user_id: u64) -> Vec<u64> {
            self.roles
                .get(&(guild_id, user_id))
                .map(|r| r.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl RoleMutator for MockRoleMutator {
        async fn add_roles(
            &self,
            guild_id: u64,
            user_id: u64,
            role_ids: &[u64],
            _reason: &str,
        ) -> Result<(), RoleMutationError> {
            if self.denied.contains(&user_id) {
                return Err(RoleMutationError::PermissionDenied);
            }
            let mut roles = self.roles.entry((guild_id, user_id)).or_default();
            for role_id in role_ids {
                if self.denied_roles.contains(role_id) {
                    return Err(RoleMutationError::PermissionDenied);
                }
                if !roles.contains(role_id) {
                    roles.push(*role_id);
                }
            }
            Ok(())
        }

        async fn remove_roles(
            &self,
            guild_id: u64,
            user_id: u64,
            role_ids: &[u64],
            _reason: &str,
        ) -> Result<(), RoleMutationError> {
            if self.denied.contains(&user_id) {
                return Err(RoleMutationError::PermissionDenied);
            }
            if let Some(mut roles) = self.roles.get_mut(&(guild_id, user_id)) {
                for role_id in role_ids {
                    if self.denied_roles.contains(role_id) {
                        return Err(RoleMutationError::PermissionDenied);
                    }
                    roles.retain(|r| r != role_id);
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct MockNotifier {
        pub messages: Mutex<Vec<String>>,
    }

    impl MockNotifier {
        pub fn count(&self) -> usize {
            self.messages.lock().unwrap().len()
        }

        pub fn last(&self) -> Option<String> {
            self.messages.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl OwnerNotifier for MockNotifier {
        async fn notify(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }
}
