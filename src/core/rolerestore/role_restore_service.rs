// Role restore: remember what a member had when they left and hand it back
// when they rejoin.

use crate::core::role_mutation::{
    permission_denied_notice, OwnerNotifier, RoleMutationError, RoleMutator,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

const RESTORE_REASON: &str = "Restoring roles after rejoin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedRoles {
    pub guild_id: u64,
    pub user_id: u64,
    pub role_ids: Vec<u64>,
    pub saved_at: DateTime<Utc>,
}

#[async_trait]
pub trait RoleRestoreStore: Send + Sync {
    async fn is_enabled(&self, guild_id: u64) -> Result<bool>;
    async fn set_enabled(&self, guild_id: u64, enabled: bool) -> Result<()>;
    /// Replaces whatever was saved for this member before.
    async fn save_roles(&self, saved: SavedRoles) -> Result<()>;
    /// Returns and forgets the saved roles.
    async fn take_roles(&self, guild_id: u64, user_id: u64) -> Result<Option<SavedRoles>>;
    async fn count_saved(&self, guild_id: u64) -> Result<u64>;
}

pub struct RoleRestoreService<S: RoleRestoreStore> {
    store: S,
}

impl<S: RoleRestoreStore> RoleRestoreService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn is_enabled(&self, guild_id: u64) -> Result<bool> {
        self.store.is_enabled(guild_id).await
    }

    pub async fn set_enabled(&self, guild_id: u64, enabled: bool) -> Result<()> {
        self.store.set_enabled(guild_id, enabled).await
    }

    pub async fn count_saved(&self, guild_id: u64) -> Result<u64> {
        self.store.count_saved(guild_id).await
    }

    /// Save a leaving member's roles. `role_ids` must already exclude roles the
    /// bot can't hand out (managed roles, @everyone). Returns whether anything
    /// was saved.
    pub async fn remember(&self, guild_id: u64, user_id: u64, role_ids: Vec<u64>) -> Result<bool> {
        if role_ids.is_empty() || !self.store.is_enabled(guild_id).await? {
            return Ok(false);
        }

        self.store
            .save_roles(SavedRoles {
                guild_id,
                user_id,
                role_ids,
                saved_at: Utc::now(),
            })
            .await?;
        Ok(true)
    }

    /// Give a rejoining member their saved roles back.
    ///
    /// Roles that no longer exist in the guild (`existing_roles`) are dropped.
    /// Every role is tried on its own; roles that could not be granted are
    /// saved again for the next rejoin. Returns the roles granted.
    pub async fn restore<M, N>(
        &self,
        guild_id: u64,
        user_id: u64,
        existing_roles: &[u64],
        mutator: &M,
        notifier: &N,
    ) -> Result<Vec<u64>>
    where
        M: RoleMutator + ?Sized,
        N: OwnerNotifier + ?Sized,
    {
        if !self.store.is_enabled(guild_id).await? {
            return Ok(Vec::new());
        }

        let Some(saved) = self.store.take_roles(guild_id, user_id).await? else {
            return Ok(Vec::new());
        };

        let mut granted = Vec::new();
        let mut pending = Vec::new();
        let mut denied = false;

        for role_id in saved
            .role_ids
            .into_iter()
            .filter(|role_id| existing_roles.contains(role_id))
        {
            match mutator
                .add_roles(guild_id, user_id, &[role_id], RESTORE_REASON)
                .await
            {
                Ok(()) => granted.push(role_id),
                Err(RoleMutationError::PermissionDenied) => {
                    denied = true;
                    pending.push(role_id);
                }
                Err(RoleMutationError::Other(e)) => {
                    tracing::error!(guild_id, user_id, role_id, "Failed to restore role: {}", e);
                    pending.push(role_id);
                }
            }
        }

        if !pending.is_empty() {
            tracing::warn!(
                guild_id,
                user_id,
                pending = ?pending,
                "Keeping roles that could not be restored"
            );
            self.store
                .save_roles(SavedRoles {
                    guild_id,
                    user_id,
                    role_ids: pending,
                    saved_at: saved.saved_at,
                })
                .await?;
        }

        if denied {
            notifier
                .notify(&permission_denied_notice("rolerestore", guild_id, user_id))
                .await;
        }

        if !granted.is_empty() {
            tracing::info!(guild_id, user_id, restored = granted.len(), "Restored roles");
        }
        Ok(granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::role_mutation::testing::{MockNotifier, MockRoleMutator};
    use dashmap::{DashMap, DashSet};

    #[derive(Default)]
    struct MockRoleRestoreStore {
        enabled: DashSet<u64>,
        saved: DashMap<(u64, u64), SavedRoles>,
    }

    #[async_trait]
    impl RoleRestoreStore for MockRoleRestoreStore {
        async fn is_enabled(&self, guild_id: u64) -> Result<bool> {
            Ok(self.enabled.contains(&guild_id))
        }

        async fn set_enabled(&self, guild_id: u64, enabled: bool) -> Result<()> {
            if enabled {
                self.enabled.insert(guild_id);
            } else {
                self.enabled.remove(&guild_id);
            }
            Ok(())
        }

        async fn save_roles(&self, saved: SavedRoles) -> Result<()> {
            self.saved.insert((saved.guild_id, saved.user_id), saved);
            Ok(())
        }

        async fn take_roles(&self, guild_id: u64, user_id: u64) -> Result<Option<SavedRoles>> {
            Ok(self.saved.remove(&(guild_id, user_id)).map(|(_, s)| s))
        }

        async fn count_saved(&self, guild_id: u64) -> Result<u64> {
            Ok(self.saved.iter().filter(|e| e.key().0 == guild_id).count() as u64)
        }
    }

    #[tokio::test]
    async fn test_nothing_saved_while_disabled() {
        let service = RoleRestoreService::new(MockRoleRestoreStore::default());
        assert!(!service.remember(1, 2, vec![10]).await.unwrap());
        assert_eq!(service.count_saved(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_roles_restored_once() {
        let service = RoleRestoreService::new(MockRoleRestoreStore::default());
        let mutator = MockRoleMutator::default();
        let notifier = MockNotifier::default();
        service.set_enabled(1, true).await.unwrap();

        assert!(service.remember(1, 2, vec![10, 11, 12]).await.unwrap());

        // Role 12 was deleted while the member was away.
        let restored = service
            .restore(1, 2, &[10, 11], &mutator, &notifier)
            .await
            .unwrap();
        assert_eq!(restored, vec![10, 11]);
        assert_eq!(mutator.roles_of(1, 2), vec![10, 11]);

        let again = service
            .restore(1, 2, &[10, 11], &mutator, &notifier)
            .await
            .unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_denied_restore_notifies_owner() {
        let service = RoleRestoreService::new(MockRoleRestoreStore::default());
        let mutator = MockRoleMutator::default();
        let notifier = MockNotifier::default();
        mutator.denied.insert(2);
        service.set_enabled(1, true).await.unwrap();
        service.remember(1, 2, vec![10]).await.unwrap();

        let restored = service
            .restore(1, 2, &[10], &mutator, &notifier)
            .await
            .unwrap();
        assert!(restored.is_empty());
        assert_eq!(notifier.count(), 1);
        // Still saved for the next attempt.
        assert_eq!(service.count_saved(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_refused_role_does_not_block_the_rest() {
        let store = MockRoleRestoreStore::default();
        store.enabled.insert(1);
        let service = RoleRestoreService::new(store);
        let mutator = MockRoleMutator::default();
        let notifier = MockNotifier::default();
        mutator.denied_roles.insert(11);
        service.remember(1, 2, vec![10, 11, 12]).await.unwrap();

        let restored = service
            .restore(1, 2, &[10, 11, 12], &mutator, &notifier)
            .await
            .unwrap();

        assert_eq!(restored, vec![10, 12]);
        assert_eq!(mutator.roles_of(1, 2), vec![10, 12]);
        assert_eq!(notifier.count(), 1);

        let left = service.store.saved.get(&(1, 2)).map(|s| s.role_ids.clone());
        assert_eq!(left, Some(vec![11]));
    }
}
