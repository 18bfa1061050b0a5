// Serenity-backed implementations of the core role ports.

use crate::core::role_mutation::{OwnerNotifier, RoleMutationError, RoleMutator};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;

/// Turn a serenity failure into the core's error. Discord answers 403 when we
/// lack Manage Roles or the role sits above ours.
fn classify(err: serenity::Error) -> RoleMutationError {
    if let serenity::Error::Http(http_err) = &err {
        if http_err.status_code().map(|status| status.as_u16()) == Some(403) {
            return RoleMutationError::PermissionDenied;
        }
    }
    RoleMutationError::Other(err.to_string())
}

pub struct DiscordRoleMutator<'a> {
    http: &'a serenity::Http,
}

impl<'a> DiscordRoleMutator<'a> {
    pub fn new(http: &'a serenity::Http) -> Self {
        Self { http }
    }
}

#[async_trait]
impl RoleMutator for DiscordRoleMutator<'_> {
    async fn add_roles(
        &self,
        guild_id: u64,
        user_id: u64,
        role_ids: &[u64],
        reason: &str,
    ) -> Result<(), RoleMutationError> {
        for &role_id in role_ids {
            self.http
                .add_member_role(
                    serenity::GuildId::new(guild_id),
                    serenity::UserId::new(user_id),
                    serenity::RoleId::new(role_id),
                    Some(reason),
                )
                .await
                .map_err(classify)?;
        }
        Ok(())
    }

    async fn remove_roles(
        &self,
        guild_id: u64,
        user_id: u64,
        role_ids: &[u64],
        reason: &str,
    ) -> Result<(), RoleMutationError> {
        for &role_id in role_ids {
            self.http
                .remove_member_role(
                    serenity::GuildId::new(guild_id),
                    serenity::UserId::new(user_id),
                    serenity::RoleId::new(role_id),
                    Some(reason),
                )
                .await
                .map_err(classify)?;
        }
        Ok(())
    }
}

/// Reports problems to the bot owner by DM.
pub struct OwnerDm<'a> {
    http: &'a serenity::Http,
    owner_id: Option<serenity::UserId>,
}

impl<'a> OwnerDm<'a> {
    pub fn new(http: &'a serenity::Http, owner_id: Option<serenity::UserId>) -> Self {
        Self { http, owner_id }
    }
}

#[async_trait]
impl OwnerNotifier for OwnerDm<'_> {
    async fn notify(&self, message: &str) {
        let Some(owner_id) = self.owner_id else {
            tracing::warn!("No owner to notify: {}", message);
            return;
        };

        let sent = match owner_id.create_dm_channel(self.http).await {
            Ok(channel) => channel.id.say(self.http, message).await.map(|_| ()),
            Err(e) => Err(e),
        };

        if let Err(e) = sent {
            tracing::error!("Failed to DM owner {}: {}", owner_id, e);
        }
    }
}

/// Roles the bot can hand out in a guild: everything below its own top role,
/// except @everyone and integration-managed roles.
pub async fn assignable_roles(
    http: &serenity::Http,
    guild_id: serenity::GuildId,
) -> Result<Vec<u64>, serenity::Error> {
    let roles = guild_id.roles(http).await?;
    let me = http.get_current_user().await?;
    let bot = guild_id.member(http, me.id).await?;

    let top_position = bot
        .roles
        .iter()
        .filter_map(|role_id| roles.get(role_id))
        .map(|role| role.position)
        .max()
        .unwrap_or(0);

    Ok(roles
        .values()
        .filter(|role| !role.managed && role.id.get() != guild_id.get())
        .filter(|role| role.position < top_position)
        .map(|role| role.id.get())
        .collect())
}

/// Role ids of a member as plain integers.
pub fn role_ids(roles: &[serenity::RoleId]) -> Vec<u64> {
    roles.iter().map(|role| role.get()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ids() {
        let roles = vec![serenity::RoleId::new(5), serenity::RoleId::new(9)];
        assert_eq!(role_ids(&roles), vec![5, 9]);
    }

    #[test]
    fn test_non_http_errors_are_not_permission_denied() {
        let err = serenity::Error::Other("boom");
        assert!(matches!(classify(err), RoleMutationError::Other(_)));
    }
}
