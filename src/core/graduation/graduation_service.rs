// Graduation service - registry administration, promotion and exclusivity.
//
// The graph logic itself lives in `registry.rs`; this service loads a
// snapshot from the store, asks the pure functions what to do, and applies
// the answer through the role mutation port.

use super::graduation_models::{
    ExclusivityPlan, GuildConfig, MemberRoles, PromotionPlan, PromotionReport, RegisteredRole,
    DEFAULT_RESPONSE,
};
use super::graduation_store::{GraduationStore, StoreError};
use super::registry;
use crate::core::role_mutation::{
    permission_denied_notice, OwnerNotifier, RoleMutationError, RoleMutator,
};
use rand::seq::SliceRandom;
use std::time::Duration;
use thiserror::Error;

const PROMOTION_REASON: &str = "Graduation promotion";
const EXCLUSIVITY_REASON: &str = "Holding more than one exclusive ladder role";

#[derive(Debug, Error)]
pub enum GraduationError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Graduation is disabled in this server")]
    Disabled,

    #[error("Role {0} is not registered")]
    UnknownRole(u64),

    #[error("Role {0} is already registered")]
    DuplicateRole(u64),

    #[error("Role {0} already leads to role {1}")]
    DuplicateLink(u64, u64),

    #[error("Role {0} cannot lead to itself")]
    SelfLink(u64),

    #[error("Role {0} does not lead to role {1}")]
    NotLinked(u64, u64),

    #[error("The head role is not exclusive, so the ladder has no tail")]
    NoTail,

    #[error("There is no response number {0}")]
    ResponseIndex(usize),
}

/// What happened to one member during a promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberOutcome {
    Promoted(PromotionPlan),
    /// Member holds no promotable role.
    Skipped,
    /// Discord refused the change; the owner has been told.
    Denied,
    Failed(String),
}

pub struct GraduationService<S: GraduationStore> {
    store: S,
    /// Pause between members in a batch so we stay under Discord's rate limits.
    promotion_delay: Duration,
}

impl<S: GraduationStore> GraduationService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            promotion_delay: Duration::from_millis(1000),
        }
    }

    pub fn with_promotion_delay(mut self, delay: Duration) -> Self {
        self.promotion_delay = delay;
        self
    }

    pub async fn get_config(&self, guild_id: u64) -> Result<GuildConfig, GraduationError> {
        Ok(self.store.get_config(guild_id).await?)
    }

    /// Load, mutate and save a guild config in one go. Nothing is saved when
    /// `apply` fails.
    async fn update<T>(
        &self,
        guild_id: u64,
        apply: impl FnOnce(&mut GuildConfig) -> Result<T, GraduationError>,
    ) -> Result<T, GraduationError> {
        let mut config = self.store.get_config(guild_id).await?;
        let result = apply(&mut config)?;
        self.store.save_config(guild_id, config).await?;
        Ok(result)
    }

    pub async fn set_enabled(&self, guild_id: u64, enabled: bool) -> Result<(), GraduationError> {
        self.update(guild_id, |config| {
            config.enabled = enabled;
            Ok(())
        })
        .await
    }

    pub async fn set_head(&self, guild_id: u64, role_id: u64) -> Result<(), GraduationError> {
        self.update(guild_id, |config| {
            if registry::find_role(&config.registry, role_id).is_none() {
                return Err(GraduationError::UnknownRole(role_id));
            }
            config.head_id = Some(role_id);
            Ok(())
        })
        .await
    }

    pub async fn add_role(
        &self,
        guild_id: u64,
        role_id: u64,
        exclusive: bool,
    ) -> Result<(), GraduationError> {
        self.update(guild_id, |config| {
            if registry::find_role(&config.registry, role_id).is_some() {
                return Err(GraduationError::DuplicateRole(role_id));
            }
            config.registry.push(RegisteredRole::new(role_id, exclusive));
            Ok(())
        })
        .await
    }

    /// Register an exclusive role below the current end of the ladder.
    ///
    /// Returns the parent it was linked under, or `None` when the ladder was
    /// empty and the role became the head.
    pub async fn append_role(
        &self,
        guild_id: u64,
        role_id: u64,
    ) -> Result<Option<u64>, GraduationError> {
        self.update(guild_id, |config| {
            if registry::find_role(&config.registry, role_id).is_some() {
                return Err(GraduationError::DuplicateRole(role_id));
            }

            let Some(head_id) = config.head_id else {
                config.registry.push(RegisteredRole::new(role_id, true));
                config.head_id = Some(role_id);
                return Ok(None);
            };

            let parent_id = registry::get_tail(&config.registry, head_id, 0)
                .role_id
                .ok_or(GraduationError::NoTail)?;

            config.registry.push(RegisteredRole::new(role_id, true));
            if let Some(parent) = config.registry.iter_mut().find(|n| n.role_id == parent_id) {
                parent.next_ids.push(role_id);
            }
            Ok(Some(parent_id))
        })
        .await
    }

    /// Drop a role from the registry along with every link pointing at it.
    pub async fn remove_role(&self, guild_id: u64, role_id: u64) -> Result<(), GraduationError> {
        self.update(guild_id, |config| {
            let before = config.registry.len();
            config.registry.retain(|n| n.role_id != role_id);
            if config.registry.len() == before {
                return Err(GraduationError::UnknownRole(role_id));
            }

            for node in &mut config.registry {
                node.next_ids.retain(|&next| next != role_id);
            }
            if config.head_id == Some(role_id) {
                config.head_id = None;
            }
            Ok(())
        })
        .await
    }

    pub async fn link(
        &self,
        guild_id: u64,
        parent_id: u64,
        child_id: u64,
    ) -> Result<(), GraduationError> {
        self.update(guild_id, |config| {
            if parent_id == child_id {
                return Err(GraduationError::SelfLink(parent_id));
            }
            if registry::find_role(&config.registry, child_id).is_none() {
                return Err(GraduationError::UnknownRole(child_id));
            }

            let parent = config
                .registry
                .iter_mut()
                .find(|n| n.role_id == parent_id)
                .ok_or(GraduationError::UnknownRole(parent_id))?;

            if parent.next_ids.contains(&child_id) {
                return Err(GraduationError::DuplicateLink(parent_id, child_id));
            }
            parent.next_ids.push(child_id);
            Ok(())
        })
        .await
    }

    pub async fn unlink(
        &self,
        guild_id: u64,
        parent_id: u64,
        child_id: u64,
    ) -> Result<(), GraduationError> {
        self.update(guild_id, |config| {
            let parent = config
                .registry
                .iter_mut()
                .find(|n| n.role_id == parent_id)
                .ok_or(GraduationError::UnknownRole(parent_id))?;

            let before = parent.next_ids.len();
            parent.next_ids.retain(|&next| next != child_id);
            if parent.next_ids.len() == before {
                return Err(GraduationError::NotLinked(parent_id, child_id));
            }
            Ok(())
        })
        .await
    }

    pub async fn set_exclusive(
        &self,
        guild_id: u64,
        role_id: u64,
        exclusive: bool,
    ) -> Result<(), GraduationError> {
        self.update(guild_id, |config| {
            let node = config
                .registry
                .iter_mut()
                .find(|n| n.role_id == role_id)
                .ok_or(GraduationError::UnknownRole(role_id))?;
            node.exclusive = exclusive;
            Ok(())
        })
        .await
    }

    pub async fn add_response(&self, guild_id: u64, template: String) -> Result<(), GraduationError> {
        self.update(guild_id, |config| {
            config.responses.push(template);
            Ok(())
        })
        .await
    }

    /// Remove a response by its 1-based position, as shown in the listing.
    pub async fn remove_response(
        &self,
        guild_id: u64,
        position: usize,
    ) -> Result<String, GraduationError> {
        self.update(guild_id, |config| {
            if position == 0 || position > config.responses.len() {
                return Err(GraduationError::ResponseIndex(position));
            }
            Ok(config.responses.remove(position - 1))
        })
        .await
    }

    /// Promote one member.
    pub async fn promote_member<M, N>(
        &self,
        guild_id: u64,
        member: &MemberRoles,
        mutator: &M,
        notifier: &N,
    ) -> Result<MemberOutcome, GraduationError>
    where
        M: RoleMutator + ?Sized,
        N: OwnerNotifier + ?Sized,
    {
        let config = self.store.get_config(guild_id).await?;
        if !config.enabled {
            return Err(GraduationError::Disabled);
        }

        Ok(apply_promotion(&config, guild_id, member, mutator, notifier).await)
    }

    /// Promote every member in `members` out of `from_role`, one at a time.
    ///
    /// Only `from_role` is revoked, even when a member also holds other ladder
    /// roles. Members not holding it are skipped. The registry is read once up
    /// front, so edits made while the batch runs only apply to the next batch.
    /// Denied or failed members are recorded in the report and the batch moves
    /// on. Members that were actually changed are spaced by the promotion delay.
    pub async fn promote_members<M, N>(
        &self,
        guild_id: u64,
        from_role: u64,
        members: &[MemberRoles],
        mutator: &M,
        notifier: &N,
    ) -> Result<PromotionReport, GraduationError>
    where
        M: RoleMutator + ?Sized,
        N: OwnerNotifier + ?Sized,
    {
        let config = self.store.get_config(guild_id).await?;
        if !config.enabled {
            return Err(GraduationError::Disabled);
        }
        if registry::find_role(&config.registry, from_role).is_none() {
            return Err(GraduationError::UnknownRole(from_role));
        }

        let mut report = PromotionReport::default();
        let plan = registry::plan_promotion_from(&config.registry, from_role);
        let mut first = true;

        for member in members {
            let Some(plan) = plan.as_ref().filter(|_| member.role_ids.contains(&from_role)) else {
                report.skipped.push(member.user_id);
                continue;
            };

            if !first && !self.promotion_delay.is_zero() {
                tokio::time::sleep(self.promotion_delay).await;
            }
            first = false;

            match apply_plan(plan.clone(), guild_id, member.user_id, mutator, notifier).await {
                MemberOutcome::Promoted(_) => report.promoted.push(member.user_id),
                MemberOutcome::Skipped => report.skipped.push(member.user_id),
                MemberOutcome::Denied => report.denied.push(member.user_id),
                MemberOutcome::Failed(_) => report.failed.push(member.user_id),
            }
        }

        tracing::info!(
            guild_id,
            from_role,
            promoted = report.promoted.len(),
            skipped = report.skipped.len(),
            denied = report.denied.len(),
            failed = report.failed.len(),
            "Promotion batch finished"
        );

        Ok(report)
    }

    /// React to a member gaining roles: strip every exclusive ladder role but
    /// the deepest one.
    ///
    /// Only runs when `after` holds strictly more roles than `before`, the
    /// guild has graduation enabled, and a head is configured. Returns the plan
    /// that was applied, if any.
    pub async fn enforce_exclusivity<M, N>(
        &self,
        guild_id: u64,
        user_id: u64,
        before: &[u64],
        after: &[u64],
        mutator: &M,
        notifier: &N,
    ) -> Result<Option<ExclusivityPlan>, GraduationError>
    where
        M: RoleMutator + ?Sized,
        N: OwnerNotifier + ?Sized,
    {
        if after.len() <= before.len() {
            return Ok(None);
        }

        let config = self.store.get_config(guild_id).await?;
        if !config.enabled {
            return Ok(None);
        }
        let Some(head_id) = config.head_id else {
            return Ok(None);
        };

        let Some(plan) = registry::plan_exclusivity(&config.registry, head_id, after) else {
            return Ok(None);
        };

        match mutator
            .remove_roles(guild_id, user_id, &plan.revoke, EXCLUSIVITY_REASON)
            .await
        {
            Ok(()) => {
                tracing::info!(
                    guild_id,
                    user_id,
                    kept = plan.keep,
                    revoked = ?plan.revoke,
                    "Removed extra exclusive roles"
                );
                Ok(Some(plan))
            }
            Err(RoleMutationError::PermissionDenied) => {
                tracing::warn!(guild_id, user_id, "Not allowed to remove exclusive roles");
                notifier
                    .notify(&permission_denied_notice("roleblocker", guild_id, user_id))
                    .await;
                Ok(None)
            }
            Err(RoleMutationError::Other(e)) => {
                tracing::error!(guild_id, user_id, "Failed to remove exclusive roles: {}", e);
                Ok(None)
            }
        }
    }
}

/// Random congratulation template; falls back to the default when the guild
/// removed all of its own.
pub fn pick_response(config: &GuildConfig) -> String {
    config
        .responses
        .choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_else(|| DEFAULT_RESPONSE.to_string())
}

/// Fill `{member}` and `{roles}` in a response template.
pub fn render_response(template: &str, member: &str, roles: &[String]) -> String {
    template
        .replace("{member}", member)
        .replace("{roles}", &roles.join(", "))
}

async fn apply_promotion<M, N>(
    config: &GuildConfig,
    guild_id: u64,
    member: &MemberRoles,
    mutator: &M,
    notifier: &N,
) -> MemberOutcome
where
    M: RoleMutator + ?Sized,
    N: OwnerNotifier + ?Sized,
{
    match registry::plan_promotion(&config.registry, &member.role_ids) {
        Some(plan) => apply_plan(plan, guild_id, member.user_id, mutator, notifier).await,
        None => MemberOutcome::Skipped,
    }
}

/// Owner notice for a promotion whose grant went through but whose revoke
/// was refused.
fn partial_promotion_notice(guild_id: u64, user_id: u64, plan: &PromotionPlan) -> String {
    let granted: Vec<String> = plan.grant.iter().map(|id| format!("<@&{}>", id)).collect();
    format!(
        "{} <@{}> was given {} but still holds <@&{}>; remove it by hand.",
        permission_denied_notice("graduation", guild_id, user_id),
        user_id,
        granted.join(", "),
        plan.revoke
    )
}

async fn apply_plan<M, N>(
    plan: PromotionPlan,
    guild_id: u64,
    user_id: u64,
    mutator: &M,
    notifier: &N,
) -> MemberOutcome
where
    M: RoleMutator + ?Sized,
    N: OwnerNotifier + ?Sized,
{
    // Grant first so a refused revoke never leaves the member with nothing.
    if let Err(e) = mutator
        .add_roles(guild_id, user_id, &plan.grant, PROMOTION_REASON)
        .await
    {
        return match e {
            RoleMutationError::PermissionDenied => {
                tracing::warn!(guild_id, user_id, "Not allowed to promote member");
                notifier
                    .notify(&permission_denied_notice("graduation", guild_id, user_id))
                    .await;
                MemberOutcome::Denied
            }
            RoleMutationError::Other(e) => {
                tracing::error!(guild_id, user_id, "Failed to promote member: {}", e);
                MemberOutcome::Failed(e)
            }
        };
    }

    match mutator
        .remove_roles(guild_id, user_id, &[plan.revoke], PROMOTION_REASON)
        .await
    {
        Ok(()) => {
            tracing::info!(
                guild_id,
                user_id,
                revoked = plan.revoke,
                granted = ?plan.grant,
                "Promoted member"
            );
            MemberOutcome::Promoted(plan)
        }
        Err(RoleMutationError::PermissionDenied) => {
            tracing::warn!(
                guild_id,
                user_id,
                kept = plan.revoke,
                "Granted next roles but not allowed to remove the old one"
            );
            notifier
                .notify(&partial_promotion_notice(guild_id, user_id, &plan))
                .await;
            MemberOutcome::Denied
        }
        Err(RoleMutationError::Other(e)) => {
            tracing::error!(
                guild_id,
                user_id,
                kept = plan.revoke,
                "Granted next roles but failed to remove the old one: {}",
                e
            );
            MemberOutcome::Failed(format!("{} (old role <@&{}> still held)", e, plan.revoke))
        }
    }
}
