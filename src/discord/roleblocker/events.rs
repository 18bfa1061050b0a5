use crate::discord::roles::{role_ids, DiscordRoleMutator, OwnerDm};
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

/// Strip extra exclusive ladder roles when a member gains roles.
///
/// The "before" snapshot only exists when the member was cached, so updates
/// for uncached members are skipped.
pub async fn handle_member_update(
    ctx: &serenity::Context,
    data: &Data,
    old: Option<&serenity::Member>,
    event: &serenity::GuildMemberUpdateEvent,
) -> Result<(), Error> {
    if event.user.bot {
        return Ok(());
    }

    let Some(old) = old else {
        tracing::debug!(
            user_id = event.user.id.get(),
            "Member update without cached roles, skipping exclusivity check"
        );
        return Ok(());
    };

    let before = role_ids(&old.roles);
    let after = role_ids(&event.roles);

    let mutator = DiscordRoleMutator::new(&ctx.http);
    let notifier = OwnerDm::new(&ctx.http, data.owner_id);

    data.graduation
        .enforce_exclusivity(
            event.guild_id.get(),
            event.user.id.get(),
            &before,
            &after,
            &mutator,
            &notifier,
        )
        .await?;

    Ok(())
}
