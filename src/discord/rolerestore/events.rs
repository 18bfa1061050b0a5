use crate::discord::roles::{assignable_roles, role_ids, DiscordRoleMutator, OwnerDm};
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

pub async fn handle_member_leave(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: serenity::GuildId,
    user: &serenity::User,
    member: Option<&serenity::Member>,
) -> Result<(), Error> {
    if user.bot || !data.role_restore.is_enabled(guild_id.get()).await? {
        return Ok(());
    }

    // Without the cached member we don't know which roles they had.
    let Some(member) = member else {
        tracing::warn!(
            guild_id = guild_id.get(),
            user_id = user.id.get(),
            "Member left but was not cached, roles not saved"
        );
        return Ok(());
    };

    let assignable = assignable_roles(&ctx.http, guild_id).await?;
    let roles: Vec<u64> = role_ids(&member.roles)
        .into_iter()
        .filter(|role_id| assignable.contains(role_id))
        .collect();

    if data
        .role_restore
        .remember(guild_id.get(), user.id.get(), roles)
        .await?
    {
        tracing::info!(
            guild_id = guild_id.get(),
            user_id = user.id.get(),
            "Saved roles of leaving member"
        );
    }

    Ok(())
}

pub async fn handle_member_join(
    ctx: &serenity::Context,
    data: &Data,
    member: &serenity::Member,
) -> Result<(), Error> {
    if member.user.bot || !data.role_restore.is_enabled(member.guild_id.get()).await? {
        return Ok(());
    }

    let assignable = assignable_roles(&ctx.http, member.guild_id).await?;
    let mutator = DiscordRoleMutator::new(&ctx.http);
    let notifier = OwnerDm::new(&ctx.http, data.owner_id);

    data.role_restore
        .restore(
            member.guild_id.get(),
            member.user.id.get(),
            &assignable,
            &mutator,
            &notifier,
        )
        .await?;

    Ok(())
}
