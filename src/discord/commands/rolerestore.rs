use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Give members their roles back when they rejoin.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_ROLES",
    subcommands("status", "enable", "disable")
)]
pub async fn rolerestore(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Show whether roles are being restored.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let enabled = ctx.data().role_restore.is_enabled(guild_id).await?;
    let saved = ctx.data().role_restore.count_saved(guild_id).await?;

    let embed = serenity::CreateEmbed::default()
        .title("Role Restore")
        .color(serenity::Color::BLURPLE)
        .field(
            "Status",
            if enabled { "Enabled" } else { "Disabled" },
            false,
        )
        .field("Members waiting to rejoin", saved.to_string(), false)
        .footer(serenity::CreateEmbedFooter::new(
            "Managed roles and @everyone are never saved",
        ));

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Save roles of leaving members and restore them on rejoin.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn enable(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    ctx.data().role_restore.set_enabled(guild_id, true).await?;
    ctx.say("✅ Role restore enabled.").await?;
    Ok(())
}

/// Stop restoring roles. Saved roles are kept until the member rejoins.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn disable(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    ctx.data().role_restore.set_enabled(guild_id, false).await?;
    ctx.say("🛑 Role restore disabled.").await?;
    Ok(())
}
