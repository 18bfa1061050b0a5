use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

const LEADERBOARD_SIZE: usize = 10;

/// Karma earned from reactions.
#[poise::command(
    slash_command,
    guild_only,
    subcommands("show", "leaderboard", "setup", "enable", "disable")
)]
pub async fn karma(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Show someone's karma (defaults to you).
#[poise::command(slash_command, guild_only)]
pub async fn show(
    ctx: Context<'_>,
    #[description = "User to check (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let target = user.as_ref().unwrap_or_else(|| ctx.author());

    let karma = ctx.data().karma.get_karma(guild_id, target.id.get()).await?;
    ctx.say(format!("**{}** has **{}** karma.", target.name, karma))
        .await?;
    Ok(())
}

/// Top members by karma.
#[poise::command(slash_command, guild_only)]
pub async fn leaderboard(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let entries = ctx
        .data()
        .karma
        .leaderboard(guild_id, LEADERBOARD_SIZE)
        .await?;

    if entries.is_empty() {
        ctx.say("Nobody has any karma yet.").await?;
        return Ok(());
    }

    let description = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| format!("**#{}** <@{}> · {} karma", i + 1, entry.user_id, entry.karma))
        .collect::<Vec<_>>()
        .join("\n");

    let embed = serenity::CreateEmbed::new()
        .title("✨ Karma leaderboard")
        .description(description)
        .color(0xffd700);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Choose which reactions count as upvotes and downvotes.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn setup(
    ctx: Context<'_>,
    #[description = "Emoji that adds karma"] upvote: String,
    #[description = "Emoji that removes karma"] downvote: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();

    match ctx.data().karma.setup(guild_id, &upvote, &downvote).await {
        Ok(()) => {
            ctx.say(format!(
                "✅ Karma now counts {} as upvote and {} as downvote.",
                upvote.trim(),
                downvote.trim()
            ))
            .await?;
        }
        Err(e) => {
            ctx.say(format!("❌ {}", e)).await?;
        }
    }
    Ok(())
}

/// Start counting karma.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn enable(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    ctx.data().karma.set_enabled(guild_id, true).await?;
    ctx.say("✅ Karma enabled.").await?;
    Ok(())
}

/// Stop counting karma.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn disable(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    ctx.data().karma.set_enabled(guild_id, false).await?;
    ctx.say("🛑 Karma disabled.").await?;
    Ok(())
}
