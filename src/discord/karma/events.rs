use crate::core::karma::KarmaVote;
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

/// Count (or uncount) a reaction towards the message author's karma.
pub async fn handle_reaction(
    ctx: &serenity::Context,
    data: &Data,
    reaction: &serenity::Reaction,
    added: bool,
) -> Result<(), Error> {
    let (Some(guild_id), Some(voter_id)) = (reaction.guild_id, reaction.user_id) else {
        return Ok(());
    };

    // Cheap check before hitting the API for the message.
    let config = data.karma.get_config(guild_id.get()).await?;
    let emoji = reaction.emoji.to_string();
    if !config.enabled || config.delta_for(&emoji).is_none() {
        return Ok(());
    }

    let voter_is_bot = match reaction.member.as_ref() {
        Some(member) => member.user.bot,
        None => voter_id.to_user(ctx).await?.bot,
    };

    let message = reaction.message(ctx).await?;
    if message.author.bot {
        return Ok(());
    }

    let vote = KarmaVote {
        guild_id: guild_id.get(),
        voter_id: voter_id.get(),
        voter_is_bot,
        author_id: message.author.id.get(),
        emoji: &emoji,
        added,
    };

    if let Some(total) = data.karma.process_vote(vote).await? {
        tracing::debug!(
            guild_id = guild_id.get(),
            author_id = message.author.id.get(),
            total,
            "Karma updated from reaction"
        );
    }

    Ok(())
}
