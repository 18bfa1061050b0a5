// Discord commands for the graduation ladder.
//
// Same pattern as the other command files: pull ids out of the Discord
// types, call the core service, and turn the result into a reply.

use crate::core::graduation::{
    pick_response, registry, render_response, GraduationError, GuildConfig, MemberOutcome,
    MemberRoles, PromotionReport,
};
use crate::discord::roles::{role_ids, DiscordRoleMutator, OwnerDm};
use crate::discord::{Context, Error};
use poise::serenity_prelude::{self as serenity, Mentionable};
use std::time::Duration;

const MEMBER_PAGE_SIZE: u64 = 1000;

/// Manage the role ladder and promote members along it.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_ROLES",
    subcommands(
        "status",
        "enable",
        "disable",
        "set_head",
        "add_role",
        "append",
        "remove_role",
        "link",
        "unlink",
        "exclusive",
        "responses",
        "add_response",
        "remove_response",
        "promote",
        "promote_all"
    )
)]
pub async fn graduation(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

fn role_mention(role_id: u64) -> String {
    format!("<@&{}>", role_id)
}

/// One line per registered role: `<@&id> (exclusive) → <@&next>, ...`.
fn describe_registry(config: &GuildConfig) -> String {
    if config.registry.is_empty() {
        return "No roles registered yet. Use `/graduation append` to start a ladder.".to_string();
    }

    config
        .registry
        .iter()
        .map(|node| {
            let mut line = role_mention(node.role_id);
            if config.head_id == Some(node.role_id) {
                line.push_str(" 🏁");
            }
            if node.exclusive {
                line.push_str(" (exclusive)");
            }
            if !node.next_ids.is_empty() {
                let next: Vec<String> = node.next_ids.iter().map(|&id| role_mention(id)).collect();
                line.push_str(" → ");
                line.push_str(&next.join(", "));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_report(report: &PromotionReport) -> String {
    let mut summary = format!(
        "🎓 Promotion finished: **{}** promoted, **{}** skipped",
        report.promoted.len(),
        report.skipped.len()
    );
    if !report.denied.is_empty() {
        summary.push_str(&format!(
            ", **{}** denied (missing permissions, owner notified)",
            report.denied.len()
        ));
    }
    if !report.failed.is_empty() {
        summary.push_str(&format!(", **{}** failed", report.failed.len()));
    }
    summary.push('.');
    summary
}

/// Say `message`, or the error text for anything the admin can fix.
/// Storage failures still go to the framework's error handler.
async fn respond(ctx: Context<'_>, result: Result<String, GraduationError>) -> Result<(), Error> {
    match result {
        Ok(message) => {
            ctx.say(message).await?;
        }
        Err(GraduationError::Store(e)) => return Err(e.into()),
        Err(e) => {
            ctx.say(format!("❌ {}", e)).await?;
        }
    }
    Ok(())
}

/// Show the ladder for this server.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let config = ctx.data().graduation.get_config(guild_id).await?;

    let head = config
        .head_id
        .map(role_mention)
        .unwrap_or_else(|| "Not set".to_string());
    let tail = config
        .head_id
        .map(|head_id| registry::get_tail(&config.registry, head_id, 0))
        .and_then(|tail| {
            tail.role_id
                .map(|role_id| format!("{} (depth {})", role_mention(role_id), tail.depth))
        })
        .unwrap_or_else(|| "None".to_string());

    let mut ladder = describe_registry(&config);
    // Embed descriptions cap at 4096 characters.
    if let Some((cut, _)) = ladder.char_indices().nth(4000) {
        ladder.truncate(cut);
        ladder.push_str("...");
    }

    let embed = serenity::CreateEmbed::new()
        .title("🎓 Graduation")
        .color(if config.enabled { 0x00FF00 } else { 0xFF0000 })
        .description(ladder)
        .field(
            "Status",
            if config.enabled { "✅ Enabled" } else { "❌ Disabled" },
            false,
        )
        .field("Head", head, true)
        .field("Tail", tail, true)
        .field("Responses", config.responses.len().to_string(), true);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Turn on promotions and exclusive-role enforcement.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn enable(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let result = ctx.data().graduation.set_enabled(guild_id, true).await;
    respond(ctx, result.map(|_| "✅ Graduation enabled.".to_string())).await
}

/// Turn off promotions and exclusive-role enforcement.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn disable(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let result = ctx.data().graduation.set_enabled(guild_id, false).await;
    respond(ctx, result.map(|_| "🛑 Graduation disabled.".to_string())).await
}

/// Choose the first role of the ladder.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn set_head(
    ctx: Context<'_>,
    #[description = "Registered role to start the ladder from"] role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let result = ctx.data().graduation.set_head(guild_id, role.id.get()).await;
    respond(
        ctx,
        result.map(|_| format!("🏁 The ladder now starts at {}.", role.mention())),
    )
    .await
}

/// Register a role without linking it anywhere.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn add_role(
    ctx: Context<'_>,
    #[description = "Role to register"] role: serenity::Role,
    #[description = "Members hold at most one role of this tier (default: yes)"]
    exclusive: Option<bool>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let exclusive = exclusive.unwrap_or(true);
    let result = ctx
        .data()
        .graduation
        .add_role(guild_id, role.id.get(), exclusive)
        .await;
    respond(
        ctx,
        result.map(|_| format!("✅ Registered {}.", role.mention())),
    )
    .await
}

/// Add a role at the end of the ladder.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn append(
    ctx: Context<'_>,
    #[description = "Role to add below the current last role"] role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let result = ctx.data().graduation.append_role(guild_id, role.id.get()).await;
    respond(
        ctx,
        result.map(|parent| match parent {
            Some(parent_id) => format!(
                "✅ {} now follows {}.",
                role.mention(),
                role_mention(parent_id)
            ),
            None => format!("🏁 {} starts the ladder.", role.mention()),
        }),
    )
    .await
}

/// Unregister a role and drop every link to it.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn remove_role(
    ctx: Context<'_>,
    #[description = "Role to unregister"] role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let result = ctx.data().graduation.remove_role(guild_id, role.id.get()).await;
    respond(
        ctx,
        result.map(|_| format!("🗑️ Removed {} from the ladder.", role.mention())),
    )
    .await
}

/// Make one registered role lead to another.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn link(
    ctx: Context<'_>,
    #[description = "Current tier"] from: serenity::Role,
    #[description = "Tier members graduate to"] to: serenity::Role,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let result = ctx
        .data()
        .graduation
        .link(guild_id, from.id.get(), to.id.get())
        .await;
    respond(
        ctx,
        result.map(|_| format!("🔗 {} → {}", from.mention(), to.mention())),
    )
    .await
}

/// Remove a link between two registered roles.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn unlink(
    ctx: Context<'_>,
    #[description = "Current tier"] from: serenity::Role,
    #[description = "Tier to stop leading to"] to: serenity::Role,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let result = ctx
        .data()
        .graduation
        .unlink(guild_id, from.id.get(), to.id.get())
        .await;
    respond(
        ctx,
        result.map(|_| format!("✂️ {} no longer leads to {}.", from.mention(), to.mention())),
    )
    .await
}

/// Mark whether members may hold only one role of a tier.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn exclusive(
    ctx: Context<'_>,
    #[description = "Registered role"] role: serenity::Role,
    #[description = "Exclusive or not"] exclusive: bool,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let result = ctx
        .data()
        .graduation
        .set_exclusive(guild_id, role.id.get(), exclusive)
        .await;
    respond(
        ctx,
        result.map(|_| {
            format!(
                "✅ {} is {} exclusive.",
                role.mention(),
                if exclusive { "now" } else { "no longer" }
            )
        }),
    )
    .await
}

/// List the congratulation messages.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn responses(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let config = ctx.data().graduation.get_config(guild_id).await?;

    let listing = if config.responses.is_empty() {
        "No responses configured, the default one is used.".to_string()
    } else {
        config
            .responses
            .iter()
            .enumerate()
            .map(|(i, template)| format!("**{}.** {}", i + 1, template))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let embed = serenity::CreateEmbed::new()
        .title("🎓 Graduation responses")
        .color(serenity::Color::BLURPLE)
        .description(listing)
        .footer(serenity::CreateEmbedFooter::new(
            "Placeholders: {member} and {roles}",
        ));

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Add a congratulation message. Use {member} and {roles} as placeholders.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn add_response(
    ctx: Context<'_>,
    #[description = "Message template"] template: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let result = ctx.data().graduation.add_response(guild_id, template).await;
    respond(ctx, result.map(|_| "✅ Response added.".to_string())).await
}

/// Remove a congratulation message by its number in `/graduation responses`.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn remove_response(
    ctx: Context<'_>,
    #[description = "Response number"] number: u32,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let result = ctx.data().graduation.remove_response(guild_id, number as usize).await;
    respond(ctx, result.map(|removed| format!("🗑️ Removed: {}", removed))).await
}

/// Promote one member to the next tier.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn promote(
    ctx: Context<'_>,
    #[description = "Member to promote"] member: serenity::Member,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let data = ctx.data();

    if member.user.bot {
        ctx.say("Bots don't graduate! 🤖").await?;
        return Ok(());
    }

    let target = MemberRoles {
        user_id: member.user.id.get(),
        role_ids: role_ids(&member.roles),
    };
    let mutator = DiscordRoleMutator::new(ctx.http());
    let notifier = OwnerDm::new(ctx.http(), data.owner_id);

    let outcome = data
        .graduation
        .promote_member(guild_id, &target, &mutator, &notifier)
        .await;

    let message = match outcome {
        Ok(MemberOutcome::Promoted(plan)) => {
            let config = data.graduation.get_config(guild_id).await?;
            let roles: Vec<String> = plan.grant.iter().map(|&id| role_mention(id)).collect();
            render_response(
                &pick_response(&config),
                &member.mention().to_string(),
                &roles,
            )
        }
        Ok(MemberOutcome::Skipped) => format!(
            "{} has no role with a next tier, nothing to do.",
            member.mention()
        ),
        Ok(MemberOutcome::Denied) => {
            "❌ I'm not allowed to change that member's roles. The bot owner has been notified."
                .to_string()
        }
        Ok(MemberOutcome::Failed(e)) => format!("❌ Promotion failed: {}", e),
        Err(GraduationError::Store(e)) => return Err(e.into()),
        Err(e) => format!("❌ {}", e),
    };

    ctx.say(message).await?;
    Ok(())
}

/// Fetch every member of a guild, page by page.
async fn fetch_members(
    ctx: Context<'_>,
    guild_id: serenity::GuildId,
) -> Result<Vec<serenity::Member>, Error> {
    let mut members = Vec::new();
    let mut after: Option<serenity::UserId> = None;

    loop {
        let page = guild_id
            .members(ctx.http(), Some(MEMBER_PAGE_SIZE), after)
            .await?;
        let last_page = (page.len() as u64) < MEMBER_PAGE_SIZE;
        after = page.last().map(|member| member.user.id);
        members.extend(page);

        if last_page || after.is_none() {
            break;
        }
    }

    Ok(members)
}

/// Promote everyone holding a role, after confirmation.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn promote_all(
    ctx: Context<'_>,
    #[description = "Promote every member holding this role"] role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?;
    let data = ctx.data();

    ctx.defer().await?;

    let config = data.graduation.get_config(guild_id.get()).await?;
    if !config.enabled {
        ctx.say(format!("❌ {}", GraduationError::Disabled)).await?;
        return Ok(());
    }

    let Some(plan) = registry::plan_promotion_from(&config.registry, role.id.get()) else {
        ctx.say(format!(
            "{} has no next tier registered, nothing to do.",
            role.mention()
        ))
        .await?;
        return Ok(());
    };

    let batch: Vec<MemberRoles> = fetch_members(ctx, guild_id)
        .await?
        .into_iter()
        .filter(|member| !member.user.bot && member.roles.contains(&role.id))
        .map(|member| MemberRoles {
            user_id: member.user.id.get(),
            role_ids: role_ids(&member.roles),
        })
        .collect();

    if batch.is_empty() {
        ctx.say(format!("Nobody holds {}.", role.mention())).await?;
        return Ok(());
    }

    let targets: Vec<String> = plan.grant.iter().map(|&id| role_mention(id)).collect();
    let components = vec![serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new("confirm")
            .label("Promote")
            .style(serenity::ButtonStyle::Success),
        serenity::CreateButton::new("cancel")
            .label("Cancel")
            .style(serenity::ButtonStyle::Secondary),
    ])];

    let reply = ctx
        .send(
            poise::CreateReply::default()
                .content(format!(
                    "Promote **{}** members from {} to {}?",
                    batch.len(),
                    role.mention(),
                    targets.join(", ")
                ))
                .components(components),
        )
        .await?;
    let msg_id = reply.message().await?.id;

    let Some(mci) = serenity::ComponentInteractionCollector::new(ctx)
        .author_id(ctx.author().id)
        .channel_id(ctx.channel_id())
        .timeout(Duration::from_secs(60))
        .filter(move |mci| mci.message.id == msg_id)
        .await
    else {
        reply
            .edit(
                ctx,
                poise::CreateReply::default()
                    .content("⌛ Timed out, nobody was promoted.")
                    .components(vec![]),
            )
            .await?;
        return Ok(());
    };

    let confirmed = mci.data.custom_id == "confirm";
    mci.create_response(
        &ctx,
        serenity::CreateInteractionResponse::UpdateMessage(
            serenity::CreateInteractionResponseMessage::new()
                .content(if confirmed {
                    format!("⏳ Promoting {} members...", batch.len())
                } else {
                    "Cancelled, nobody was promoted.".to_string()
                })
                .components(vec![]),
        ),
    )
    .await?;

    if !confirmed {
        return Ok(());
    }

    tracing::info!(
        guild_id = guild_id.get(),
        role_id = role.id.get(),
        members = batch.len(),
        "Starting promotion batch"
    );

    let mutator = DiscordRoleMutator::new(ctx.http());
    let notifier = OwnerDm::new(ctx.http(), data.owner_id);
    let summary = match data
        .graduation
        .promote_members(guild_id.get(), role.id.get(), &batch, &mutator, &notifier)
        .await
    {
        Ok(report) => format_report(&report),
        Err(GraduationError::Store(e)) => return Err(e.into()),
        Err(e) => format!("❌ {}", e),
    };

    // Large batches outlive the interaction token, so post to the channel.
    ctx.channel_id().say(ctx.http(), summary).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graduation::RegisteredRole;

    #[test]
    fn test_describe_registry() {
        let config = GuildConfig {
            enabled: true,
            head_id: Some(1),
            registry: vec![
                RegisteredRole {
                    role_id: 1,
                    next_ids: vec![2, 3],
                    exclusive: true,
                },
                RegisteredRole::new(2, false),
            ],
            responses: vec![],
        };

        assert_eq!(
            describe_registry(&config),
            "<@&1> 🏁 (exclusive) → <@&2>, <@&3>\n<@&2>"
        );
        assert!(describe_registry(&GuildConfig::default()).starts_with("No roles"));
    }

    #[test]
    fn test_format_report() {
        let report = PromotionReport {
            promoted: vec![1, 2],
            skipped: vec![3],
            denied: vec![4],
            failed: vec![],
        };
        assert_eq!(
            format_report(&report),
            "🎓 Promotion finished: **2** promoted, **1** skipped, \
             **1** denied (missing permissions, owner notified)."
        );
    }
}
