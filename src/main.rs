// This is the entry point of the Discord bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (JSON file, SQLite)
// - `discord/` = Discord-specific adapters (commands, events)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands and event handlers

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::graduation::GraduationService;
use crate::core::karma::KarmaService;
use crate::core::rolerestore::RoleRestoreService;
use crate::discord::{karma as karma_events, roleblocker, rolerestore as rolerestore_events};
use crate::discord::{Data, Error};
use crate::infra::graduation::JsonGraduationStore;
use crate::infra::karma::SqliteKarmaStore;
use crate::infra::rolerestore::SqliteRoleRestoreStore;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::Duration;

/// Event handler for non-command Discord events.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::GuildMemberUpdate {
            old_if_available,
            new: _,
            event,
        } => {
            if let Err(e) =
                roleblocker::handle_member_update(ctx, data, old_if_available.as_ref(), event).await
            {
                tracing::error!("Error enforcing exclusive roles: {}", e);
            }
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            if let Err(e) = rolerestore_events::handle_member_join(ctx, data, new_member).await {
                tracing::error!("Error restoring roles on join: {}", e);
            }
        }
        serenity::FullEvent::GuildMemberRemoval {
            guild_id,
            user,
            member_data_if_available,
        } => {
            if let Err(e) = rolerestore_events::handle_member_leave(
                ctx,
                data,
                *guild_id,
                user,
                member_data_if_available.as_ref(),
            )
            .await
            {
                tracing::error!("Error saving roles on leave: {}", e);
            }
        }
        serenity::FullEvent::ReactionAdd { add_reaction } => {
            if let Err(e) = karma_events::handle_reaction(ctx, data, add_reaction, true).await {
                tracing::error!("Error counting karma: {}", e);
            }
        }
        serenity::FullEvent::ReactionRemove { removed_reaction } => {
            if let Err(e) = karma_events::handle_reaction(ctx, data, removed_reaction, false).await
            {
                tracing::error!("Error uncounting karma: {}", e);
            }
        }

        _ => {}
    }

    Ok(())
}

/// Who gets DMs about permission problems: `OWNER_ID` if set, otherwise the
/// application owner.
async fn resolve_owner(http: &serenity::Http) -> Option<serenity::UserId> {
    if let Some(id) = std::env::var("OWNER_ID")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
    {
        return Some(serenity::UserId::new(id));
    }

    match http.get_current_application_info().await {
        Ok(info) => info.owner.map(|owner| owner.id),
        Err(e) => {
            tracing::warn!("Could not look up application owner: {}", e);
            None
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Get Discord bot token from environment
    let token = std::env::var("DISCORD_TOKEN").expect(
        "Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.",
    );

    // Keep runtime data in a dedicated folder so the repo root stays tidy.
    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());
    std::fs::create_dir_all(&data_dir).expect("Failed to create data directory");
    let graduation_path = format!("{}/graduation.json", data_dir);
    let cogs_db_path = format!("{}/cogs.db", data_dir);

    let promotion_delay = std::env::var("PROMOTION_DELAY_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(1000));

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let graduation_store =
        JsonGraduationStore::load(&graduation_path).expect("Failed to load graduation config");
    let graduation_service = Arc::new(
        GraduationService::new(graduation_store).with_promotion_delay(promotion_delay),
    );

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .connect(&format!("sqlite://{}?mode=rwc", cogs_db_path))
        .await
        .expect("Failed to connect to cogs DB");

    let karma_store = SqliteKarmaStore::new(pool.clone());
    karma_store
        .migrate()
        .await
        .expect("Failed to migrate karma tables");
    let karma_service = Arc::new(KarmaService::new(karma_store));

    let role_restore_store = SqliteRoleRestoreStore::new(pool);
    role_restore_store
        .migrate()
        .await
        .expect("Failed to migrate role restore tables");
    let role_restore_service = Arc::new(RoleRestoreService::new(role_restore_store));

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS // Member updates, joins and leaves
        | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                discord::commands::graduation::graduation(),
                discord::commands::karma::karma(),
                discord::commands::rolerestore::rolerestore(),
            ],
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                tracing::info!("Bot is starting up...");

                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                tracing::info!("Commands registered");

                let owner_id = resolve_owner(&ctx.http).await;
                if owner_id.is_none() {
                    tracing::warn!("No owner resolved, permission problems will only be logged");
                }

                Ok(Data {
                    graduation: graduation_service,
                    karma: karma_service,
                    role_restore: role_restore_service,
                    owner_id,
                })
            })
        })
        .build();

    // Member cache keeps "before" snapshots for member updates and leaves.
    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .expect("Error creating client");

    client.start().await.expect("Error running bot");
}
