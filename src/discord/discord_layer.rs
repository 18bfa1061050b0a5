// Discord layer - commands and event handlers.

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "roles/role_actions.rs"]
pub mod roles;

#[path = "roleblocker/events.rs"]
pub mod roleblocker;

#[path = "karma/events.rs"]
pub mod karma;

#[path = "rolerestore/events.rs"]
pub mod rolerestore;

use crate::core::graduation::GraduationService;
use crate::core::karma::KarmaService;
use crate::core::rolerestore::RoleRestoreService;
use crate::infra::graduation::JsonGraduationStore;
use crate::infra::karma::SqliteKarmaStore;
use crate::infra::rolerestore::SqliteRoleRestoreStore;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared state handed to every command and event handler.
pub struct Data {
    pub graduation: Arc<GraduationService<JsonGraduationStore>>,
    pub karma: Arc<KarmaService<SqliteKarmaStore>>,
    pub role_restore: Arc<RoleRestoreService<SqliteRoleRestoreStore>>,
    /// Who hears about permission problems. `None` when the application
    /// owner couldn't be resolved at startup.
    pub owner_id: Option<serenity::UserId>,
}
