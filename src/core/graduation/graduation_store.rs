use super::graduation_models::GuildConfig;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Guild-scoped persistence for graduation settings.
///
/// A guild that was never saved reads as `GuildConfig::default()`, which is
/// how the default ladder gets registered without an explicit install step.
#[async_trait]
pub trait GraduationStore: Send + Sync {
    async fn get_config(&self, guild_id: u64) -> Result<GuildConfig, StoreError>;
    async fn save_config(&self, guild_id: u64, config: GuildConfig) -> Result<(), StoreError>;
}
