// Karma: reactions on a message move its author's score up or down.
//
// The Discord layer hands us plain ids plus the emoji as displayed; whether a
// reaction counts is decided here.

use anyhow::{bail, Result};
use async_trait::async_trait;

pub const DEFAULT_UPVOTE: &str = "👍";
pub const DEFAULT_DOWNVOTE: &str = "👎";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KarmaConfig {
    pub guild_id: u64,
    pub enabled: bool,
    pub upvote: String,
    pub downvote: String,
}

impl KarmaConfig {
    pub fn new(guild_id: u64) -> Self {
        Self {
            guild_id,
            enabled: false,
            upvote: DEFAULT_UPVOTE.to_string(),
            downvote: DEFAULT_DOWNVOTE.to_string(),
        }
    }

    /// Karma change for a reaction with this emoji, if it is one of ours.
    pub fn delta_for(&self, emoji: &str) -> Option<i64> {
        if emoji == self.upvote {
            Some(1)
        } else if emoji == self.downvote {
            Some(-1)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KarmaEntry {
    pub user_id: u64,
    pub karma: i64,
}

/// A reaction as seen by the karma service.
#[derive(Debug, Clone)]
pub struct KarmaVote<'a> {
    pub guild_id: u64,
    pub voter_id: u64,
    pub voter_is_bot: bool,
    pub author_id: u64,
    pub emoji: &'a str,
    /// `false` when the reaction was removed.
    pub added: bool,
}

#[async_trait]
pub trait KarmaStore: Send + Sync {
    async fn get_config(&self, guild_id: u64) -> Result<Option<KarmaConfig>>;
    async fn save_config(&self, config: KarmaConfig) -> Result<()>;
    /// Add `delta` to a member's karma and return the new total.
    async fn adjust_karma(&self, guild_id: u64, user_id: u64, delta: i64) -> Result<i64>;
    async fn get_karma(&self, guild_id: u64, user_id: u64) -> Result<i64>;
    async fn top_karma(&self, guild_id: u64, limit: usize) -> Result<Vec<KarmaEntry>>;
}

pub struct KarmaService<S: KarmaStore> {
    store: S,
}

impl<S: KarmaStore> KarmaService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn get_config(&self, guild_id: u64) -> Result<KarmaConfig> {
        Ok(self
            .store
            .get_config(guild_id)
            .await?
            .unwrap_or_else(|| KarmaConfig::new(guild_id)))
    }

    pub async fn setup(&self, guild_id: u64, upvote: &str, downvote: &str) -> Result<()> {
        let upvote = upvote.trim();
        let downvote = downvote.trim();
        if upvote.is_empty() || downvote.is_empty() {
            bail!("Both emojis are required");
        }
        if upvote == downvote {
            bail!("Upvote and downvote must be different emojis");
        }

        let mut config = self.get_config(guild_id).await?;
        config.upvote = upvote.to_string();
        config.downvote = downvote.to_string();
        self.store.save_config(config).await
    }

    pub async fn set_enabled(&self, guild_id: u64, enabled: bool) -> Result<()> {
        let mut config = self.get_config(guild_id).await?;
        config.enabled = enabled;
        self.store.save_config(config).await
    }

    /// Apply a reaction. Returns the author's new karma when it changed.
    pub async fn process_vote(&self, vote: KarmaVote<'_>) -> Result<Option<i64>> {
        if vote.voter_is_bot || vote.voter_id == vote.author_id {
            return Ok(None);
        }

        let config = self.get_config(vote.guild_id).await?;
        if !config.enabled {
            return Ok(None);
        }

        let Some(delta) = config.delta_for(vote.emoji) else {
            return Ok(None);
        };
        let delta = if vote.added { delta } else { -delta };

        let total = self
            .store
            .adjust_karma(vote.guild_id, vote.author_id, delta)
            .await?;

        tracing::debug!(
            guild_id = vote.guild_id,
            author_id = vote.author_id,
            voter_id = vote.voter_id,
            delta,
            total,
            "Karma adjusted"
        );

        Ok(Some(total))
    }

    pub async fn get_karma(&self, guild_id: u64, user_id: u64) -> Result<i64> {
        self.store.get_karma(guild_id, user_id).await
    }

    pub async fn leaderboard(&self, guild_id: u64, limit: usize) -> Result<Vec<KarmaEntry>> {
        self.store.top_karma(guild_id, limit).await
    }
}
