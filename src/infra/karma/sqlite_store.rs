use crate::core::karma::{KarmaConfig, KarmaEntry, KarmaStore};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteKarmaStore {
    pool: Pool<Sqlite>,
}

impl SqliteKarmaStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS karma_config (
                guild_id INTEGER PRIMARY KEY,
                enabled BOOLEAN NOT NULL DEFAULT 0,
                upvote TEXT NOT NULL,
                downvote TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS karma (
                guild_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                karma INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (guild_id, user_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl KarmaStore for SqliteKarmaStore {
    async fn get_config(&self, guild_id: u64) -> Result<Option<KarmaConfig>> {
        let row = sqlx::query("SELECT * FROM karma_config WHERE guild_id = ?")
            .bind(guild_id as i64)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| KarmaConfig {
            guild_id,
            enabled: row.get("enabled"),
            upvote: row.get("upvote"),
            downvote: row.get("downvote"),
        }))
    }

    async fn save_config(&self, config: KarmaConfig) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO karma_config (guild_id, enabled, upvote, downvote)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET
                enabled = excluded.enabled,
                upvote = excluded.upvote,
                downvote = excluded.downvote
            "#,
        )
        .bind(config.guild_id as i64)
        .bind(config.enabled)
        .bind(&config.upvote)
        .bind(&config.downvote)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn adjust_karma(&self, guild_id: u64, user_id: u64, delta: i64) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO karma (guild_id, user_id, karma)
            VALUES (?, ?, ?)
            ON CONFLICT(guild_id, user_id) DO UPDATE SET
                karma = karma + excluded.karma
            RETURNING karma
            "#,
        )
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .bind(delta)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("karma"))
    }

    async fn get_karma(&self, guild_id: u64, user_id: u64) -> Result<i64> {
        let karma = sqlx::query("SELECT karma FROM karma WHERE guild_id = ? AND user_id = ?")
            .bind(guild_id as i64)
            .bind(user_id as i64)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row.get::<i64, _>("karma"))
            .unwrap_or(0);
        Ok(karma)
    }

    async fn top_karma(&self, guild_id: u64, limit: usize) -> Result<Vec<KarmaEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, karma FROM karma
            WHERE guild_id = ? AND karma != 0
            ORDER BY karma DESC
            LIMIT ?
            "#,
        )
        .bind(guild_id as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| KarmaEntry {
                user_id: row.get::<i64, _>("user_id") as u64,
                karma: row.get("karma"),
            })
            .collect())
    }
}
