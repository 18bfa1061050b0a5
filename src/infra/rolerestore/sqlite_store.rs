use crate::core::rolerestore::{RoleRestoreStore, SavedRoles};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteRoleRestoreStore {
    pool: Pool<Sqlite>,
}

impl SqliteRoleRestoreStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rolerestore_config (
                guild_id INTEGER PRIMARY KEY,
                enabled BOOLEAN NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        // role_ids is a JSON array of role ids.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS saved_roles (
                guild_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                role_ids TEXT NOT NULL,
                saved_at TEXT NOT NULL,
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
impl RoleRestoreStore for SqliteRoleRestoreStore {
    async fn is_enabled(&self, guild_id: u64) -> Result<bool> {
        let enabled = sqlx::query("SELECT enabled FROM rolerestore_config WHERE guild_id = ?")
            .bind(guild_id as i64)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row.get::<bool, _>("enabled"))
            .unwrap_or(false);
        Ok(enabled)
    }

    async fn set_enabled(&self, guild_id: u64, enabled: bool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rolerestore_config (guild_id, enabled)
            VALUES (?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET enabled = excluded.enabled
            "#,
        )
        .bind(guild_id as i64)
        .bind(enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_roles(&self, saved: SavedRoles) -> Result<()> {
        let role_ids = serde_json::to_string(&saved.role_ids)?;
        sqlx::query(
            r#"
            INSERT INTO saved_roles (guild_id, user_id, role_ids, saved_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(guild_id, user_id) DO UPDATE SET
                role_ids = excluded.role_ids,
                saved_at = excluded.saved_at
            "#,
        )
        .bind(saved.guild_id as i64)
        .bind(saved.user_id as i64)
        .bind(role_ids)
        .bind(saved.saved_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn take_roles(&self, guild_id: u64, user_id: u64) -> Result<Option<SavedRoles>> {
        let row = sqlx::query(
            r#"
            DELETE FROM saved_roles
            WHERE guild_id = ? AND user_id = ?
            RETURNING role_ids, saved_at
            "#,
        )
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let role_ids: Vec<u64> = serde_json::from_str(row.get::<&str, _>("role_ids"))?;
        let saved_at = DateTime::parse_from_rfc3339(row.get::<&str, _>("saved_at"))?
            .with_timezone(&Utc);

        Ok(Some(SavedRoles {
            guild_id,
            user_id,
            role_ids,
            saved_at,
        }))
    }

    async fn count_saved(&self, guild_id: u64) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS saved FROM saved_roles WHERE guild_id = ?")
            .bind(guild_id as i64)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("saved") as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteRoleRestoreStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteRoleRestoreStore::new(pool);
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_enable_toggle() {
        let store = store().await;
        assert!(!store.is_enabled(1).await.unwrap());
        store.set_enabled(1, true).await.unwrap();
        assert!(store.is_enabled(1).await.unwrap());
        store.set_enabled(1, false).await.unwrap();
        assert!(!store.is_enabled(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_take_consumes_saved_roles() {
        let store = store().await;
        let saved_at = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let saved = SavedRoles {
            guild_id: 1,
            user_id: 2,
            role_ids: vec![10, 11],
            saved_at,
        };

        store.save_roles(saved.clone()).await.unwrap();
        assert_eq!(store.count_saved(1).await.unwrap(), 1);

        assert_eq!(store.take_roles(1, 2).await.unwrap(), Some(saved));
        assert_eq!(store.take_roles(1, 2).await.unwrap(), None);
        assert_eq!(store.count_saved(1).await.unwrap(), 0);
    }
}
