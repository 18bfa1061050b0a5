use crate::core::graduation::{GraduationStore, GuildConfig, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::RwLock;

/// Graduation settings for every guild, kept in one JSON file:
/// { guild_id: GuildConfig }
pub struct JsonGraduationStore {
    path: PathBuf,
    cache: RwLock<HashMap<u64, GuildConfig>>,
}

impl JsonGraduationStore {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let map = if path.exists() {
            let file = std::fs::File::open(&path)?;
            serde_json::from_reader(std::io::BufReader::new(file))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            cache: RwLock::new(map),
        })
    }

    /// Write the whole map next to the real file, then swap it in. Callers
    /// hold the write lock so two saves never interleave.
    fn persist(&self, cache: &HashMap<u64, GuildConfig>) -> Result<(), StoreError> {
        let tmp_path = self.path.with_extension("json.tmp");
        let file = std::fs::File::create(&tmp_path)?;
        let mut writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, cache)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl GraduationStore for JsonGraduationStore {
    async fn get_config(&self, guild_id: u64) -> Result<GuildConfig, StoreError> {
        let cache = self.cache.read().await;
        Ok(cache.get(&guild_id).cloned().unwrap_or_default())
    }

    async fn save_config(&self, guild_id: u64, config: GuildConfig) -> Result<(), StoreError> {
        let mut cache = self.cache.write().await;
        cache.insert(guild_id, config);
        self.persist(&cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graduation::RegisteredRole;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_json_persistence_roundtrip() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_owned();
        drop(tmp);

        let store = JsonGraduationStore::load(path.clone()).unwrap();
        let mut config = store.get_config(7).await.unwrap();
        config.enabled = true;
        config.head_id = Some(1);
        config.registry = vec![
            RegisteredRole {
                role_id: 1,
                next_ids: vec![2, 3],
                exclusive: true,
            },
            RegisteredRole::new(2, true),
            RegisteredRole::new(3, false),
        ];
        store.save_config(7, config.clone()).await.unwrap();

        // Reload from file
        let store2 = JsonGraduationStore::load(path.clone()).unwrap();
        assert_eq!(store2.get_config(7).await.unwrap(), config);
        assert_eq!(store2.get_config(8).await.unwrap(), GuildConfig::default());
    }

    #[tokio::test]
    async fn test_concurrent_saves_all_reach_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graduation.json");
        let store = std::sync::Arc::new(JsonGraduationStore::load(path.clone()).unwrap());

        let handles: Vec<_> = (1..=20u64)
            .map(|guild_id| {
                let store = store.clone();
                tokio::spawn(async move {
                    let config = GuildConfig {
                        head_id: Some(guild_id),
                        ..GuildConfig::default()
                    };
                    store.save_config(guild_id, config).await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let reloaded = JsonGraduationStore::load(path.clone()).unwrap();
        for guild_id in 1..=20u64 {
            assert_eq!(
                reloaded.get_config(guild_id).await.unwrap().head_id,
                Some(guild_id)
            );
        }
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let map: HashMap<u64, GuildConfig> =
            serde_json::from_str(r#"{"5": {"registry": [{"role_id": 9}]}}"#).unwrap();
        let config = &map[&5];
        assert!(!config.enabled);
        assert_eq!(config.registry, vec![RegisteredRole::new(9, false)]);
        assert_eq!(config.responses, GuildConfig::default().responses);
    }
}
