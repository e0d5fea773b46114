use log::{info, warn};
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::{PartialConfig, RootConfig};
use crate::db::settings;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Persistence(String),
    #[error("Failed to encode settings: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Durable home of the `RootConfig` aggregate. Reads are served from the cached
/// aggregate; the cache is only replaced after a write commits.
pub struct ProfileStore {
    pool: SqlitePool,
    current: Mutex<Option<RootConfig>>,
}

impl ProfileStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            current: Mutex::new(None),
        }
    }

    pub async fn get(&self) -> Result<RootConfig, StoreError> {
        let mut current = self.current.lock().await;
        if let Some(config) = current.as_ref() {
            return Ok(config.clone());
        }

        let config = self.load_or_initialize().await?;
        *current = Some(config.clone());
        Ok(config)
    }

    pub async fn merge(&self, partial: PartialConfig) -> Result<RootConfig, StoreError> {
        let mut current = self.current.lock().await;
        let base = match current.as_ref() {
            Some(config) => config.clone(),
            None => self.load_or_initialize().await?,
        };

        if partial.is_empty() {
            *current = Some(base.clone());
            return Ok(base);
        }

        let encoded = encode_entries(&partial)?;
        let next = base.merged(partial);
        settings::write_settings(&self.pool, &encoded)
            .await
            .map_err(StoreError::Persistence)?;

        *current = Some(next.clone());
        Ok(next)
    }

    async fn load_or_initialize(&self) -> Result<RootConfig, StoreError> {
        let rows = settings::list_settings(&self.pool)
            .await
            .map_err(StoreError::Persistence)?;

        if rows.is_empty() {
            let defaults = RootConfig::default();
            let encoded = encode_entries(&defaults.as_partial())?;
            settings::write_settings(&self.pool, &encoded)
                .await
                .map_err(StoreError::Persistence)?;
            info!(
                "initialized settings with {} built-in agent profile(s)",
                defaults.agent_profiles.len()
            );
            return Ok(defaults);
        }

        let mut config = RootConfig::default();
        for row in rows {
            let value = match serde_json::from_str(&row.value) {
                Ok(value) => value,
                Err(error) => {
                    warn!("setting '{}' is not valid JSON; using default: {error}", row.key);
                    continue;
                }
            };
            match config.restore_entry(&row.key, value) {
                Ok(true) => {}
                Ok(false) => warn!("ignoring unknown setting '{}'", row.key),
                Err(error) => {
                    warn!("setting '{}' has an unexpected shape; using default: {error}", row.key)
                }
            }
        }
        Ok(config)
    }
}

fn encode_entries(partial: &PartialConfig) -> Result<Vec<(&'static str, String)>, StoreError> {
    let mut encoded = Vec::new();
    for (key, value) in partial.entries()? {
        encoded.push((key, serde_json::to_string(&value)?));
    }
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::UserContext;
    use crate::db;
    use crate::profiles::defaults::BUILTIN_PROFILE_NAME;
    use crate::profiles::{AgentProfile, ToolServerSpec};

    #[tokio::test]
    async fn first_read_persists_builtin_defaults() {
        let pool = db::setup_test_pool().await;
        let store = ProfileStore::new(pool.clone());

        let config = store.get().await.expect("defaults should load");
        assert!(config.agent_profiles.contains_key(BUILTIN_PROFILE_NAME));
        assert_eq!(config.secrets.openai_api_key, "");
        assert_eq!(config.user_context, UserContext::default());

        let rows = settings::list_settings(&pool).await.expect("rows should load");
        let keys: Vec<&str> = rows.iter().map(|row| row.key.as_str()).collect();
        assert_eq!(keys, vec!["agentProfiles", "secrets", "userContext"]);
    }

    #[tokio::test]
    async fn merged_keys_read_back_exactly() {
        let pool = db::setup_test_pool().await;
        let store = ProfileStore::new(pool.clone());

        let mut profiles = std::collections::BTreeMap::new();
        profiles.insert(
            "scout".to_string(),
            AgentProfile {
                system_prompt: "Find things".to_string(),
                mcp_servers: vec![ToolServerSpec {
                    name: "search".to_string(),
                    command: "uvx".to_string(),
                    args: vec!["search-mcp".to_string()],
                }],
            },
        );
        let partial = PartialConfig {
            agent_profiles: Some(profiles.clone()),
            current_agent_profile: Some("scout".to_string()),
            ..PartialConfig::default()
        };
        store.merge(partial).await.expect("merge should persist");

        // A fresh store proves the values came from disk rather than the cache.
        let reloaded = ProfileStore::new(pool).get().await.expect("config should reload");
        assert_eq!(reloaded.agent_profiles, profiles);
        assert_eq!(reloaded.current_agent_profile.as_deref(), Some("scout"));
    }

    #[tokio::test]
    async fn independent_keys_survive_sequential_writes() {
        let store = ProfileStore::new(db::setup_test_pool().await);

        let first: PartialConfig =
            serde_json::from_value(json!({ "systemPrompt": "X" })).expect("partial should parse");
        let second: PartialConfig = serde_json::from_value(json!({ "userContext": { "name": "Y" } }))
            .expect("partial should parse");
        store.merge(first).await.expect("first merge should succeed");
        store.merge(second).await.expect("second merge should succeed");

        let config = store.get().await.expect("config should load");
        assert_eq!(config.system_prompt.as_deref(), Some("X"));
        assert_eq!(config.user_context.name, "Y");
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_aggregate() {
        let pool = db::setup_test_pool().await;
        let store = ProfileStore::new(pool.clone());
        let before = store.get().await.expect("defaults should load");

        pool.close().await;
        let result = store
            .merge(PartialConfig {
                system_prompt: Some("lost".to_string()),
                ..PartialConfig::default()
            })
            .await;

        assert!(matches!(result, Err(StoreError::Persistence(_))));
        let after = store.get().await.expect("cached config should still be served");
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn corrupt_rows_fall_back_to_defaults() {
        let pool = db::setup_test_pool().await;
        settings::write_settings(
            &pool,
            &[
                ("secrets", "not json".to_string()),
                ("userContext", "[1, 2, 3]".to_string()),
                ("systemPrompt", "\"kept\"".to_string()),
            ],
        )
        .await
        .expect("rows should be written");

        let config = ProfileStore::new(pool).get().await.expect("config should load");
        assert_eq!(config.secrets.openai_api_key, "");
        assert_eq!(config.user_context, UserContext::default());
        assert_eq!(config.system_prompt.as_deref(), Some("kept"));
        assert!(config.agent_profiles.contains_key(BUILTIN_PROFILE_NAME));
    }
}
