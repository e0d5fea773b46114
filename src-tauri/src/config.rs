use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::profiles::{defaults, AgentProfile, LaunchOverride, ToolServerSpec};

pub const SECRETS_KEY: &str = "secrets";
pub const USER_CONTEXT_KEY: &str = "userContext";
pub const AGENT_PROFILES_KEY: &str = "agentProfiles";
pub const CURRENT_AGENT_PROFILE_KEY: &str = "currentAgentProfile";
pub const SYSTEM_PROMPT_KEY: &str = "systemPrompt";
pub const MCP_SERVERS_KEY: &str = "mcpServers";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Secrets {
    pub openai_api_key: String,
    pub deepgram_api_key: String,
    pub cartesia_api_key: String,
    pub aci_api_key: String,
}

impl Secrets {
    pub fn configured_count(&self) -> usize {
        [
            &self.openai_api_key,
            &self.deepgram_api_key,
            &self.cartesia_api_key,
            &self.aci_api_key,
        ]
        .iter()
        .filter(|value| !value.trim().is_empty())
        .count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserContext {
    pub name: String,
    pub preferences: String,
    pub additional_info: String,
}

/// The single persisted aggregate. `system_prompt` and `mcp_servers` mirror the
/// profile most recently launched and are what the agent process reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootConfig {
    #[serde(default)]
    pub secrets: Secrets,
    #[serde(default)]
    pub user_context: UserContext,
    #[serde(default)]
    pub agent_profiles: BTreeMap<String, AgentProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_agent_profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_servers: Option<Vec<ToolServerSpec>>,
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            secrets: Secrets::default(),
            user_context: UserContext::default(),
            agent_profiles: defaults::builtin_profiles(),
            current_agent_profile: None,
            system_prompt: None,
            mcp_servers: None,
        }
    }
}

/// A shallow update: every present key replaces the stored key wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PartialConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<Secrets>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_context: Option<UserContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_profiles: Option<BTreeMap<String, AgentProfile>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_agent_profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_servers: Option<Vec<ToolServerSpec>>,
}

impl PartialConfig {
    pub fn is_empty(&self) -> bool {
        self == &PartialConfig::default()
    }

    /// Top-level keys present in this update paired with their JSON values.
    pub fn entries(&self) -> Result<Vec<(&'static str, Value)>, serde_json::Error> {
        let mut entries = Vec::new();
        if let Some(value) = &self.secrets {
            entries.push((SECRETS_KEY, serde_json::to_value(value)?));
        }
        if let Some(value) = &self.user_context {
            entries.push((USER_CONTEXT_KEY, serde_json::to_value(value)?));
        }
        if let Some(value) = &self.agent_profiles {
            entries.push((AGENT_PROFILES_KEY, serde_json::to_value(value)?));
        }
        if let Some(value) = &self.current_agent_profile {
            entries.push((CURRENT_AGENT_PROFILE_KEY, serde_json::to_value(value)?));
        }
        if let Some(value) = &self.system_prompt {
            entries.push((SYSTEM_PROMPT_KEY, serde_json::to_value(value)?));
        }
        if let Some(value) = &self.mcp_servers {
            entries.push((MCP_SERVERS_KEY, serde_json::to_value(value)?));
        }
        Ok(entries)
    }
}

impl RootConfig {
    pub fn apply(&mut self, partial: PartialConfig) {
        if let Some(value) = partial.secrets {
            self.secrets = value;
        }
        if let Some(value) = partial.user_context {
            self.user_context = value;
        }
        if let Some(value) = partial.agent_profiles {
            self.agent_profiles = value;
        }
        if let Some(value) = partial.current_agent_profile {
            self.current_agent_profile = Some(value);
        }
        if let Some(value) = partial.system_prompt {
            self.system_prompt = Some(value);
        }
        if let Some(value) = partial.mcp_servers {
            self.mcp_servers = Some(value);
        }
    }

    pub fn merged(&self, partial: PartialConfig) -> Self {
        let mut next = self.clone();
        next.apply(partial);
        next
    }

    /// Restores one stored top-level key. Unknown keys are reported as `Ok(false)`.
    pub fn restore_entry(&mut self, key: &str, value: Value) -> Result<bool, serde_json::Error> {
        match key {
            SECRETS_KEY => self.secrets = serde_json::from_value(value)?,
            USER_CONTEXT_KEY => self.user_context = serde_json::from_value(value)?,
            AGENT_PROFILES_KEY => self.agent_profiles = serde_json::from_value(value)?,
            CURRENT_AGENT_PROFILE_KEY => {
                self.current_agent_profile = serde_json::from_value(value)?
            }
            SYSTEM_PROMPT_KEY => self.system_prompt = serde_json::from_value(value)?,
            MCP_SERVERS_KEY => self.mcp_servers = serde_json::from_value(value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// The profile named by `current_agent_profile`, else the first stored profile.
    pub fn active_profile(&self) -> Option<(&str, &AgentProfile)> {
        if let Some(name) = self.current_agent_profile.as_deref() {
            if let Some((key, profile)) = self.agent_profiles.get_key_value(name) {
                return Some((key.as_str(), profile));
            }
        }
        self.agent_profiles
            .iter()
            .next()
            .map(|(name, profile)| (name.as_str(), profile))
    }

    /// The configuration handed to the agent process. Each of `systemPrompt` and
    /// `mcpServers` comes from the override, then the stored top-level field, then
    /// the active profile.
    pub fn resolve_for_launch(&self, launch: Option<&LaunchOverride>) -> RootConfig {
        let mut resolved = self.clone();
        if let Some(profile) = launch.and_then(|launch| launch.profile.clone()) {
            resolved.current_agent_profile = Some(profile);
        }
        let active = resolved
            .active_profile()
            .map(|(name, profile)| (name.to_string(), profile.clone()));

        resolved.system_prompt = launch
            .and_then(|launch| launch.system_prompt.clone())
            .or_else(|| self.system_prompt.clone())
            .or_else(|| active.as_ref().map(|(_, profile)| profile.system_prompt.clone()));
        resolved.mcp_servers = launch
            .and_then(|launch| launch.mcp_servers.clone())
            .or_else(|| self.mcp_servers.clone())
            .or_else(|| active.as_ref().map(|(_, profile)| profile.mcp_servers.clone()));
        if resolved.current_agent_profile.is_none() {
            resolved.current_agent_profile = active.map(|(name, _)| name);
        }
        resolved
    }

    /// Every key of the aggregate as a full update, used to seed first-run storage.
    pub fn as_partial(&self) -> PartialConfig {
        PartialConfig {
            secrets: Some(self.secrets.clone()),
            user_context: Some(self.user_context.clone()),
            agent_profiles: Some(self.agent_profiles.clone()),
            current_agent_profile: self.current_agent_profile.clone(),
            system_prompt: self.system_prompt.clone(),
            mcp_servers: self.mcp_servers.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn partial_update_replaces_keys_wholesale() {
        let mut config = RootConfig::default();
        config.user_context = UserContext {
            name: "Ada".to_string(),
            preferences: "short answers".to_string(),
            additional_info: "lives in Lisbon".to_string(),
        };

        let partial: PartialConfig =
            serde_json::from_value(json!({ "userContext": { "name": "Grace" } }))
                .expect("partial should parse");
        config.apply(partial);

        assert_eq!(config.user_context.name, "Grace");
        assert_eq!(config.user_context.preferences, "");
        assert_eq!(config.user_context.additional_info, "");
        assert_eq!(config.agent_profiles, defaults::builtin_profiles());
    }

    #[test]
    fn partial_rejects_unknown_top_level_keys() {
        let result = serde_json::from_value::<PartialConfig>(json!({ "systemPromt": "typo" }));
        assert!(result.is_err());
    }

    #[test]
    fn entries_only_include_present_keys() {
        let partial = PartialConfig {
            system_prompt: Some("Be brief".to_string()),
            ..PartialConfig::default()
        };

        let entries = partial.entries().expect("entries should serialize");
        assert_eq!(entries, vec![(SYSTEM_PROMPT_KEY, json!("Be brief"))]);
        assert!(PartialConfig::default().is_empty());
    }

    #[test]
    fn root_config_serializes_with_camel_case_keys() {
        let value = serde_json::to_value(RootConfig::default()).expect("config should serialize");
        assert!(value.get("agentProfiles").is_some());
        assert!(value["secrets"].get("openaiApiKey").is_some());
        assert!(value["userContext"].get("additionalInfo").is_some());
        assert!(value.get("systemPrompt").is_none());
    }

    #[test]
    fn launch_resolution_prefers_override_then_top_level_then_profile() {
        let config = RootConfig::default();
        let resolved = config.resolve_for_launch(None);
        let builtin = &config.agent_profiles[defaults::BUILTIN_PROFILE_NAME];
        assert_eq!(resolved.mcp_servers.as_ref(), Some(&builtin.mcp_servers));
        assert_eq!(resolved.system_prompt.as_ref(), Some(&builtin.system_prompt));
        assert_eq!(
            resolved.current_agent_profile.as_deref(),
            Some(defaults::BUILTIN_PROFILE_NAME)
        );

        let mut stored = config.clone();
        stored.system_prompt = Some("stored".to_string());
        let resolved = stored.resolve_for_launch(None);
        assert_eq!(resolved.system_prompt.as_deref(), Some("stored"));
        assert_eq!(resolved.mcp_servers.as_ref(), Some(&builtin.mcp_servers));

        let launch = LaunchOverride {
            profile: None,
            system_prompt: Some("override".to_string()),
            mcp_servers: Some(Vec::new()),
        };
        let resolved = stored.resolve_for_launch(Some(&launch));
        assert_eq!(resolved.system_prompt.as_deref(), Some("override"));
        assert_eq!(resolved.mcp_servers, Some(Vec::new()));
    }

    #[test]
    fn restore_entry_ignores_unknown_keys() {
        let mut config = RootConfig::default();
        let known = config
            .restore_entry("legacyTheme", json!("dark"))
            .expect("unknown key should not fail");
        assert!(!known);

        let restored = config
            .restore_entry(SYSTEM_PROMPT_KEY, json!("Hello"))
            .expect("known key should restore");
        assert!(restored);
        assert_eq!(config.system_prompt.as_deref(), Some("Hello"));
    }
}
