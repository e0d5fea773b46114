pub mod defaults;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Profiles with this name can be edited but never deleted.
pub const PROTECTED_PROFILE_NAME: &str = "default";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolServerSpec {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProfile {
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub mcp_servers: Vec<ToolServerSpec>,
}

/// Per-launch values that take precedence over the stored top-level fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchOverride {
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub mcp_servers: Option<Vec<ToolServerSpec>>,
}

impl LaunchOverride {
    pub fn for_profile(name: &str, profile: &AgentProfile) -> Self {
        Self {
            profile: Some(name.to_string()),
            system_prompt: Some(profile.system_prompt.clone()),
            mcp_servers: Some(profile.mcp_servers.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("Tool arguments must be a JSON list of strings: {0}")]
    MalformedInput(String),
    #[error("Please enter an agent name")]
    EmptyName,
    #[error("Cannot delete the '{0}' agent")]
    Protected(String),
    #[error("Agent '{0}' does not exist")]
    NotFound(String),
}

pub fn parse_tool_args(raw: &str) -> Result<Vec<String>, ProfileError> {
    serde_json::from_str::<Vec<String>>(raw.trim())
        .map_err(|error| ProfileError::MalformedInput(error.to_string()))
}

/// Inserts `profile` under `name`. When `original_name` differs, the old key is
/// removed so a rename never leaves a stale entry behind.
pub fn save_profile(
    profiles: &BTreeMap<String, AgentProfile>,
    original_name: Option<&str>,
    name: &str,
    profile: AgentProfile,
) -> Result<BTreeMap<String, AgentProfile>, ProfileError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ProfileError::EmptyName);
    }

    let mut next = profiles.clone();
    if let Some(original) = original_name.filter(|original| *original != name) {
        next.remove(original);
    }
    next.insert(name.to_string(), profile);
    Ok(next)
}

pub fn delete_profile(
    profiles: &BTreeMap<String, AgentProfile>,
    name: &str,
) -> Result<BTreeMap<String, AgentProfile>, ProfileError> {
    if name == PROTECTED_PROFILE_NAME {
        return Err(ProfileError::Protected(name.to_string()));
    }
    if !profiles.contains_key(name) {
        return Err(ProfileError::NotFound(name.to_string()));
    }

    let mut next = profiles.clone();
    next.remove(name);
    Ok(next)
}

pub fn launch_override_for(
    profiles: &BTreeMap<String, AgentProfile>,
    name: &str,
) -> Result<LaunchOverride, ProfileError> {
    profiles
        .get(name)
        .map(|profile| LaunchOverride::for_profile(name, profile))
        .ok_or_else(|| ProfileError::NotFound(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(prompt: &str) -> AgentProfile {
        AgentProfile {
            system_prompt: prompt.to_string(),
            mcp_servers: vec![ToolServerSpec {
                name: "files".to_string(),
                command: "npx".to_string(),
                args: vec!["@modelcontextprotocol/server-filesystem".to_string()],
            }],
        }
    }

    fn sample_profiles() -> BTreeMap<String, AgentProfile> {
        let mut profiles = BTreeMap::new();
        profiles.insert(PROTECTED_PROFILE_NAME.to_string(), profile("base"));
        profiles.insert("news".to_string(), profile("news"));
        profiles.insert("weather".to_string(), profile("weather"));
        profiles
    }

    #[test]
    fn parses_json_string_lists() {
        let args = parse_tool_args(r#" ["-c", "echo hi"] "#).expect("args should parse");
        assert_eq!(args, vec!["-c".to_string(), "echo hi".to_string()]);
    }

    #[test]
    fn rejects_anything_but_a_string_list() {
        for raw in ["[\"unterminated", "{\"a\": 1}", "[1, 2]", "", "--port 8080"] {
            let error = parse_tool_args(raw).expect_err("malformed args must be rejected");
            assert!(matches!(error, ProfileError::MalformedInput(_)));
        }
    }

    #[test]
    fn deleting_default_is_rejected() {
        let profiles = sample_profiles();
        let error = delete_profile(&profiles, PROTECTED_PROFILE_NAME)
            .expect_err("default must be protected");
        assert_eq!(error, ProfileError::Protected("default".to_string()));
    }

    #[test]
    fn deleting_a_profile_removes_only_that_key() {
        let profiles = sample_profiles();
        let next = delete_profile(&profiles, "news").expect("news should be deleted");

        assert!(!next.contains_key("news"));
        assert_eq!(next.len(), profiles.len() - 1);
        assert_eq!(next.get("default"), profiles.get("default"));
        assert_eq!(next.get("weather"), profiles.get("weather"));
    }

    #[test]
    fn deleting_unknown_profile_fails() {
        let error = delete_profile(&sample_profiles(), "ghost").expect_err("ghost is unknown");
        assert_eq!(error, ProfileError::NotFound("ghost".to_string()));
    }

    #[test]
    fn renaming_moves_the_profile_to_the_new_key() {
        let created = save_profile(&sample_profiles(), None, "scout", profile("draft"))
            .expect("profile should be created");
        let edited = profile("final");
        let renamed = save_profile(&created, Some("scout"), "ranger", edited.clone())
            .expect("profile should be renamed");

        assert!(!renamed.contains_key("scout"));
        assert_eq!(renamed.get("ranger"), Some(&edited));
        assert_eq!(renamed.len(), created.len());
    }

    #[test]
    fn saving_requires_a_name() {
        let error = save_profile(&sample_profiles(), None, "   ", profile("x"))
            .expect_err("blank names are rejected");
        assert_eq!(error, ProfileError::EmptyName);
    }

    #[test]
    fn launch_override_copies_stored_profile() {
        let profiles = sample_profiles();
        let launch = launch_override_for(&profiles, "weather").expect("weather should resolve");

        assert_eq!(launch.profile.as_deref(), Some("weather"));
        assert_eq!(launch.system_prompt.as_deref(), Some("weather"));
        assert_eq!(launch.mcp_servers.map(|servers| servers.len()), Some(1));
        assert!(launch_override_for(&profiles, "ghost").is_err());
    }
}
