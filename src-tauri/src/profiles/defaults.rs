use std::collections::BTreeMap;

use super::{AgentProfile, ToolServerSpec};

pub const BUILTIN_PROFILE_NAME: &str = "hacker-news-agent";

const HACKER_NEWS_PROMPT: &str = include_str!("hacker_news_prompt.md");

pub fn builtin_profiles() -> BTreeMap<String, AgentProfile> {
    let mut profiles = BTreeMap::new();
    profiles.insert(BUILTIN_PROFILE_NAME.to_string(), hacker_news_profile());
    profiles
}

fn hacker_news_profile() -> AgentProfile {
    AgentProfile {
        system_prompt: HACKER_NEWS_PROMPT.to_string(),
        mcp_servers: vec![
            ToolServerSpec {
                name: "ACI MCP Server".to_string(),
                command: "bash".to_string(),
                args: vec![
                    "-c".to_string(),
                    "ACI_API_KEY=$ACI_API_KEY uvx aci-mcp@latest apps-server --apps HACKERNEWS --linked-account-owner-id user"
                        .to_string(),
                ],
            },
            ToolServerSpec {
                name: "Playwright MCP Server".to_string(),
                command: "npx".to_string(),
                args: vec!["@playwright/mcp@latest".to_string()],
            },
        ],
    }
}
