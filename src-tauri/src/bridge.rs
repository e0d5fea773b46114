use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};

use crate::config::{PartialConfig, RootConfig, Secrets};
use crate::env_secrets;
use crate::profile_store::ProfileStore;
use crate::profiles::{self, AgentProfile, LaunchOverride};
use crate::runtime_config::RuntimeFlags;
use crate::supervisor::{AgentSupervisor, SupervisorError, SupervisorStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentControlResult {
    pub success: bool,
    pub message: String,
}

impl AgentControlResult {
    fn from_outcome(outcome: Result<(), SupervisorError>, success_message: &str) -> Self {
        match outcome {
            Ok(()) => Self {
                success: true,
                message: success_message.to_string(),
            },
            Err(error) => Self {
                success: false,
                message: error.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvSecretsResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets: Option<Secrets>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveProfileInput {
    pub original_name: Option<String>,
    pub name: String,
    pub profile: AgentProfile,
}

/// The operations the presentation layer may call. Each one is a thin,
/// shape-checked pass-through to the store or the supervisor.
pub struct ConfigBridge {
    store: Arc<ProfileStore>,
    supervisor: Arc<AgentSupervisor>,
    flags: RuntimeFlags,
}

impl ConfigBridge {
    pub fn new(
        store: Arc<ProfileStore>,
        supervisor: Arc<AgentSupervisor>,
        flags: RuntimeFlags,
    ) -> Self {
        Self {
            store,
            supervisor,
            flags,
        }
    }

    pub async fn read_config(&self) -> Result<RootConfig, String> {
        self.store.get().await.map_err(|error| error.to_string())
    }

    pub async fn write_config(&self, partial: PartialConfig) -> Result<RootConfig, String> {
        self.store
            .merge(partial)
            .await
            .map_err(|error| error.to_string())
    }

    pub async fn request_start(&self, launch: Option<LaunchOverride>) -> AgentControlResult {
        let outcome = self.supervisor.start(launch).await.map(|run_id| {
            info!("agent run {run_id} requested from the UI");
        });
        AgentControlResult::from_outcome(outcome, "Agent started")
    }

    pub fn request_stop(&self) -> AgentControlResult {
        AgentControlResult::from_outcome(self.supervisor.stop(), "Agent stopped")
    }

    /// Starts the stored profile `name`, recording it as the current profile.
    pub async fn run_profile(&self, name: &str) -> AgentControlResult {
        let config = match self.store.get().await {
            Ok(config) => config,
            Err(error) => {
                return AgentControlResult {
                    success: false,
                    message: error.to_string(),
                }
            }
        };
        match profiles::launch_override_for(&config.agent_profiles, name) {
            Ok(launch) => self.request_start(Some(launch)).await,
            Err(error) => AgentControlResult {
                success: false,
                message: error.to_string(),
            },
        }
    }

    pub fn agent_status(&self) -> SupervisorStatus {
        self.supervisor.status()
    }

    pub async fn save_profile(&self, input: SaveProfileInput) -> Result<RootConfig, String> {
        let config = self.read_config().await?;
        let next = profiles::save_profile(
            &config.agent_profiles,
            input.original_name.as_deref(),
            &input.name,
            input.profile,
        )
        .map_err(|error| error.to_string())?;

        self.write_config(PartialConfig {
            agent_profiles: Some(next),
            ..PartialConfig::default()
        })
        .await
    }

    pub async fn delete_profile(&self, name: &str) -> Result<RootConfig, String> {
        let config = self.read_config().await?;
        let next = profiles::delete_profile(&config.agent_profiles, name)
            .map_err(|error| error.to_string())?;

        self.write_config(PartialConfig {
            agent_profiles: Some(next),
            ..PartialConfig::default()
        })
        .await
    }

    pub fn parse_tool_args(&self, raw: &str) -> Result<Vec<String>, String> {
        profiles::parse_tool_args(raw).map_err(|error| error.to_string())
    }

    pub fn load_env_secrets(&self) -> EnvSecretsResult {
        match env_secrets::load_env_secrets(&self.flags) {
            Ok(secrets) => EnvSecretsResult {
                success: true,
                message: None,
                secrets: Some(secrets),
            },
            Err(error) => EnvSecretsResult {
                success: false,
                message: Some(error.to_string()),
                secrets: None,
            },
        }
    }

    pub fn runtime_flags(&self) -> RuntimeFlags {
        self.flags.clone()
    }

    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await;
    }
}
