use tauri::State;

use crate::bridge::{AgentControlResult, EnvSecretsResult, SaveProfileInput};
use crate::config::{PartialConfig, RootConfig};
use crate::profiles::LaunchOverride;
use crate::runtime_config::RuntimeFlags;
use crate::supervisor::SupervisorStatus;
use crate::AppState;

#[tauri::command]
pub async fn read_config(state: State<'_, AppState>) -> Result<RootConfig, String> {
    state.bridge.read_config().await
}

#[tauri::command]
pub async fn write_config(
    state: State<'_, AppState>,
    partial: PartialConfig,
) -> Result<RootConfig, String> {
    state.bridge.write_config(partial).await
}

#[tauri::command]
pub async fn request_start(
    state: State<'_, AppState>,
    launch: Option<LaunchOverride>,
) -> Result<AgentControlResult, String> {
    Ok(state.bridge.request_start(launch).await)
}

#[tauri::command]
pub fn request_stop(state: State<'_, AppState>) -> Result<AgentControlResult, String> {
    Ok(state.bridge.request_stop())
}

#[tauri::command]
pub async fn run_profile(
    state: State<'_, AppState>,
    name: String,
) -> Result<AgentControlResult, String> {
    Ok(state.bridge.run_profile(&name).await)
}

#[tauri::command]
pub fn agent_status(state: State<'_, AppState>) -> Result<SupervisorStatus, String> {
    Ok(state.bridge.agent_status())
}

#[tauri::command]
pub async fn save_profile(
    state: State<'_, AppState>,
    input: SaveProfileInput,
) -> Result<RootConfig, String> {
    state.bridge.save_profile(input).await
}

#[tauri::command]
pub async fn delete_profile(
    state: State<'_, AppState>,
    name: String,
) -> Result<RootConfig, String> {
    state.bridge.delete_profile(&name).await
}

#[tauri::command]
pub fn parse_tool_args(state: State<'_, AppState>, raw: String) -> Result<Vec<String>, String> {
    state.bridge.parse_tool_args(&raw)
}

#[tauri::command]
pub fn load_env_secrets(state: State<'_, AppState>) -> Result<EnvSecretsResult, String> {
    Ok(state.bridge.load_env_secrets())
}

#[tauri::command]
pub fn get_runtime_flags(state: State<'_, AppState>) -> Result<RuntimeFlags, String> {
    Ok(state.bridge.runtime_flags())
}
