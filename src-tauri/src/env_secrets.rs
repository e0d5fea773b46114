use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::Secrets;
use crate::runtime_config::RuntimeFlags;

#[derive(Debug, Error)]
pub enum EnvSecretsError {
    #[error("Environment file only available in development mode")]
    DevelopmentOnly,
    #[error(".env file not found at {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to read .env file: {0}")]
    Read(String),
}

/// Reads API keys from the agent's `.env` file. Nothing is persisted here; the
/// caller decides whether to write the values through the store.
pub fn load_env_secrets(flags: &RuntimeFlags) -> Result<Secrets, EnvSecretsError> {
    if !flags.dev_mode {
        return Err(EnvSecretsError::DevelopmentOnly);
    }
    read_secrets_file(&flags.env_file)
}

pub fn read_secrets_file(path: &Path) -> Result<Secrets, EnvSecretsError> {
    if !path.is_file() {
        return Err(EnvSecretsError::NotFound(path.to_path_buf()));
    }

    let entries =
        dotenvy::from_path_iter(path).map_err(|error| EnvSecretsError::Read(error.to_string()))?;
    let mut secrets = Secrets::default();
    for entry in entries {
        let (key, value) = entry.map_err(|error| EnvSecretsError::Read(error.to_string()))?;
        match key.as_str() {
            "OPENAI_API_KEY" => secrets.openai_api_key = value,
            "DEEPGRAM_API_KEY" => secrets.deepgram_api_key = value,
            "CARTESIA_API_KEY" => secrets.cartesia_api_key = value,
            "ACI_API_KEY" => secrets.aci_api_key = value,
            _ => {}
        }
    }
    Ok(secrets)
}
