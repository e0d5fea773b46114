use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;

const DEV_MODE_ENV: &str = "VOICEDECK_DEV_MODE";
const AGENT_DIR_ENV: &str = "VOICEDECK_AGENT_DIR";
const AGENT_EXECUTABLE_ENV: &str = "VOICEDECK_AGENT_EXECUTABLE";
const ENV_FILE_ENV: &str = "VOICEDECK_ENV_FILE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeFlags {
    pub dev_mode: bool,
    pub agent_dir: PathBuf,
    pub env_file: PathBuf,
    pub agent_executable: Option<PathBuf>,
}

impl RuntimeFlags {
    pub fn from_env(workspace_root: &Path) -> Self {
        Self::from_source(workspace_root, |key| std::env::var(key).ok())
    }

    pub fn from_source(workspace_root: &Path, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let dev_mode = lookup(DEV_MODE_ENV)
            .map(|value| parse_bool(&value))
            .unwrap_or(cfg!(debug_assertions));
        let agent_dir = lookup_path(&lookup, AGENT_DIR_ENV)
            .unwrap_or_else(|| workspace_root.join("agent"));
        let env_file = lookup_path(&lookup, ENV_FILE_ENV).unwrap_or_else(|| agent_dir.join(".env"));
        let agent_executable = lookup_path(&lookup, AGENT_EXECUTABLE_ENV);

        Self {
            dev_mode,
            agent_dir,
            env_file,
            agent_executable,
        }
    }

    /// `--dev` on the command line forces development mode, as packaged builds
    /// are otherwise indistinguishable from a release run.
    pub fn with_cli_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if args.into_iter().any(|arg| arg.as_ref() == "--dev") {
            self.dev_mode = true;
        }
        self
    }
}

/// Loads `.env` then `.env.local` from the workspace root into the process
/// environment. Variables already set win. Returns the files that were read.
pub fn load_env_files(workspace_root: &Path) -> Vec<PathBuf> {
    let mut loaded = Vec::new();
    for name in [".env", ".env.local"] {
        let path = workspace_root.join(name);
        match dotenvy::from_path(&path) {
            Ok(()) => {
                info!("loaded environment from {}", path.display());
                loaded.push(path);
            }
            Err(error) if error.not_found() => {
                debug!("no environment file at {}", path.display());
            }
            Err(error) => warn!("skipping environment file {}: {error}", path.display()),
        }
    }
    loaded
}

fn lookup_path(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<PathBuf> {
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
