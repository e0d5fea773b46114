use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::runtime_config::RuntimeFlags;

pub const CONSOLE_ARG: &str = "console";
pub const DISABLE_STDIN_ENV: &str = "LIVEKIT_CONSOLE_DISABLE_STDIN";
const DEV_AGENT_MODULE: &str = "src.ctsm.electron_main";

#[cfg(windows)]
const PACKAGED_AGENT_NAME: &str = "ctsm-agent.exe";
#[cfg(not(windows))]
const PACKAGED_AGENT_NAME: &str = "ctsm-agent";

/// Where the agent executable comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchMode {
    /// Run the agent project from source through `uv`.
    Development { agent_dir: PathBuf, env_file: PathBuf },
    /// Run the bundled binary shipped in the app resources.
    Packaged { resource_dir: PathBuf },
    /// Run an explicit program; `leading_args` precede the console arguments.
    Executable {
        program: PathBuf,
        leading_args: Vec<String>,
    },
}

impl LaunchMode {
    pub fn resolve(flags: &RuntimeFlags, resource_dir: &Path) -> Self {
        if let Some(program) = &flags.agent_executable {
            return LaunchMode::Executable {
                program: program.clone(),
                leading_args: Vec::new(),
            };
        }
        if flags.dev_mode {
            LaunchMode::Development {
                agent_dir: flags.agent_dir.clone(),
                env_file: flags.env_file.clone(),
            }
        } else {
            LaunchMode::Packaged {
                resource_dir: resource_dir.to_path_buf(),
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LaunchMode::Development { .. } => "development",
            LaunchMode::Packaged { .. } => "packaged",
            LaunchMode::Executable { .. } => "executable",
        }
    }

    pub fn spec_for(&self, serialized_config: &str) -> LaunchSpec {
        let mut env = vec![(DISABLE_STDIN_ENV.to_string(), "1".to_string())];
        let trailing = [CONSOLE_ARG.to_string(), serialized_config.to_string()];

        match self {
            LaunchMode::Development {
                agent_dir,
                env_file,
            } => {
                let mut args = vec!["run".to_string()];
                if env_file.is_file() {
                    args.push("--env-file".to_string());
                    args.push(env_file.to_string_lossy().to_string());
                }
                args.push("-m".to_string());
                args.push(DEV_AGENT_MODULE.to_string());
                args.extend(trailing);
                env.push((
                    "PYTHONPATH".to_string(),
                    agent_dir.join("src").to_string_lossy().to_string(),
                ));

                LaunchSpec {
                    program: PathBuf::from("uv"),
                    args,
                    cwd: Some(agent_dir.clone()),
                    env,
                }
            }
            LaunchMode::Packaged { resource_dir } => LaunchSpec {
                program: resource_dir.join("python").join(PACKAGED_AGENT_NAME),
                args: trailing.to_vec(),
                cwd: None,
                env,
            },
            LaunchMode::Executable {
                program,
                leading_args,
            } => LaunchSpec {
                program: program.clone(),
                args: leading_args.iter().cloned().chain(trailing).collect(),
                cwd: None,
                env,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl LaunchSpec {
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.env.iter().map(|(key, value)| (key.as_str(), value.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        command
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    fn flags(dev_mode: bool, agent_executable: Option<&str>) -> RuntimeFlags {
        RuntimeFlags {
            dev_mode,
            agent_dir: PathBuf::from("/work/agent"),
            env_file: PathBuf::from("/work/agent/.env"),
            agent_executable: agent_executable.map(PathBuf::from),
        }
    }

    #[test]
    fn resolves_mode_from_flags() {
        let resources = Path::new("/app/resources");

        assert_eq!(
            LaunchMode::resolve(&flags(true, None), resources),
            LaunchMode::Development {
                agent_dir: PathBuf::from("/work/agent"),
                env_file: PathBuf::from("/work/agent/.env"),
            }
        );
        assert_eq!(
            LaunchMode::resolve(&flags(false, None), resources),
            LaunchMode::Packaged {
                resource_dir: PathBuf::from("/app/resources")
            }
        );
        assert_eq!(
            LaunchMode::resolve(&flags(true, Some("/bin/agent")), resources).label(),
            "executable"
        );
    }

    #[test]
    fn packaged_spec_passes_console_and_config_last() {
        let mode = LaunchMode::Packaged {
            resource_dir: PathBuf::from("/app/resources"),
        };
        let spec = mode.spec_for("{\"a\":1}");

        assert_eq!(
            spec.program,
            PathBuf::from("/app/resources/python").join(PACKAGED_AGENT_NAME)
        );
        assert_eq!(spec.args, vec!["console".to_string(), "{\"a\":1}".to_string()]);
        assert!(spec
            .env
            .contains(&(DISABLE_STDIN_ENV.to_string(), "1".to_string())));
    }

    #[test]
    fn development_spec_runs_module_through_uv() {
        let temp = tempdir().expect("temp dir should be created");
        let agent_dir = temp.path().to_path_buf();
        let env_file = agent_dir.join(".env");
        fs::write(&env_file, "OPENAI_API_KEY=sk-test\n").expect("env file should be written");

        let spec = LaunchMode::Development {
            agent_dir: agent_dir.clone(),
            env_file: env_file.clone(),
        }
        .spec_for("{}");

        let env_arg = env_file.to_string_lossy().to_string();
        assert_eq!(spec.program, PathBuf::from("uv"));
        assert_eq!(
            spec.args,
            vec!["run", "--env-file", env_arg.as_str(), "-m", DEV_AGENT_MODULE, "console", "{}"]
        );
        assert_eq!(spec.cwd, Some(agent_dir.clone()));
        assert!(spec.env.iter().any(|(key, value)| {
            key == "PYTHONPATH" && value == &agent_dir.join("src").to_string_lossy()
        }));
    }

    #[test]
    fn development_spec_uses_the_configured_env_file() {
        let agent = tempdir().expect("temp dir should be created");
        let secrets = tempdir().expect("temp dir should be created");
        fs::write(agent.path().join(".env"), "OPENAI_API_KEY=stale\n")
            .expect("env file should be written");
        let env_file = secrets.path().join("voice.env");
        fs::write(&env_file, "OPENAI_API_KEY=fresh\n").expect("env file should be written");

        let flags = RuntimeFlags {
            dev_mode: true,
            agent_dir: agent.path().to_path_buf(),
            env_file: env_file.clone(),
            agent_executable: None,
        };
        let spec = LaunchMode::resolve(&flags, Path::new("/app/resources")).spec_for("{}");

        let position = spec
            .args
            .iter()
            .position(|arg| arg == "--env-file")
            .expect("env file should be passed");
        assert_eq!(spec.args[position + 1], env_file.to_string_lossy());
    }

    #[test]
    fn development_spec_skips_missing_env_file() {
        let temp = tempdir().expect("temp dir should be created");
        let spec = LaunchMode::Development {
            agent_dir: temp.path().to_path_buf(),
            env_file: temp.path().join(".env"),
        }
        .spec_for("{}");

        assert!(!spec.args.iter().any(|arg| arg == "--env-file"));
    }

    #[test]
    fn executable_spec_keeps_leading_args_first() {
        let spec = LaunchMode::Executable {
            program: PathBuf::from("/bin/sh"),
            leading_args: vec!["-c".to_string(), "exit 0".to_string()],
        }
        .spec_for("{}");

        assert_eq!(spec.args, vec!["-c", "exit 0", "console", "{}"]);
    }
}
