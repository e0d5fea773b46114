pub mod decoder;
pub mod events;
pub mod launcher;

use std::process::ExitStatus;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::{PartialConfig, RootConfig};
use crate::profile_store::{ProfileStore, StoreError};
use crate::profiles::LaunchOverride;

use decoder::Utf8ChunkDecoder;
use events::{AgentEvent, StreamKind};
use launcher::LaunchMode;

const READ_CHUNK_BYTES: usize = 8 * 1024;
// Tool servers spawned by the agent can inherit its pipes and keep them open.
const STREAM_DRAIN_GRACE: Duration = Duration::from_secs(2);
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Agent already running")]
    AlreadyRunning,
    #[error("Agent not running")]
    NotRunning,
    #[error("Failed to launch agent process: {0}")]
    SpawnFailure(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Failed to encode agent configuration: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SupervisorStatus {
    Idle,
    Starting,
    Running {
        run_id: Uuid,
        pid: Option<u32>,
        started_at: DateTime<Utc>,
        profile: Option<String>,
    },
}

struct RunningProcess {
    run_id: Uuid,
    pid: Option<u32>,
    started_at: DateTime<Utc>,
    launched_with: RootConfig,
    kill: oneshot::Sender<()>,
    waiter: JoinHandle<()>,
}

enum Slot {
    Idle,
    Starting,
    Running(RunningProcess),
}

/// Owns the single agent process. The slot is only touched inside short,
/// non-async critical sections, so check-then-set on start is atomic.
pub struct AgentSupervisor {
    store: Arc<ProfileStore>,
    mode: LaunchMode,
    events: mpsc::UnboundedSender<AgentEvent>,
    slot: Arc<Mutex<Slot>>,
}

impl AgentSupervisor {
    pub fn new(
        store: Arc<ProfileStore>,
        mode: LaunchMode,
        events: mpsc::UnboundedSender<AgentEvent>,
    ) -> Self {
        Self {
            store,
            mode,
            events,
            slot: Arc::new(Mutex::new(Slot::Idle)),
        }
    }

    pub fn status(&self) -> SupervisorStatus {
        match &*lock_slot(&self.slot) {
            Slot::Idle => SupervisorStatus::Idle,
            Slot::Starting => SupervisorStatus::Starting,
            Slot::Running(process) => SupervisorStatus::Running {
                run_id: process.run_id,
                pid: process.pid,
                started_at: process.started_at,
                profile: process.launched_with.current_agent_profile.clone(),
            },
        }
    }

    /// Snapshot of the configuration the running process was launched with.
    pub fn launched_with(&self) -> Option<RootConfig> {
        match &*lock_slot(&self.slot) {
            Slot::Running(process) => Some(process.launched_with.clone()),
            _ => None,
        }
    }

    pub async fn start(&self, launch: Option<LaunchOverride>) -> Result<Uuid, SupervisorError> {
        {
            let mut slot = lock_slot(&self.slot);
            if !matches!(*slot, Slot::Idle) {
                return Err(SupervisorError::AlreadyRunning);
            }
            *slot = Slot::Starting;
        }

        let result = self.launch(launch).await;
        if result.is_err() {
            let mut slot = lock_slot(&self.slot);
            if matches!(*slot, Slot::Starting) {
                *slot = Slot::Idle;
            }
        }
        result
    }

    /// Signals the tracked process and forgets it without waiting for teardown.
    pub fn stop(&self) -> Result<(), SupervisorError> {
        let process = self.take_running()?;
        info!("stopping agent process {}", process.run_id);
        let _ = process.kill.send(());
        Ok(())
    }

    /// Application teardown: like `stop`, but waits until the process is reaped.
    pub async fn shutdown(&self) {
        let Ok(process) = self.take_running() else {
            return;
        };
        info!("terminating agent process {} on shutdown", process.run_id);
        let _ = process.kill.send(());
        if let Err(error) = process.waiter.await {
            warn!("agent waiter ended abnormally during shutdown: {error}");
        }
    }

    fn take_running(&self) -> Result<RunningProcess, SupervisorError> {
        let mut slot = lock_slot(&self.slot);
        if !matches!(*slot, Slot::Running(_)) {
            return Err(SupervisorError::NotRunning);
        }
        match std::mem::replace(&mut *slot, Slot::Idle) {
            Slot::Running(process) => Ok(process),
            _ => Err(SupervisorError::NotRunning),
        }
    }

    async fn launch(&self, launch: Option<LaunchOverride>) -> Result<Uuid, SupervisorError> {
        let write_back = launch.as_ref().map(override_fields);
        let mut stored = self.store.get().await?;
        if let Some(fields) = &write_back {
            stored.apply(fields.clone());
        }
        let config = stored.resolve_for_launch(launch.as_ref());
        let serialized = serde_json::to_string(&config)?;
        let spec = self.mode.spec_for(&serialized);
        let run_id = Uuid::new_v4();

        info!(
            "starting agent process {run_id} ({} mode, program {}, profile {}, user context {}, {} secret(s), {} tool server(s))",
            self.mode.label(),
            spec.program.display(),
            config.current_agent_profile.as_deref().unwrap_or("-"),
            if config.user_context.name.is_empty() { "anonymous" } else { "named" },
            config.secrets.configured_count(),
            config.mcp_servers.as_ref().map_or(0, Vec::len),
        );

        let mut child = match spec.command().spawn() {
            Ok(child) => child,
            Err(error) => {
                let message = format!("{}: {error}", spec.program.display());
                error!("failed to launch agent process {run_id}: {message}");
                let _ = self.events.send(StreamKind::Stderr.event(
                    run_id,
                    format!("Failed to launch agent process: {message}"),
                ));
                return Err(SupervisorError::SpawnFailure(message));
            }
        };

        // The override is remembered only once the process actually exists.
        if let Some(fields) = write_back {
            if let Err(error) = self.store.merge(fields).await {
                warn!("agent process {run_id} started but its profile was not saved: {error}");
            }
        }

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_stream(stdout, StreamKind::Stdout, run_id, self.events.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_stream(stderr, StreamKind::Stderr, run_id, self.events.clone()));
        }

        let pid = child.id();
        let (kill_tx, kill_rx) = oneshot::channel();
        let mut slot = lock_slot(&self.slot);
        // The waiter is spawned while the slot is held so an instant exit cannot
        // clear the slot before the process has been recorded in it.
        let waiter = tokio::spawn(wait_for_exit(
            child,
            readers,
            kill_rx,
            run_id,
            Arc::clone(&self.slot),
            self.events.clone(),
        ));
        *slot = Slot::Running(RunningProcess {
            run_id,
            pid,
            started_at: Utc::now(),
            launched_with: config,
            kill: kill_tx,
            waiter,
        });
        Ok(run_id)
    }
}

fn override_fields(launch: &LaunchOverride) -> PartialConfig {
    PartialConfig {
        current_agent_profile: launch.profile.clone(),
        system_prompt: launch.system_prompt.clone(),
        mcp_servers: launch.mcp_servers.clone(),
        ..PartialConfig::default()
    }
}

fn lock_slot(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn forward_stream<R>(
    mut reader: R,
    kind: StreamKind,
    run_id: Uuid,
    events: mpsc::UnboundedSender<AgentEvent>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut decoder = Utf8ChunkDecoder::default();
        let mut buffer = vec![0_u8; READ_CHUNK_BYTES];
        loop {
            match reader.read(&mut buffer).await {
                Ok(0) => break,
                Ok(read) => {
                    debug!("agent {run_id} {}: {read} byte(s)", kind.label());
                    let text = decoder.decode(&buffer[..read]);
                    if !text.is_empty() {
                        let _ = events.send(kind.event(run_id, text));
                    }
                }
                Err(error) => {
                    warn!("failed reading agent {run_id} {}: {error}", kind.label());
                    break;
                }
            }
        }
        if let Some(rest) = decoder.finish() {
            let _ = events.send(kind.event(run_id, rest));
        }
    })
}

async fn wait_for_exit(
    mut child: Child,
    readers: Vec<JoinHandle<()>>,
    kill_rx: oneshot::Receiver<()>,
    run_id: Uuid,
    slot: Arc<Mutex<Slot>>,
    events: mpsc::UnboundedSender<AgentEvent>,
) {
    // A dropped sender means the supervisor itself went away; terminate too.
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        _ = kill_rx => None,
    };
    let status = match exited {
        Some(status) => status,
        None => terminate(&mut child, run_id).await,
    };

    let code = match status {
        Ok(status) => status.code(),
        Err(error) => {
            warn!("failed to collect exit status of agent process {run_id}: {error}");
            None
        }
    };
    info!("agent process {run_id} exited with code {code:?}");

    {
        let mut slot = lock_slot(&slot);
        if matches!(&*slot, Slot::Running(process) if process.run_id == run_id) {
            *slot = Slot::Idle;
        }
    }

    // Let buffered output reach the event stream before the exit event.
    let deadline = tokio::time::Instant::now() + STREAM_DRAIN_GRACE;
    for reader in readers {
        if tokio::time::timeout_at(deadline, reader).await.is_err() {
            debug!("agent {run_id} stdio still open after exit; detaching reader");
        }
    }

    let _ = events.send(AgentEvent::Exited {
        run_id,
        code,
        at: Utc::now(),
    });
}

/// Asks the process to exit with SIGTERM so wrappers such as `uv run` can pass
/// the signal on to the agent, then kills it if it outlives the grace period.
async fn terminate(child: &mut Child, run_id: Uuid) -> std::io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                Ok(()) => match tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
                    Ok(status) => return status,
                    Err(_) => warn!("agent process {run_id} ignored SIGTERM; killing it"),
                },
                Err(error) => warn!("failed to send SIGTERM to agent process {run_id}: {error}"),
            }
        }
    }

    if let Err(error) = child.start_kill() {
        warn!("failed to kill agent process {run_id}: {error}");
    }
    child.wait().await
}
