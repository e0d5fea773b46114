pub mod bridge;
pub mod config;
pub mod db;
pub mod env_secrets;
pub mod profile_store;
pub mod profiles;
pub mod runtime_config;
pub mod supervisor;

#[cfg(feature = "desktop")]
mod commands;

#[cfg(feature = "desktop")]
pub use desktop::run;

#[cfg(feature = "desktop")]
mod desktop {
    use std::fs;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use log::{debug, info, warn};
    use sqlx::SqlitePool;
    use tauri::{Emitter, Manager, RunEvent};
    use tokio::sync::mpsc;

    use crate::bridge::ConfigBridge;
    use crate::commands;
    use crate::db;
    use crate::profile_store::ProfileStore;
    use crate::runtime_config::{self, RuntimeFlags};
    use crate::supervisor::events::AgentEvent;
    use crate::supervisor::launcher::LaunchMode;
    use crate::supervisor::AgentSupervisor;

    pub struct AppState {
        pub bridge: ConfigBridge,
        pub app_data_dir: PathBuf,
    }

    fn resolve_workspace_root() -> Result<PathBuf, String> {
        let cwd = std::env::current_dir()
            .map_err(|error| format!("Failed to determine workspace root: {error}"))?;

        // `tauri dev` runs from `src-tauri/`; the agent project sits beside it.
        if cwd.file_name().map(|n| n == "src-tauri").unwrap_or(false) {
            if let Some(parent) = cwd.parent() {
                return Ok(parent.to_path_buf());
            }
        }

        Ok(cwd)
    }

    fn resolve_resource_dir(app: &tauri::App) -> PathBuf {
        match app.path().resource_dir() {
            Ok(dir) => dir,
            Err(error) => {
                warn!("resource dir unavailable ({error}), falling back to executable dir");
                std::env::current_exe()
                    .ok()
                    .and_then(|exe| exe.parent().map(Path::to_path_buf))
                    .unwrap_or_default()
            }
        }
    }

    fn initialize_state(app: &mut tauri::App) -> Result<(), String> {
        let workspace_root = resolve_workspace_root()?;
        runtime_config::load_env_files(&workspace_root);

        let app_data_dir = app
            .path()
            .app_local_data_dir()
            .map_err(|error| format!("Failed to determine app data dir: {error}"))?;

        fs::create_dir_all(&app_data_dir)
            .map_err(|error| format!("Failed to create app data dir: {error}"))?;

        let db_path = app_data_dir.join("voicedeck.db");
        let flags = RuntimeFlags::from_env(&workspace_root).with_cli_args(std::env::args());
        let mode = LaunchMode::resolve(&flags, &resolve_resource_dir(app));
        info!(
            "starting in {} mode (dev_mode={}, agent_dir={})",
            mode.label(),
            flags.dev_mode,
            flags.agent_dir.display()
        );

        let db_pool = tauri::async_runtime::block_on(async {
            let pool = db::connect_pool(&db_path).await?;
            db::run_migrations(&pool).await?;
            Ok::<SqlitePool, String>(pool)
        })?;

        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<AgentEvent>();
        let store = Arc::new(ProfileStore::new(db_pool));
        let supervisor = Arc::new(AgentSupervisor::new(Arc::clone(&store), mode, events_tx));

        let handle = app.handle().clone();
        tauri::async_runtime::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                let payload = event.payload();
                if let Some(line) = &payload.line {
                    debug!(target: "agent", "{line}");
                }
                if let Err(error) = handle.emit(event.channel(), payload) {
                    warn!("failed to forward {} event: {error}", event.channel());
                }
            }
        });

        app.manage(AppState {
            bridge: ConfigBridge::new(store, supervisor, flags),
            app_data_dir,
        });

        Ok(())
    }

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

        let app = match tauri::Builder::default()
            .setup(|app| {
                initialize_state(app).map_err(io::Error::other)?;
                Ok(())
            })
            .invoke_handler(tauri::generate_handler![
                commands::read_config,
                commands::write_config,
                commands::request_start,
                commands::request_stop,
                commands::run_profile,
                commands::agent_status,
                commands::save_profile,
                commands::delete_profile,
                commands::parse_tool_args,
                commands::load_env_secrets,
                commands::get_runtime_flags
            ])
            .build(tauri::generate_context!())
        {
            Ok(app) => app,
            Err(error) => {
                log::error!("error while building tauri application: {error}");
                std::process::exit(1);
            }
        };

        app.run(|app_handle, event| {
            if let RunEvent::Exit = event {
                if let Some(state) = app_handle.try_state::<AppState>() {
                    info!(
                        "shutting down, data dir {}",
                        state.app_data_dir.display()
                    );
                    tauri::async_runtime::block_on(state.bridge.shutdown());
                }
            }
        });
    }
}

#[cfg(feature = "desktop")]
pub(crate) use desktop::AppState;
