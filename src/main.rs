use focustrack::application::bootstrap::{bootstrap_workspace, ensure_leave_task};
use focustrack::application::engine::TaskSwitchEngine;
use focustrack::application::scheduler::EnforcementScheduler;
use focustrack::domain::clock::TrackerClock;
use focustrack::infrastructure::config::load_configs;
use focustrack::infrastructure::error::StoreError;
use focustrack::infrastructure::sqlite_store::SqliteTrackerStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), StoreError> {
    init_tracing();

    let workspace_root = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir()?,
    };

    let workspace = bootstrap_workspace(&workspace_root)?;
    let configs = load_configs(&workspace.config_dir)?;
    info!(
        workspace = %workspace.workspace_root.display(),
        timezone = %configs.app.timezone,
        cutover_hour = configs.app.cutover_hour,
        "workspace ready"
    );

    let store = Arc::new(SqliteTrackerStore::new(&workspace.database_path));
    ensure_leave_task(store.as_ref())?;

    let clock = TrackerClock::new(configs.app.timezone()?, configs.app.cutover_hour);
    let engine = Arc::new(TaskSwitchEngine::new(store.clone(), clock));
    let scheduler = EnforcementScheduler::new(engine, store, configs.schedule);
    let handles = scheduler.spawn();
    info!(loops = handles.len(), "enforcement scheduler running");

    shutdown_signal().await;
    info!("shutting down");
    for handle in handles {
        handle.abort();
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sigterm) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
