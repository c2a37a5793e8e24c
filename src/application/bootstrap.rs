use crate::domain::models::{Task, TaskOwner, LEAVE_TASK_ID, LEAVE_TASK_NAME};
use crate::infrastructure::config::{ensure_default_configs, load_configs};
use crate::infrastructure::error::StoreError;
use crate::infrastructure::storage::initialize_database;
use crate::infrastructure::store::TrackerStore;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub config_dir: PathBuf,
    pub database_path: PathBuf,
}

pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, StoreError> {
    let config_dir = workspace_root.join("config");
    let state_dir = workspace_root.join("state");
    let database_path = state_dir.join("focustrack.sqlite");

    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&state_dir)?;

    ensure_default_configs(&config_dir)?;
    // fail fast on malformed configs before any state is touched
    let _ = load_configs(&config_dir)?;
    initialize_database(&database_path)?;

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        config_dir,
        database_path,
    })
}

// a soft-deleted or deactivated Leave row is revived in place
pub fn ensure_leave_task<S: TrackerStore>(store: &S) -> Result<(), StoreError> {
    let task = match store.get_task(LEAVE_TASK_ID)? {
        Some(existing)
            if !existing.is_deleted && existing.is_active && existing.owner.is_system() =>
        {
            return Ok(());
        }
        Some(mut existing) => {
            existing.is_deleted = false;
            existing.is_active = true;
            existing.owner = TaskOwner::System;
            existing
        }
        None => Task {
            id: LEAVE_TASK_ID,
            name: LEAVE_TASK_NAME.to_string(),
            owner: TaskOwner::System,
            is_active: true,
            is_deleted: false,
            records_tag: None,
        },
    };
    store.save_task(&task)?;
    Ok(())
}
