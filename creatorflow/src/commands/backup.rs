//! Backup-related commands
//!
//! Commands for creating, listing, and restoring backups.

use crate::app::AppState;
use crate::error::{AppError, Result};
use crate::services::{BackupInfo, RestoreSummary};
use std::path::Path;

/// Create a backup of the signed-in user's data
pub async fn create_backup(state: &AppState) -> Result<String> {
    let backup_path = state
        .backup_service
        .create_backup(state.store.adapter())
        .await?;
    Ok(backup_path.to_string_lossy().to_string())
}

/// List the signed-in user's backups, newest first
pub async fn list_backups(state: &AppState) -> Result<Vec<BackupInfo>> {
    state.backup_service.list_backups(state.user_id()).await
}

/// Restore from a backup archive. Goes through the store, so it waits for
/// no one: a save in flight makes it fail with `Busy`.
pub async fn restore_backup(state: &AppState, backup_path: &str) -> Result<RestoreSummary> {
    let path = Path::new(backup_path)
        .canonicalize()
        .map_err(|e| AppError::Backup(format!("Invalid backup path: {}", e)))?;

    let summary = state
        .backup_service
        .restore_backup(&state.store, &path)
        .await?;

    tracing::info!("Restored backup {:?}", path);
    Ok(summary)
}
