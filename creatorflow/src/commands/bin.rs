//! Recycle bin commands
//!
//! Moving to the bin and deleting are destructive, so these only open the
//! confirmation dialog. Restoring is not and runs immediately.

use super::resolve_idea_id;
use crate::app::AppState;
use crate::database::Idea;
use crate::error::{AppError, Result};
use crate::router::{ConfirmationDialog, PendingAction};

pub async fn list_bin(state: &AppState) -> Result<Vec<Idea>> {
    let snapshot = state.store.snapshot().await;
    Ok(snapshot.bin().into_iter().cloned().collect())
}

pub async fn restore_idea(state: &AppState, id: &str) -> Result<()> {
    let id = resolve_idea_id(&state.store.snapshot().await, id)?;
    state.store.restore(&id).await
}

pub async fn request_move_to_bin(state: &AppState, id: &str) -> Result<ConfirmationDialog> {
    let snapshot = state.store.snapshot().await;
    let idea_id = resolve_idea_id(&snapshot, id)?;
    if snapshot.find_idea(&idea_id).is_some_and(|i| i.is_deleted) {
        return Err(AppError::Validation("Idea is already in the bin".to_string()));
    }
    super::request(state, PendingAction::MoveToBin { idea_id }).await
}

pub async fn request_delete_forever(state: &AppState, id: &str) -> Result<ConfirmationDialog> {
    let idea_id = resolve_idea_id(&state.store.snapshot().await, id)?;
    super::request(state, PendingAction::DeleteForever { idea_id }).await
}

pub async fn request_empty_bin(state: &AppState) -> Result<ConfirmationDialog> {
    super::request(state, PendingAction::EmptyBin).await
}
