//! Pipeline status commands

use super::resolve_status_id;
use crate::app::AppState;
use crate::database::{Status, StatusDraft};
use crate::error::Result;
use crate::router::{ConfirmationDialog, PendingAction};

/// Statuses in pipeline order
pub async fn list_statuses(state: &AppState) -> Result<Vec<Status>> {
    Ok(state.store.snapshot().await.statuses)
}

pub async fn create_status(
    state: &AppState,
    name: String,
    color: Option<String>,
    order: Option<i64>,
) -> Result<Status> {
    state
        .store
        .save_status(StatusDraft {
            id: None,
            name,
            color,
            order,
        })
        .await
}

pub async fn update_status(
    state: &AppState,
    key: &str,
    name: Option<String>,
    color: Option<String>,
) -> Result<Status> {
    let snapshot = state.store.snapshot().await;
    let id = resolve_status_id(&snapshot, key)?;
    let current_name = snapshot
        .find_status(&id)
        .map(|s| s.name.clone())
        .unwrap_or_default();

    state
        .store
        .save_status(StatusDraft {
            id: Some(id),
            name: name.unwrap_or(current_name),
            color,
            order: None,
        })
        .await
}

/// Put statuses in the given order; each key is an id or a name
pub async fn reorder_statuses(state: &AppState, keys: &[String]) -> Result<Vec<Status>> {
    let snapshot = state.store.snapshot().await;
    let ids = keys
        .iter()
        .map(|k| resolve_status_id(&snapshot, k))
        .collect::<Result<Vec<_>>>()?;

    state.store.reorder_statuses(&ids).await?;
    Ok(state.store.snapshot().await.statuses)
}

pub async fn request_delete_status(state: &AppState, key: &str) -> Result<ConfirmationDialog> {
    let status_id = resolve_status_id(&state.store.snapshot().await, key)?;
    super::request(state, PendingAction::DeleteStatus { status_id }).await
}
