//! Channel commands

use super::resolve_channel_id;
use crate::app::AppState;
use crate::database::{Channel, ChannelDraft};
use crate::error::Result;
use crate::router::{ConfirmationDialog, PendingAction};

pub async fn list_channels(state: &AppState) -> Result<Vec<Channel>> {
    Ok(state.store.snapshot().await.channels)
}

pub async fn create_channel(
    state: &AppState,
    name: String,
    color: Option<String>,
    icon: Option<String>,
) -> Result<Channel> {
    state
        .store
        .save_channel(ChannelDraft {
            id: None,
            name,
            color,
            icon,
        })
        .await
}

/// Rename or recolor a channel, addressed by id or current name
pub async fn update_channel(
    state: &AppState,
    key: &str,
    name: Option<String>,
    color: Option<String>,
    icon: Option<String>,
) -> Result<Channel> {
    let snapshot = state.store.snapshot().await;
    let id = resolve_channel_id(&snapshot, key)?;
    let current_name = snapshot
        .find_channel(&id)
        .map(|c| c.name.clone())
        .unwrap_or_default();

    state
        .store
        .save_channel(ChannelDraft {
            id: Some(id),
            name: name.unwrap_or(current_name),
            color,
            icon,
        })
        .await
}

pub async fn request_delete_channel(state: &AppState, key: &str) -> Result<ConfirmationDialog> {
    let channel_id = resolve_channel_id(&state.store.snapshot().await, key)?;
    super::request(state, PendingAction::DeleteChannel { channel_id }).await
}
