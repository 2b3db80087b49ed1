//! Navigation and confirmation commands
//!
//! Router transitions, and the confirm/cancel pair that resolves an open
//! confirmation dialog.

use super::resolve_idea_id;
use crate::app::AppState;
use crate::error::Result;
use crate::router::{PendingAction, Router, TopView};
use serde::Serialize;

/// What a confirmed action did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ActionOutcome {
    MovedToBin { idea_id: String },
    DeletedForever { idea_id: String },
    BinEmptied { removed: u64 },
    ChannelDeleted { channel_id: String },
    StatusDeleted { status_id: String },
    SignedOut,
}

pub async fn get_router(state: &AppState) -> Result<Router> {
    Ok(state.router.lock().await.clone())
}

pub async fn navigate(state: &AppState, view: TopView) -> Result<Router> {
    let mut router = state.router.lock().await;
    router.navigate(view)?;
    Ok(router.clone())
}

pub async fn open_idea(state: &AppState, id: &str) -> Result<Router> {
    let id = resolve_idea_id(&state.store.snapshot().await, id)?;
    let mut router = state.router.lock().await;
    router.open_idea(&id)?;
    Ok(router.clone())
}

pub async fn close_detail(state: &AppState) -> Result<Router> {
    let mut router = state.router.lock().await;
    router.close_detail()?;
    Ok(router.clone())
}

pub async fn open_editor(state: &AppState, id: Option<&str>) -> Result<Router> {
    let id = match id {
        Some(id) => Some(resolve_idea_id(&state.store.snapshot().await, id)?),
        None => None,
    };
    let mut router = state.router.lock().await;
    router.open_editor(id.as_deref())?;
    Ok(router.clone())
}

pub async fn close_editor(state: &AppState) -> Result<Router> {
    let mut router = state.router.lock().await;
    router.close_editor()?;
    Ok(router.clone())
}

/// Dismiss the open confirmation dialog without doing anything
pub async fn cancel_pending(state: &AppState) -> Result<()> {
    state.router.lock().await.cancel()?;
    tracing::debug!("Confirmation cancelled");
    Ok(())
}

/// Accept the open confirmation dialog and run its action
pub async fn confirm_pending(state: &AppState) -> Result<ActionOutcome> {
    // The router lock is released before the store round trip
    let action = state.router.lock().await.confirm()?;
    tracing::info!("Confirmed: {:?}", action);

    match action {
        PendingAction::MoveToBin { idea_id } => {
            state.store.move_to_bin(&idea_id).await?;
            Ok(ActionOutcome::MovedToBin { idea_id })
        }
        PendingAction::DeleteForever { idea_id } => {
            state.store.delete_forever(&idea_id).await?;
            Ok(ActionOutcome::DeletedForever { idea_id })
        }
        PendingAction::EmptyBin => {
            let removed = state.store.empty_bin().await?;
            Ok(ActionOutcome::BinEmptied { removed })
        }
        PendingAction::DeleteChannel { channel_id } => {
            state.store.delete_channel(&channel_id).await?;
            Ok(ActionOutcome::ChannelDeleted { channel_id })
        }
        PendingAction::DeleteStatus { status_id } => {
            state.store.delete_status(&status_id).await?;
            Ok(ActionOutcome::StatusDeleted { status_id })
        }
        PendingAction::SignOut => {
            if let Some(identity) = &state.identity {
                identity.sign_out().await?;
            }
            state.store.clear().await;
            Ok(ActionOutcome::SignedOut)
        }
    }
}
