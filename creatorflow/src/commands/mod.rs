//! Commands exposed to the front end
//!
//! Thin async entry points over [`AppState`], grouped by page:
//! - `ideas`: capture, edit, and the read views over ideas
//! - `bin`: recycle bin
//! - `channels` / `statuses`: channel and pipeline management
//! - `profile`: the signed-in creator's profile
//! - `trends`: production analytics
//! - `backup`: backup and restore
//! - `auth`: sign-up, sign-in, password, sign-out
//! - `navigation`: view router and confirmation dialogs
//! - `settings`: application settings
//!
//! Destructive operations never run directly. They open a confirmation
//! dialog; [`navigation::confirm_pending`] executes the action.

pub mod auth;
pub mod backup;
pub mod bin;
pub mod channels;
pub mod ideas;
pub mod navigation;
pub mod profile;
pub mod settings;
pub mod statuses;
pub mod trends;

use crate::app::AppState;
use crate::error::{AppError, Result};
use crate::router::{ConfirmationDialog, PendingAction};
use crate::services::Snapshot;

pub use auth::*;
pub use backup::*;
pub use bin::*;
pub use channels::*;
pub use ideas::*;
pub use navigation::*;
pub use profile::*;
pub use settings::*;
pub use statuses::*;
pub use trends::*;

/// Application information structure
#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    pub version: String,
    pub app_data_dir: String,
    pub user_id: String,
}

/// Get application information
pub async fn get_app_info(state: &AppState) -> Result<AppInfo> {
    Ok(AppInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        app_data_dir: state.app_data_dir.to_string_lossy().to_string(),
        user_id: state.user_id().to_string(),
    })
}

/// Open a confirmation dialog for `action`
pub(crate) async fn request(state: &AppState, action: PendingAction) -> Result<ConfirmationDialog> {
    let mut router = state.router.lock().await;
    router.request_confirmation(action).cloned()
}

/// Resolve a full idea id or a unique prefix of one
pub(crate) fn resolve_idea_id(snapshot: &Snapshot, key: &str) -> Result<String> {
    if let Some(idea) = snapshot.find_idea(key) {
        return Ok(idea.id.clone());
    }

    let mut matches = snapshot.ideas.iter().filter(|i| i.id.starts_with(key));
    match (matches.next(), matches.next()) {
        (Some(idea), None) if !key.is_empty() => Ok(idea.id.clone()),
        (Some(_), Some(_)) => Err(AppError::Validation(format!(
            "Idea id {} is ambiguous",
            key
        ))),
        _ => Err(AppError::IdeaNotFound(key.to_string())),
    }
}

pub(crate) fn resolve_channel_id(snapshot: &Snapshot, key: &str) -> Result<String> {
    snapshot
        .find_channel(key)
        .map(|c| c.id.clone())
        .ok_or_else(|| AppError::ChannelNotFound(key.to_string()))
}

pub(crate) fn resolve_status_id(snapshot: &Snapshot, key: &str) -> Result<String> {
    snapshot
        .find_status(key)
        .map(|s| s.id.clone())
        .ok_or_else(|| AppError::StatusNotFound(key.to_string()))
}
