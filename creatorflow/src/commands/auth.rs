//! Authentication commands
//!
//! Sign-up and sign-in run before any [`AppState`] exists, so they take the
//! data directory. Everything else needs a signed-in state.

use crate::app::{open_identity, AppState};
use crate::error::{AppError, Result};
use crate::router::{ConfirmationDialog, PendingAction};
use crate::services::Session;
use std::path::Path;

pub async fn sign_up(
    app_data_dir: &Path,
    email: &str,
    password: &str,
    display_name: &str,
) -> Result<Session> {
    let identity = open_identity(app_data_dir).await?;
    identity.sign_up(email, password, display_name).await
}

pub async fn sign_in(app_data_dir: &Path, email: &str, password: &str) -> Result<Session> {
    let identity = open_identity(app_data_dir).await?;
    identity.sign_in(email, password).await
}

pub async fn current_session(state: &AppState) -> Result<Option<Session>> {
    Ok(state.session.clone())
}

pub async fn update_password(state: &AppState, old: &str, new: &str) -> Result<()> {
    let identity = state.identity.as_ref().ok_or_else(|| {
        AppError::Auth("The local backend has no accounts".to_string())
    })?;
    let session = state.session.as_ref().ok_or(AppError::NotSignedIn)?;
    identity.update_password(&session.user_id, old, new).await
}

pub async fn request_sign_out(state: &AppState) -> Result<ConfirmationDialog> {
    if state.identity.is_none() {
        return Err(AppError::Auth("The local backend has no accounts".to_string()));
    }
    super::request(state, PendingAction::SignOut).await
}
