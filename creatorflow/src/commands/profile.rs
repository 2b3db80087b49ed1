//! Profile commands

use crate::app::AppState;
use crate::database::{ProfileDraft, UserProfile};
use crate::error::Result;

pub async fn get_profile(state: &AppState) -> Result<Option<UserProfile>> {
    Ok(state.store.snapshot().await.profile)
}

/// Change the display name and/or avatar; `None` keeps the current value
pub async fn update_profile(
    state: &AppState,
    display_name: Option<String>,
    avatar_url: Option<String>,
) -> Result<UserProfile> {
    let current = state.store.snapshot().await.profile;

    let draft = ProfileDraft {
        display_name: display_name
            .or_else(|| current.as_ref().map(|p| p.display_name.clone()))
            .unwrap_or_default(),
        avatar_url: avatar_url.or_else(|| current.and_then(|p| p.avatar_url)),
    };

    state.store.update_profile(draft).await
}
