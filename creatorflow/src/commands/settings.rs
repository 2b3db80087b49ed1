//! Settings-related commands
//!
//! These work on the data directory directly so the backend can be
//! switched while nobody is signed in.

use crate::error::Result;
use crate::services::{AppSettings, SettingsService};
use std::path::Path;

pub async fn get_settings(app_data_dir: &Path) -> Result<AppSettings> {
    SettingsService::new(app_data_dir.to_path_buf()).load().await
}

/// Change one setting. Takes effect the next time the app starts.
pub async fn update_setting(app_data_dir: &Path, key: &str, value: &str) -> Result<AppSettings> {
    let settings = SettingsService::new(app_data_dir.to_path_buf())
        .update(key, value)
        .await?;
    tracing::info!("Setting {} updated to {}", key, value);
    Ok(settings)
}
