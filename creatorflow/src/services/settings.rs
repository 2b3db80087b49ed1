//! Settings service
//!
//! Manages application settings persistence using JSON file storage.

use super::store::{ReferencePolicy, StorePolicy};
use super::trends::Timeframe;
use crate::config;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

/// Which persistence backend the store runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Relational database with accounts; requires sign-in
    #[default]
    Sqlite,
    /// Single JSON document, one implicit user
    Local,
}

impl std::str::FromStr for BackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(BackendKind::Sqlite),
            "local" => Ok(BackendKind::Local),
            other => Err(AppError::Validation(format!("Unknown backend: {}", other))),
        }
    }
}

fn default_sync_timeout_secs() -> u64 {
    config::DEFAULT_SYNC_TIMEOUT_SECS
}

fn default_backup_retention() -> usize {
    config::DEFAULT_BACKUP_RETENTION
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub channel_deletion: ReferencePolicy,
    #[serde(default)]
    pub status_deletion: ReferencePolicy,
    /// Seconds a single backend call may take
    #[serde(default = "default_sync_timeout_secs")]
    pub sync_timeout_secs: u64,
    /// Backup archives kept per user
    #[serde(default = "default_backup_retention")]
    pub backup_retention: usize,
    #[serde(default)]
    pub default_timeframe: Timeframe,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            channel_deletion: ReferencePolicy::default(),
            status_deletion: ReferencePolicy::default(),
            sync_timeout_secs: default_sync_timeout_secs(),
            backup_retention: default_backup_retention(),
            default_timeframe: Timeframe::default(),
        }
    }
}

impl AppSettings {
    pub fn store_policy(&self) -> StorePolicy {
        StorePolicy {
            channel_deletion: self.channel_deletion,
            status_deletion: self.status_deletion,
            sync_timeout: Duration::from_secs(self.sync_timeout_secs.max(1)),
        }
    }

    /// Change one setting by its command-line name
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "backend" => self.backend = value.parse()?,
            "channel-deletion" => self.channel_deletion = value.parse()?,
            "status-deletion" => self.status_deletion = value.parse()?,
            "sync-timeout" => {
                self.sync_timeout_secs = parse_positive(key, value)? as u64;
            }
            "backup-retention" => {
                self.backup_retention = parse_positive(key, value)?;
            }
            "default-timeframe" => self.default_timeframe = value.parse()?,
            other => {
                return Err(AppError::Validation(format!("Unknown setting: {}", other)));
            }
        }
        Ok(())
    }
}

fn parse_positive(key: &str, value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(AppError::Validation(format!(
            "{} must be a positive number, got {}",
            key, value
        ))),
    }
}

/// Service for managing application settings
#[derive(Clone)]
pub struct SettingsService {
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new(app_data_dir: PathBuf) -> Self {
        Self {
            settings_path: app_data_dir.join(config::SETTINGS_FILE_NAME),
        }
    }

    /// Load settings from disk or create default if not exists
    pub async fn load(&self) -> Result<AppSettings> {
        if !fs::try_exists(&self.settings_path).await? {
            tracing::info!("Settings file not found, creating default settings");
            let default = AppSettings::default();
            self.save(&default).await?;
            return Ok(default);
        }

        let content = fs::read_to_string(&self.settings_path).await?;
        let settings: AppSettings = serde_json::from_str(&content)
            .map_err(|e| AppError::Generic(format!("Failed to parse settings: {}", e)))?;

        Ok(settings)
    }

    /// Save settings to disk
    pub async fn save(&self, settings: &AppSettings) -> Result<()> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| AppError::Generic(format!("Failed to serialize settings: {}", e)))?;

        fs::write(&self.settings_path, content).await?;
        tracing::info!("Settings saved to {:?}", self.settings_path);

        Ok(())
    }

    /// Load, change one key, save
    pub async fn update(&self, key: &str, value: &str) -> Result<AppSettings> {
        let mut settings = self.load().await?;
        settings.set(key, value)?;
        self.save(&settings).await?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_service() -> (SettingsService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let service = SettingsService::new(temp_dir.path().to_path_buf());
        (service, temp_dir)
    }

    #[tokio::test]
    async fn test_default_settings_created_on_load() {
        let (service, temp) = create_test_service();

        let settings = service.load().await.unwrap();

        assert_eq!(settings.backend, BackendKind::Sqlite);
        assert_eq!(settings.channel_deletion, ReferencePolicy::Block);
        assert_eq!(settings.sync_timeout_secs, 15);
        assert_eq!(settings.backup_retention, 10);
        assert!(temp.path().join("settings.json").exists());
    }

    #[tokio::test]
    async fn test_update_persists() {
        let temp_dir = TempDir::new().unwrap();

        {
            let service = SettingsService::new(temp_dir.path().to_path_buf());
            service.update("backend", "local").await.unwrap();
            service.update("status-deletion", "reassign").await.unwrap();
            service.update("default-timeframe", "1Y").await.unwrap();
        }

        let service = SettingsService::new(temp_dir.path().to_path_buf());
        let loaded = service.load().await.unwrap();
        assert_eq!(loaded.backend, BackendKind::Local);
        assert_eq!(loaded.status_deletion, ReferencePolicy::Reassign);
        assert_eq!(loaded.channel_deletion, ReferencePolicy::Block);
        assert_eq!(loaded.default_timeframe, Timeframe::Year);
    }

    #[tokio::test]
    async fn test_invalid_updates_rejected() {
        let (service, _temp) = create_test_service();

        assert!(service.update("backend", "postgres").await.is_err());
        assert!(service.update("sync-timeout", "0").await.is_err());
        assert!(service.update("colour", "blue").await.is_err());
        assert_eq!(service.load().await.unwrap(), AppSettings::default());
    }

    #[tokio::test]
    async fn test_missing_fields_fall_back_to_defaults() {
        let (service, temp) = create_test_service();
        std::fs::write(
            temp.path().join("settings.json"),
            r#"{ "backend": "local", "backupRetention": 3 }"#,
        )
        .unwrap();

        let settings = service.load().await.unwrap();
        assert_eq!(settings.backend, BackendKind::Local);
        assert_eq!(settings.backup_retention, 3);
        assert_eq!(settings.sync_timeout_secs, 15);
        assert_eq!(settings.store_policy().sync_timeout, Duration::from_secs(15));
    }
}
