//! Backup service
//!
//! Exports one user's collections as a ZIP archive with a manifest of
//! SHA-256 checksums, and restores them after every checksum verifies.
//! Archives live in `backups/<user_id>/` under the data directory.

use crate::config;
use crate::error::{AppError, Result};
use crate::services::store::Store;
use crate::storage::{Dataset, PersistenceAdapter};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tokio::fs;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const MANIFEST_NAME: &str = "manifest.json";
const FILE_PREFIX: &str = "backup_";
const FILE_EXTENSION: &str = "zip";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// Backup manifest structure
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupManifest {
    pub version: String,
    pub timestamp: String,
    pub user_id: String,
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    pub checksum: String,
}

/// A backup archive on disk
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub size: u64,
}

/// What a restore brought back
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSummary {
    pub ideas: usize,
    pub channels: usize,
    pub statuses: usize,
    pub profile: bool,
}

#[derive(Clone)]
pub struct BackupService {
    backups_root: PathBuf,
    retention: usize,
}

impl BackupService {
    pub fn new(app_data_dir: &Path, retention: usize) -> Self {
        Self {
            backups_root: app_data_dir.join(config::BACKUPS_DIR_NAME),
            retention: retention.max(1),
        }
    }

    fn user_dir(&self, user_id: &str) -> PathBuf {
        self.backups_root.join(user_id)
    }

    /// Snapshot the adapter's user into a new archive, then prune old ones
    pub async fn create_backup<A: PersistenceAdapter>(&self, adapter: &A) -> Result<PathBuf> {
        let user_id = adapter.user_id().to_string();
        tracing::info!("Creating backup for user {}", user_id);

        let ideas = adapter.list_ideas().await?;
        let channels = adapter.list_channels().await?;
        let statuses = adapter.list_statuses().await?;
        let profile = adapter.get_profile(&user_id).await?;

        let entries: Vec<(String, Vec<u8>)> = vec![
            (entry_name(config::KEY_IDEAS), serde_json::to_vec_pretty(&ideas)?),
            (entry_name(config::KEY_CHANNELS), serde_json::to_vec_pretty(&channels)?),
            (entry_name(config::KEY_STATUSES), serde_json::to_vec_pretty(&statuses)?),
            (entry_name(config::KEY_USER), serde_json::to_vec_pretty(&profile)?),
        ];

        let now = Utc::now();
        let mut manifest = BackupManifest {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: now.to_rfc3339(),
            user_id: user_id.clone(),
            files: Vec::new(),
        };

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for (name, data) in &entries {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(data)?;

            manifest.files.push(FileEntry {
                path: name.clone(),
                size: data.len() as u64,
                checksum: calculate_checksum(data),
            });
            tracing::debug!("Added {} to backup ({} bytes)", name, data.len());
        }

        let manifest_json = serde_json::to_vec_pretty(&manifest)?;
        zip.start_file(MANIFEST_NAME, options)?;
        zip.write_all(&manifest_json)?;
        let archive = zip.finish()?.into_inner();

        let dir = self.user_dir(&user_id);
        fs::create_dir_all(&dir).await?;
        let backup_path = dir.join(format!(
            "{}{}.{}",
            FILE_PREFIX,
            now.format(TIMESTAMP_FORMAT),
            FILE_EXTENSION
        ));

        // Write under a temporary name so a crash never leaves a half archive
        let temp_path = backup_path.with_extension("zip.tmp");
        fs::write(&temp_path, &archive).await?;
        fs::rename(&temp_path, &backup_path).await?;

        tracing::info!(
            "Backup created: {:?} ({} ideas, {} bytes)",
            backup_path,
            ideas.len(),
            archive.len()
        );

        self.apply_retention_policy(&user_id).await?;

        Ok(backup_path)
    }

    /// Keep only the newest `retention` archives
    async fn apply_retention_policy(&self, user_id: &str) -> Result<()> {
        let backups = self.list_backups(user_id).await?;

        for backup in backups.iter().skip(self.retention) {
            tracing::info!("Deleting old backup: {:?}", backup.path);
            if let Err(e) = fs::remove_file(&backup.path).await {
                tracing::warn!("Failed to delete backup file {:?}: {}", backup.path, e);
            }
        }

        Ok(())
    }

    /// Archives for `user_id`, newest first
    pub async fn list_backups(&self, user_id: &str) -> Result<Vec<BackupInfo>> {
        let dir = self.user_dir(user_id);
        if !fs::try_exists(&dir).await? {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(created_at) = parse_backup_name(&path) else {
                continue;
            };
            let size = entry.metadata().await?.len();
            backups.push(BackupInfo {
                path,
                created_at,
                size,
            });
        }

        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(backups)
    }

    /// Read an archive back into a dataset, verifying every checksum first
    pub async fn read_backup(&self, backup_path: &Path) -> Result<Dataset> {
        let data = fs::read(backup_path).await?;
        let contents = read_verified(data)?;

        let dataset = Dataset {
            ideas: parse_entry(&contents, config::KEY_IDEAS)?,
            channels: parse_entry(&contents, config::KEY_CHANNELS)?,
            statuses: parse_entry(&contents, config::KEY_STATUSES)?,
            profile: parse_entry(&contents, config::KEY_USER)?,
        };

        for idea in &dataset.ideas {
            idea.check()
                .map_err(|e| AppError::Restore(format!("Idea {} is invalid: {}", idea.id, e)))?;
        }
        Ok(dataset)
    }

    /// Replace the store's user data with the archive's contents.
    ///
    /// A damaged archive is rejected before anything is written, and the
    /// swap itself is all-or-nothing.
    pub async fn restore_backup<A: PersistenceAdapter>(
        &self,
        store: &Store<A>,
        backup_path: &Path,
    ) -> Result<RestoreSummary> {
        tracing::info!("Restoring from backup: {:?}", backup_path);

        let dataset = self.read_backup(backup_path).await?;
        tracing::info!("All files verified, replacing data");
        let restored = store.replace_all(dataset).await?;

        let summary = RestoreSummary {
            ideas: restored.ideas.len(),
            channels: restored.channels.len(),
            statuses: restored.statuses.len(),
            profile: restored.profile.is_some(),
        };
        tracing::info!("Restore completed: {:?}", summary);
        Ok(summary)
    }
}

fn entry_name(key: &str) -> String {
    format!("{}.json", key)
}

/// Parse `backup_<timestamp>.zip` back into its creation time
fn parse_backup_name(path: &Path) -> Option<DateTime<Utc>> {
    if path.extension()? != FILE_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let stamp = stem.strip_prefix(FILE_PREFIX)?;
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Unpack the archive and check each file against the manifest
fn read_verified(data: Vec<u8>) -> Result<Vec<(String, Vec<u8>)>> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| AppError::Restore(format!("Not a backup archive: {}", e)))?;

    let manifest: BackupManifest = {
        let mut file = archive
            .by_name(MANIFEST_NAME)
            .map_err(|_| AppError::Restore("Archive has no manifest".to_string()))?;
        let mut raw = String::new();
        file.read_to_string(&mut raw)?;
        serde_json::from_str(&raw)?
    };

    tracing::info!(
        "Backup version: {}, timestamp: {}, files: {}",
        manifest.version,
        manifest.timestamp,
        manifest.files.len()
    );

    let mut contents = Vec::with_capacity(manifest.files.len());
    for file_entry in &manifest.files {
        let mut file = archive
            .by_name(&file_entry.path)
            .map_err(|_| AppError::Restore(format!("Missing file: {}", file_entry.path)))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let actual = calculate_checksum(&bytes);
        if actual != file_entry.checksum {
            return Err(AppError::Restore(format!(
                "Checksum mismatch for {}: expected {}, got {}",
                file_entry.path, file_entry.checksum, actual
            )));
        }
        tracing::debug!("Verified: {}", file_entry.path);
        contents.push((file_entry.path.clone(), bytes));
    }

    Ok(contents)
}

fn parse_entry<T: DeserializeOwned>(contents: &[(String, Vec<u8>)], key: &str) -> Result<T> {
    let name = entry_name(key);
    let (_, bytes) = contents
        .iter()
        .find(|(path, _)| *path == name)
        .ok_or_else(|| AppError::Restore(format!("Archive has no {}", name)))?;
    Ok(serde_json::from_slice(bytes)?)
}

fn calculate_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
