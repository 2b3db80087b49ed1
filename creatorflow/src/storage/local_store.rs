//! Offline document store
//!
//! Keeps every collection in one JSON document on disk under the fixed keys
//! `cf_ideas`, `cf_channels`, `cf_statuses`, and `cf_user`. The whole
//! document is rewritten after each write. There are no accounts: the store
//! always acts as the local user.

use crate::config;
use crate::database::{sort_statuses, terminal_status, Channel, Idea, Status, UserProfile};
use crate::error::{AppError, Result};
use crate::storage::{ChangeEvent, ChangeFeed, Dataset, PersistenceAdapter, Resource};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{broadcast, RwLock};

/// In-memory copy of the document
#[derive(Debug, Default, Clone, Serialize)]
pub struct LocalData {
    #[serde(rename = "cf_ideas")]
    pub ideas: Vec<Idea>,
    #[serde(rename = "cf_channels")]
    pub channels: Vec<Channel>,
    #[serde(rename = "cf_statuses")]
    pub statuses: Vec<Status>,
    #[serde(rename = "cf_user")]
    pub user: Option<UserProfile>,
    #[serde(rename = "cf_seeded")]
    pub seeded: bool,
}

/// On-disk shape before validation: each entry is checked on its own so one
/// bad record does not take the rest of the collection down with it.
#[derive(Debug, Default, Deserialize)]
struct RawDocument {
    #[serde(rename = "cf_ideas", default)]
    ideas: Vec<Value>,
    #[serde(rename = "cf_channels", default)]
    channels: Vec<Value>,
    #[serde(rename = "cf_statuses", default)]
    statuses: Vec<Value>,
    #[serde(rename = "cf_user", default)]
    user: Option<Value>,
    #[serde(rename = "cf_seeded", default)]
    seeded: bool,
}

/// Stand-in creation time for records written without one
const UNKNOWN_TIME: &str = "1970-01-01T00:00:00Z";

/// Older documents carry no `createdAt` on channels and statuses and no
/// `updatedAt` on ideas or the profile. Fill them in before validation.
fn backfill<F>(values: &mut [Value], field: &str, fallback: F)
where
    F: Fn(&serde_json::Map<String, Value>) -> Option<Value>,
{
    for value in values {
        if let Value::Object(map) = value {
            if map.get(field).map_or(true, Value::is_null) {
                if let Some(filled) = fallback(map) {
                    map.insert(field.to_string(), filled);
                }
            }
        }
    }
}

fn unknown_time(_: &serde_json::Map<String, Value>) -> Option<Value> {
    Some(Value::String(UNKNOWN_TIME.to_string()))
}

fn parse_entries<T, F>(key: &str, values: Vec<Value>, check: F) -> Vec<T>
where
    T: DeserializeOwned,
    F: Fn(&T) -> Result<()>,
{
    values
        .into_iter()
        .filter_map(|value| {
            let parsed = serde_json::from_value::<T>(value)
                .map_err(AppError::from)
                .and_then(|entry| check(&entry).map(|_| entry));
            match parsed {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Quarantined malformed entry under {}: {}", key, e);
                    None
                }
            }
        })
        .collect()
}

impl LocalData {
    fn from_document(mut raw: RawDocument) -> Self {
        backfill(&mut raw.ideas, "updatedAt", |idea| idea.get("createdAt").cloned());
        backfill(&mut raw.channels, "createdAt", unknown_time);
        backfill(&mut raw.statuses, "createdAt", unknown_time);
        if let Some(user) = raw.user.as_mut() {
            backfill(std::slice::from_mut(user), "updatedAt", unknown_time);
        }

        let user = raw.user.and_then(|value| {
            serde_json::from_value::<UserProfile>(value)
                .map_err(|e| tracing::warn!("Quarantined malformed entry under {}: {}", config::KEY_USER, e))
                .ok()
        });

        let mut data = Self {
            ideas: parse_entries(config::KEY_IDEAS, raw.ideas, Idea::check),
            channels: parse_entries(config::KEY_CHANNELS, raw.channels, Channel::check),
            statuses: parse_entries(config::KEY_STATUSES, raw.statuses, Status::check),
            user,
            seeded: raw.seeded,
        };
        data.align_completion();
        data
    }

    /// Stamp ideas sitting in the terminal stage and unstamp the rest.
    /// Documents that never tracked completion get `updatedAt` as the stamp.
    fn align_completion(&mut self) {
        let terminal = terminal_status(&self.statuses).map(|s| s.id.clone());
        for idea in &mut self.ideas {
            let in_terminal = terminal.as_deref() == Some(idea.status_id.as_str());
            match (in_terminal, idea.completed_at.is_some()) {
                (true, false) => idea.completed_at = Some(idea.updated_at),
                (false, true) => idea.completed_at = None,
                _ => {}
            }
        }
    }
}

/// JSON-file backed adapter
#[derive(Clone)]
pub struct LocalStore {
    path: PathBuf,
    user_id: String,
    data: Arc<RwLock<LocalData>>,
    feed: ChangeFeed,
}

impl LocalStore {
    /// Open the document at `path`, starting empty when it does not exist
    pub async fn open(path: impl Into<PathBuf>, feed: ChangeFeed) -> Result<Self> {
        let path = path.into();

        let data = if fs::try_exists(&path).await? {
            let content = fs::read_to_string(&path).await?;
            let raw: RawDocument = serde_json::from_str(&content)?;
            LocalData::from_document(raw)
        } else {
            tracing::info!("Local store not found at {:?}, starting empty", path);
            LocalData::default()
        };

        Ok(Self {
            path,
            user_id: config::LOCAL_USER_ID.to_string(),
            data: Arc::new(RwLock::new(data)),
            feed,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to the document and write it out. The in-memory copy
    /// only changes once the file write succeeded.
    async fn apply<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut LocalData) -> Result<T>,
    {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        let out = change(&mut next)?;
        self.persist(&next).await?;
        *data = next;
        Ok(out)
    }

    /// [`Self::apply`], then tell listeners `resource` changed
    async fn write<T, F>(&self, resource: Resource, change: F) -> Result<T>
    where
        F: FnOnce(&mut LocalData) -> Result<T>,
    {
        let out = self.apply(change).await?;
        self.feed.notify(resource, &self.user_id);
        Ok(out)
    }

    async fn persist(&self, data: &LocalData) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

impl PersistenceAdapter for LocalStore {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn list_ideas(&self) -> Result<Vec<Idea>> {
        let mut ideas = self.data.read().await.ideas.clone();
        ideas.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(ideas)
    }

    async fn get_idea(&self, id: &str) -> Result<Option<Idea>> {
        Ok(self.data.read().await.ideas.iter().find(|i| i.id == id).cloned())
    }

    async fn insert_idea(&self, idea: &Idea) -> Result<()> {
        self.write(Resource::Ideas, |data| {
            if data.ideas.iter().any(|i| i.id == idea.id) {
                return Err(AppError::Validation(format!("Idea {} already exists", idea.id)));
            }
            data.ideas.push(idea.clone());
            Ok(())
        })
        .await
    }

    async fn update_idea(&self, idea: &Idea) -> Result<()> {
        self.write(Resource::Ideas, |data| {
            let slot = data
                .ideas
                .iter_mut()
                .find(|i| i.id == idea.id)
                .ok_or_else(|| AppError::IdeaNotFound(idea.id.clone()))?;
            *slot = idea.clone();
            Ok(())
        })
        .await
    }

    async fn delete_idea(&self, id: &str) -> Result<()> {
        if self.get_idea(id).await?.is_none() {
            return Ok(());
        }
        self.write(Resource::Ideas, |data| {
            data.ideas.retain(|i| i.id != id);
            Ok(())
        })
        .await
    }

    async fn purge_deleted_ideas(&self) -> Result<u64> {
        self.write(Resource::Ideas, |data| {
            let before = data.ideas.len();
            data.ideas.retain(|i| !i.is_deleted);
            Ok((before - data.ideas.len()) as u64)
        })
        .await
    }

    async fn list_channels(&self) -> Result<Vec<Channel>> {
        let mut channels = self.data.read().await.channels.clone();
        channels.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(channels)
    }

    async fn insert_channel(&self, channel: &Channel) -> Result<()> {
        self.write(Resource::Channels, |data| {
            data.channels.push(channel.clone());
            Ok(())
        })
        .await
    }

    async fn update_channel(&self, channel: &Channel) -> Result<()> {
        self.write(Resource::Channels, |data| {
            let slot = data
                .channels
                .iter_mut()
                .find(|c| c.id == channel.id)
                .ok_or_else(|| AppError::ChannelNotFound(channel.id.clone()))?;
            *slot = channel.clone();
            Ok(())
        })
        .await
    }

    async fn delete_channel(&self, id: &str) -> Result<()> {
        self.write(Resource::Channels, |data| {
            data.channels.retain(|c| c.id != id);
            Ok(())
        })
        .await
    }

    async fn list_statuses(&self) -> Result<Vec<Status>> {
        let mut statuses = self.data.read().await.statuses.clone();
        sort_statuses(&mut statuses);
        Ok(statuses)
    }

    async fn insert_status(&self, status: &Status) -> Result<()> {
        self.write(Resource::Statuses, |data| {
            data.statuses.push(status.clone());
            Ok(())
        })
        .await
    }

    async fn update_status(&self, status: &Status) -> Result<()> {
        self.write(Resource::Statuses, |data| {
            let slot = data
                .statuses
                .iter_mut()
                .find(|s| s.id == status.id)
                .ok_or_else(|| AppError::StatusNotFound(status.id.clone()))?;
            *slot = status.clone();
            Ok(())
        })
        .await
    }

    async fn delete_status(&self, id: &str) -> Result<()> {
        self.write(Resource::Statuses, |data| {
            data.statuses.retain(|s| s.id != id);
            Ok(())
        })
        .await
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let data = self.data.read().await;
        Ok(data.user.clone().filter(|u| u.id == user_id))
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<()> {
        self.write(Resource::Profiles, |data| {
            data.user = Some(profile.clone());
            Ok(())
        })
        .await
    }

    async fn replace_all(&self, replacement: &Dataset) -> Result<()> {
        self.apply(|data| {
            data.ideas = replacement.ideas.clone();
            data.channels = replacement.channels.clone();
            data.statuses = replacement.statuses.clone();
            if let Some(profile) = &replacement.profile {
                data.user = Some(profile.clone());
            }
            Ok(())
        })
        .await?;

        for resource in [Resource::Ideas, Resource::Channels, Resource::Statuses, Resource::Profiles] {
            self.feed.notify(resource, &self.user_id);
        }
        Ok(())
    }

    async fn is_seeded(&self) -> Result<bool> {
        Ok(self.data.read().await.seeded)
    }

    async fn mark_seeded(&self) -> Result<()> {
        self.apply(|data| {
            data.seeded = true;
            Ok(())
        })
        .await
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }
}
