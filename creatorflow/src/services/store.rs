//! Domain store
//!
//! In-memory mirror of one user's ideas, channels, statuses, and profile,
//! plus the mutation entry points that change them. Every entry point does
//! its backend round trip and then reloads all four collections; nothing is
//! patched locally, so the mirror never holds state the backend lacks.

use crate::config;
use crate::database::{
    normalize_tags, terminal_status, Channel, ChannelDraft, Idea, IdeaDraft, ProfileDraft, Status,
    StatusDraft, UserProfile,
};
use crate::error::{AppError, Result};
use crate::storage::{seed_defaults, Dataset, PersistenceAdapter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// What happens to ideas that reference a channel or status being deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferencePolicy {
    /// Refuse while any idea (active or binned) still references it
    #[default]
    Block,
    /// Permanently delete the referencing ideas
    Cascade,
    /// Move the referencing ideas to the first remaining channel/status
    Reassign,
}

impl std::str::FromStr for ReferencePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "block" => Ok(ReferencePolicy::Block),
            "cascade" => Ok(ReferencePolicy::Cascade),
            "reassign" => Ok(ReferencePolicy::Reassign),
            other => Err(AppError::Validation(format!("Unknown reference policy: {}", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorePolicy {
    pub channel_deletion: ReferencePolicy,
    pub status_deletion: ReferencePolicy,
    pub sync_timeout: Duration,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            channel_deletion: ReferencePolicy::Block,
            status_deletion: ReferencePolicy::Block,
            sync_timeout: Duration::from_secs(config::DEFAULT_SYNC_TIMEOUT_SECS),
        }
    }
}

/// Everything the pages render from
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub ideas: Vec<Idea>,
    pub channels: Vec<Channel>,
    pub statuses: Vec<Status>,
    pub profile: Option<UserProfile>,
}

/// New `completed_at` after an idea moves into `new_status`.
///
/// `previous` is the record as persisted before this mutation. Entering the
/// terminal stage stamps `now`, leaving it clears the stamp, and any other
/// move keeps whatever the invariant requires.
pub fn completion_after_transition(
    previous: Option<&Idea>,
    new_status: &str,
    terminal: Option<&str>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let entering = terminal == Some(new_status);
    match previous {
        None => entering.then_some(now),
        Some(prev) => {
            let was_terminal = terminal == Some(prev.status_id.as_str());
            match (was_terminal, entering) {
                (false, true) => Some(now),
                (true, false) => None,
                (true, true) => prev.completed_at.or(Some(now)),
                (false, false) => None,
            }
        }
    }
}

/// Application state container for one signed-in user
pub struct Store<A> {
    adapter: A,
    policy: StorePolicy,
    snapshot: RwLock<Snapshot>,
    write_guard: Mutex<()>,
}

impl<A: PersistenceAdapter> Store<A> {
    pub fn new(adapter: A, policy: StorePolicy) -> Self {
        Self {
            adapter,
            policy,
            snapshot: RwLock::new(Snapshot::default()),
            write_guard: Mutex::new(()),
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn policy(&self) -> &StorePolicy {
        &self.policy
    }

    /// Copy of the current mirror
    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    /// Run one backend call under the sync timeout
    async fn call<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.policy.sync_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(self.policy.sync_timeout.as_secs())),
        }
    }

    /// Claim the single write slot; a second submit while one is in flight
    /// is rejected rather than queued.
    fn begin(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_guard.try_lock().map_err(|_| AppError::Busy)
    }

    /// Finish a mutation: map its failure to a user-facing action, reload on success
    async fn finish<T>(&self, action: &'static str, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                // Read failures are logged inside reload and leave the stale view
                let _ = self.reload().await;
                Ok(value)
            }
            Err(e) => {
                tracing::error!("{}: {}", action, e);
                Err(AppError::sync_failed(action, e))
            }
        }
    }

    async fn fetch_all(&self) -> Result<Snapshot> {
        self.call(seed_defaults(&self.adapter)).await?;

        let ideas = self.call(self.adapter.list_ideas()).await?;
        let channels = self.call(self.adapter.list_channels()).await?;
        let statuses = self.call(self.adapter.list_statuses()).await?;
        let profile = self
            .call(self.adapter.get_profile(self.adapter.user_id()))
            .await?;

        Ok(Snapshot {
            ideas,
            channels,
            statuses,
            profile,
        })
    }

    /// Re-fetch all four collections. On failure the previous mirror stays.
    pub async fn reload(&self) -> Result<()> {
        match self.fetch_all().await {
            Ok(snapshot) => {
                tracing::debug!(
                    "Reloaded {} ideas, {} channels, {} statuses",
                    snapshot.ideas.len(),
                    snapshot.channels.len(),
                    snapshot.statuses.len()
                );
                *self.snapshot.write().await = snapshot;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Reload failed, keeping previous data: {}", e);
                Err(AppError::sync_failed("Load failed", e))
            }
        }
    }

    /// Forget everything (sign-out)
    pub async fn clear(&self) {
        *self.snapshot.write().await = Snapshot::default();
        tracing::info!("Store cleared");
    }

    /// Reload whenever the backend reports a change for this user.
    ///
    /// Notifications caused by this store's own writes trigger one extra
    /// reload; that is harmless.
    pub fn watch_changes(self: &Arc<Self>) -> JoinHandle<()>
    where
        A: 'static,
    {
        let store = Arc::clone(self);
        let mut rx = store.adapter.subscribe();
        let user_id = store.adapter.user_id().to_string();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.user_id == user_id => {
                        tracing::debug!("Change notification for {:?}, reloading", event.resource);
                        let _ = store.reload().await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!("Missed {} change notifications, reloading", missed);
                        let _ = store.reload().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    // ===== Ideas =====

    /// Create (`draft.id == None`) or edit an idea
    pub async fn save_idea(&self, draft: IdeaDraft) -> Result<Idea> {
        let _guard = self.begin()?;

        let title = draft.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }
        if title.chars().count() > config::MAX_TITLE_LENGTH {
            return Err(AppError::Validation(format!(
                "Title is longer than {} characters",
                config::MAX_TITLE_LENGTH
            )));
        }

        let result = self.call(self.write_idea(draft, title)).await;
        let idea = self.finish("Save failed", result).await?;
        tracing::info!("Saved idea: {}", idea.id);
        Ok(idea)
    }

    async fn write_idea(&self, draft: IdeaDraft, title: String) -> Result<Idea> {
        let channels = self.adapter.list_channels().await?;
        let statuses = self.adapter.list_statuses().await?;
        let terminal = terminal_status(&statuses).map(|s| s.id.clone());
        let now = Utc::now();

        let previous = match &draft.id {
            Some(id) => Some(
                self.adapter
                    .get_idea(id)
                    .await?
                    .ok_or_else(|| AppError::IdeaNotFound(id.clone()))?,
            ),
            None => None,
        };

        let channel_id = match (&draft.channel_id, &previous) {
            (Some(id), _) => {
                if !channels.iter().any(|c| &c.id == id) {
                    return Err(AppError::Validation(format!("Unknown channel: {}", id)));
                }
                id.clone()
            }
            (None, Some(prev)) => prev.channel_id.clone(),
            (None, None) => channels
                .first()
                .map(|c| c.id.clone())
                .ok_or_else(|| AppError::Validation("Create a channel first".to_string()))?,
        };

        let status_id = match (&draft.status_id, &previous) {
            (Some(id), _) => {
                if !statuses.iter().any(|s| &s.id == id) {
                    return Err(AppError::Validation(format!("Unknown status: {}", id)));
                }
                id.clone()
            }
            (None, Some(prev)) => prev.status_id.clone(),
            (None, None) => statuses
                .first()
                .map(|s| s.id.clone())
                .ok_or_else(|| AppError::Validation("Create a status first".to_string()))?,
        };

        let completed_at =
            completion_after_transition(previous.as_ref(), &status_id, terminal.as_deref(), now);

        let idea = Idea {
            id: previous
                .as_ref()
                .map(|p| p.id.clone())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            title,
            description: draft.description.trim().to_string(),
            notes: draft.notes.filter(|n| !n.trim().is_empty()),
            channel_id,
            status_id,
            priority: draft.priority,
            tags: normalize_tags(&draft.tags),
            scheduled_date: draft.scheduled_date,
            created_at: previous.as_ref().map(|p| p.created_at).unwrap_or(now),
            updated_at: now,
            completed_at,
            is_deleted: previous.as_ref().map(|p| p.is_deleted).unwrap_or(false),
        };

        if previous.is_some() {
            self.adapter.update_idea(&idea).await?;
        } else {
            self.adapter.insert_idea(&idea).await?;
        }
        Ok(idea)
    }

    async fn set_deleted_flag(&self, id: &str, deleted: bool) -> Result<()> {
        let mut idea = self
            .adapter
            .get_idea(id)
            .await?
            .ok_or_else(|| AppError::IdeaNotFound(id.to_string()))?;
        idea.is_deleted = deleted;
        self.adapter.update_idea(&idea).await
    }

    /// Soft delete: hide from active views, keep in the bin
    pub async fn move_to_bin(&self, id: &str) -> Result<()> {
        let _guard = self.begin()?;
        let result = self.call(self.set_deleted_flag(id, true)).await;
        self.finish("Move to bin failed", result).await?;
        tracing::info!("Moved idea to bin: {}", id);
        Ok(())
    }

    /// Bring a binned idea back; nothing else about it changes
    pub async fn restore(&self, id: &str) -> Result<()> {
        let _guard = self.begin()?;
        let result = self.call(self.set_deleted_flag(id, false)).await;
        self.finish("Restore failed", result).await?;
        tracing::info!("Restored idea: {}", id);
        Ok(())
    }

    /// Permanent delete. Deleting an id that is already gone succeeds.
    pub async fn delete_forever(&self, id: &str) -> Result<()> {
        let _guard = self.begin()?;
        let result = self.call(self.adapter.delete_idea(id)).await;
        self.finish("Delete failed", result).await?;
        tracing::info!("Permanently deleted idea: {}", id);
        Ok(())
    }

    /// Permanently delete every binned idea
    pub async fn empty_bin(&self) -> Result<u64> {
        let _guard = self.begin()?;
        let result = self.call(self.adapter.purge_deleted_ideas()).await;
        let purged = self.finish("Empty bin failed", result).await?;
        tracing::info!("Emptied bin: {} ideas removed", purged);
        Ok(purged)
    }

    // ===== Channels =====

    pub async fn save_channel(&self, draft: ChannelDraft) -> Result<Channel> {
        let _guard = self.begin()?;

        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("Channel name is required".to_string()));
        }

        let result = self
            .call(async {
                match &draft.id {
                    Some(id) => {
                        let mut channel = self
                            .adapter
                            .list_channels()
                            .await?
                            .into_iter()
                            .find(|c| &c.id == id)
                            .ok_or_else(|| AppError::ChannelNotFound(id.clone()))?;
                        channel.name = name;
                        if let Some(color) = draft.color.clone() {
                            channel.color = color;
                        }
                        if let Some(icon) = draft.icon.clone() {
                            channel.icon = icon;
                        }
                        self.adapter.update_channel(&channel).await?;
                        Ok(channel)
                    }
                    None => {
                        let channel = Channel {
                            id: Uuid::new_v4().to_string(),
                            name,
                            color: draft
                                .color
                                .clone()
                                .unwrap_or_else(|| config::DEFAULT_CHANNEL_COLOR.to_string()),
                            icon: draft
                                .icon
                                .clone()
                                .unwrap_or_else(|| config::DEFAULT_CHANNEL_ICON.to_string()),
                            created_at: Utc::now(),
                        };
                        self.adapter.insert_channel(&channel).await?;
                        Ok(channel)
                    }
                }
            })
            .await;

        let channel = self.finish("Save channel failed", result).await?;
        tracing::info!("Saved channel: {} ({})", channel.name, channel.id);
        Ok(channel)
    }

    pub async fn delete_channel(&self, id: &str) -> Result<()> {
        let _guard = self.begin()?;
        let result = self.call(self.remove_channel(id)).await;
        self.finish("Delete channel failed", result).await?;
        tracing::info!("Deleted channel: {}", id);
        Ok(())
    }

    async fn remove_channel(&self, id: &str) -> Result<()> {
        let channels = self.adapter.list_channels().await?;
        let Some(channel) = channels.iter().find(|c| c.id == id) else {
            return Ok(());
        };

        let referencing: Vec<Idea> = self
            .adapter
            .list_ideas()
            .await?
            .into_iter()
            .filter(|i| i.channel_id == id)
            .collect();

        if !referencing.is_empty() {
            let label = format!("Channel \"{}\"", channel.name);
            match self.policy.channel_deletion {
                ReferencePolicy::Block => {
                    return Err(AppError::StillReferenced(label, referencing.len()));
                }
                ReferencePolicy::Cascade => {
                    for idea in &referencing {
                        self.adapter.delete_idea(&idea.id).await?;
                    }
                }
                ReferencePolicy::Reassign => {
                    let target = channels
                        .iter()
                        .find(|c| c.id != id)
                        .ok_or_else(|| AppError::StillReferenced(label, referencing.len()))?;
                    for mut idea in referencing {
                        idea.channel_id = target.id.clone();
                        idea.updated_at = Utc::now();
                        self.adapter.update_idea(&idea).await?;
                    }
                }
            }
        }

        self.adapter.delete_channel(id).await
    }

    // ===== Statuses =====

    pub async fn save_status(&self, draft: StatusDraft) -> Result<Status> {
        let _guard = self.begin()?;

        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("Status name is required".to_string()));
        }

        let result = self
            .call(async {
                let statuses = self.adapter.list_statuses().await?;
                match &draft.id {
                    Some(id) => {
                        let mut status = statuses
                            .into_iter()
                            .find(|s| &s.id == id)
                            .ok_or_else(|| AppError::StatusNotFound(id.clone()))?;
                        status.name = name;
                        if let Some(color) = draft.color.clone() {
                            status.color = color;
                        }
                        if let Some(order) = draft.order {
                            status.order = order;
                        }
                        self.adapter.update_status(&status).await?;
                        self.align_completion().await?;
                        Ok(status)
                    }
                    None => {
                        let order = draft.order.unwrap_or_else(|| {
                            statuses.iter().map(|s| s.order).max().map_or(0, |max| max + 1)
                        });
                        let status = Status {
                            id: Uuid::new_v4().to_string(),
                            name,
                            color: draft
                                .color
                                .clone()
                                .unwrap_or_else(|| config::DEFAULT_STATUS_COLOR.to_string()),
                            order,
                            created_at: Utc::now(),
                        };
                        self.adapter.insert_status(&status).await?;
                        self.align_completion().await?;
                        Ok(status)
                    }
                }
            })
            .await;

        let status = self.finish("Save status failed", result).await?;
        tracing::info!("Saved status: {} ({})", status.name, status.id);
        Ok(status)
    }

    pub async fn delete_status(&self, id: &str) -> Result<()> {
        let _guard = self.begin()?;
        let result = self.call(self.remove_status(id)).await;
        self.finish("Delete status failed", result).await?;
        tracing::info!("Deleted status: {}", id);
        Ok(())
    }

    async fn remove_status(&self, id: &str) -> Result<()> {
        let statuses = self.adapter.list_statuses().await?;
        let Some(status) = statuses.iter().find(|s| s.id == id) else {
            return Ok(());
        };

        let referencing: Vec<Idea> = self
            .adapter
            .list_ideas()
            .await?
            .into_iter()
            .filter(|i| i.status_id == id)
            .collect();

        if !referencing.is_empty() {
            let label = format!("Status \"{}\"", status.name);
            match self.policy.status_deletion {
                ReferencePolicy::Block => {
                    return Err(AppError::StillReferenced(label, referencing.len()));
                }
                ReferencePolicy::Cascade => {
                    for idea in &referencing {
                        self.adapter.delete_idea(&idea.id).await?;
                    }
                }
                ReferencePolicy::Reassign => {
                    let remaining: Vec<Status> =
                        statuses.iter().filter(|s| s.id != id).cloned().collect();
                    let target = remaining
                        .first()
                        .map(|s| s.id.clone())
                        .ok_or_else(|| AppError::StillReferenced(label, referencing.len()))?;
                    let terminal = terminal_status(&remaining).map(|s| s.id.clone());
                    let now = Utc::now();
                    for mut idea in referencing {
                        idea.completed_at = completion_after_transition(
                            Some(&idea),
                            &target,
                            terminal.as_deref(),
                            now,
                        );
                        idea.status_id = target.clone();
                        idea.updated_at = now;
                        self.adapter.update_idea(&idea).await?;
                    }
                }
            }
        }

        self.adapter.delete_status(id).await?;
        self.align_completion().await?;
        Ok(())
    }

    /// Rewrite pipeline positions so `ids[n]` gets order `n`.
    /// `ids` must name every status exactly once.
    pub async fn reorder_statuses(&self, ids: &[String]) -> Result<()> {
        let _guard = self.begin()?;

        let result = self
            .call(async {
                let statuses = self.adapter.list_statuses().await?;

                let mut requested: Vec<&str> = ids.iter().map(String::as_str).collect();
                requested.sort_unstable();
                requested.dedup();
                let mut existing: Vec<&str> = statuses.iter().map(|s| s.id.as_str()).collect();
                existing.sort_unstable();
                if requested.len() != ids.len() || requested != existing {
                    return Err(AppError::Validation(
                        "Reorder must list every status exactly once".to_string(),
                    ));
                }

                for (position, id) in ids.iter().enumerate() {
                    if let Some(status) = statuses.iter().find(|s| &s.id == id) {
                        if status.order != position as i64 {
                            let mut moved = status.clone();
                            moved.order = position as i64;
                            self.adapter.update_status(&moved).await?;
                        }
                    }
                }
                self.align_completion().await
            })
            .await;

        self.finish("Reorder failed", result).await?;
        tracing::info!("Reordered {} statuses", ids.len());
        Ok(())
    }

    /// Re-establish "stamped exactly when in the terminal stage" after the
    /// pipeline itself changed. Ideas that just became terminal are stamped
    /// with the current time; ideas whose stage stopped being terminal lose
    /// their stamp. Returns how many ideas changed.
    async fn align_completion(&self) -> Result<usize> {
        let statuses = self.adapter.list_statuses().await?;
        let terminal = terminal_status(&statuses).map(|s| s.id.clone());
        let now = Utc::now();

        let mut changed = 0;
        for mut idea in self.adapter.list_ideas().await? {
            let in_terminal = terminal.as_deref() == Some(idea.status_id.as_str());
            let completed_at = match (in_terminal, idea.completed_at) {
                (true, None) => Some(now),
                (false, Some(_)) => None,
                _ => continue,
            };
            idea.completed_at = completed_at;
            self.adapter.update_idea(&idea).await?;
            changed += 1;
        }

        if changed > 0 {
            tracing::debug!("Realigned completion on {} ideas", changed);
        }
        Ok(changed)
    }

    // ===== Backups =====

    /// Replace everything the user has with `data`, as one guarded write.
    /// The profile is re-keyed to this store's user.
    pub async fn replace_all(&self, mut data: Dataset) -> Result<Dataset> {
        let _guard = self.begin()?;

        if let Some(profile) = data.profile.as_mut() {
            profile.id = self.adapter.user_id().to_string();
        }

        let result = self
            .call(async {
                self.adapter.replace_all(&data).await?;
                self.align_completion().await
            })
            .await;
        self.finish("Restore backup failed", result).await?;
        tracing::info!("Replaced all data: {} ideas", data.ideas.len());
        Ok(data)
    }

    // ===== Profile =====

    pub async fn update_profile(&self, draft: ProfileDraft) -> Result<UserProfile> {
        let _guard = self.begin()?;

        let display_name = draft.display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(AppError::Validation("Display name is required".to_string()));
        }
        let avatar_url = draft.avatar_url.filter(|a| !a.trim().is_empty());
        if avatar_url
            .as_ref()
            .is_some_and(|a| a.len() > config::MAX_AVATAR_URL_LENGTH)
        {
            return Err(AppError::Validation("Avatar image is too large".to_string()));
        }

        let profile = UserProfile {
            id: self.adapter.user_id().to_string(),
            display_name,
            avatar_url,
            updated_at: Utc::now(),
        };

        let result = self.call(self.adapter.upsert_profile(&profile)).await;
        self.finish("Profile update failed", result).await?;
        tracing::info!("Updated profile: {}", profile.id);
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{initialize_database, Priority, Repository};
    use crate::storage::ChangeFeed;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_store(policy: StorePolicy) -> Store<Repository> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        initialize_database(&pool).await.unwrap();

        let store = Store::new(Repository::new(pool, "user-1", ChangeFeed::new()), policy);
        store.reload().await.unwrap();
        store
    }

    fn status_id(snapshot: &Snapshot, name: &str) -> String {
        snapshot
            .statuses
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.id.clone())
            .unwrap()
    }

    fn draft(title: &str) -> IdeaDraft {
        IdeaDraft {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_reload_seeds_defaults() {
        let store = create_test_store(StorePolicy::default()).await;
        let snapshot = store.snapshot().await;

        assert_eq!(snapshot.statuses.len(), 5);
        assert_eq!(snapshot.channels.len(), 2);
        assert_eq!(snapshot.statuses.last().unwrap().name, "Upload");
    }

    #[tokio::test]
    async fn test_new_idea_defaults_to_first_channel_and_status() {
        let store = create_test_store(StorePolicy::default()).await;

        let idea = store.save_idea(draft("Unboxing Video")).await.unwrap();
        let snapshot = store.snapshot().await;

        assert_eq!(idea.channel_id, snapshot.channels[0].id);
        assert_eq!(idea.status_id, snapshot.statuses[0].id);
        assert_eq!(idea.priority, Priority::Medium);
        assert!(idea.completed_at.is_none());
        assert_eq!(snapshot.ideas.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_title_is_rejected_without_write() {
        let store = create_test_store(StorePolicy::default()).await;

        let result = store.save_idea(draft("   ")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(store.snapshot().await.ideas.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_channel_is_rejected() {
        let store = create_test_store(StorePolicy::default()).await;

        let result = store
            .save_idea(IdeaDraft {
                channel_id: Some("nope".to_string()),
                ..draft("Orphan")
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_completion_tracks_terminal_status() {
        let store = create_test_store(StorePolicy::default()).await;
        let snapshot = store.snapshot().await;
        let upload = status_id(&snapshot, "Upload");
        let edit = status_id(&snapshot, "Edit");

        let idea = store.save_idea(draft("Unboxing Video")).await.unwrap();

        let mut edit_draft = IdeaDraft::from(&idea);
        edit_draft.status_id = Some(upload.clone());
        let uploaded = store.save_idea(edit_draft).await.unwrap();
        let stamped = uploaded.completed_at.expect("completed_at set on upload");

        // Saving again in the terminal stage keeps the original stamp
        let mut retitle = IdeaDraft::from(&uploaded);
        retitle.title = "Unboxing Video (final)".to_string();
        let retitled = store.save_idea(retitle).await.unwrap();
        assert_eq!(retitled.completed_at, Some(stamped));

        let mut back = IdeaDraft::from(&retitled);
        back.status_id = Some(edit);
        let reopened = store.save_idea(back).await.unwrap();
        assert!(reopened.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_creating_in_terminal_status_stamps_completion() {
        let store = create_test_store(StorePolicy::default()).await;
        let upload = status_id(&store.snapshot().await, "Upload");

        let idea = store
            .save_idea(IdeaDraft {
                status_id: Some(upload),
                ..draft("Already live")
            })
            .await
            .unwrap();
        assert!(idea.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_bin_and_restore_touch_only_the_flag() {
        let store = create_test_store(StorePolicy::default()).await;
        let idea = store.save_idea(draft("Binned")).await.unwrap();

        store.move_to_bin(&idea.id).await.unwrap();
        let binned = store.snapshot().await.ideas[0].clone();
        assert!(binned.is_deleted);

        store.restore(&idea.id).await.unwrap();
        let restored = store.snapshot().await.ideas[0].clone();
        assert_eq!(restored, idea);
    }

    #[tokio::test]
    async fn test_delete_forever_is_idempotent() {
        let store = create_test_store(StorePolicy::default()).await;
        let idea = store.save_idea(draft("Gone")).await.unwrap();

        store.delete_forever(&idea.id).await.unwrap();
        store.delete_forever(&idea.id).await.unwrap();
        assert!(store.snapshot().await.ideas.is_empty());
    }

    #[tokio::test]
    async fn test_empty_bin_removes_only_binned() {
        let store = create_test_store(StorePolicy::default()).await;
        let a = store.save_idea(draft("A")).await.unwrap();
        let b = store.save_idea(draft("B")).await.unwrap();
        store.save_idea(draft("C")).await.unwrap();

        store.move_to_bin(&a.id).await.unwrap();
        store.move_to_bin(&b.id).await.unwrap();

        assert_eq!(store.empty_bin().await.unwrap(), 2);
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.ideas.len(), 1);
        assert_eq!(snapshot.ideas[0].title, "C");
    }

    #[tokio::test]
    async fn test_move_missing_idea_reports_action() {
        let store = create_test_store(StorePolicy::default()).await;

        let err = store.move_to_bin("missing").await.unwrap_err();
        match err {
            AppError::SyncFailed { action, .. } => assert_eq!(action, "Move to bin failed"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_channel_delete_blocked_while_referenced() {
        let store = create_test_store(StorePolicy::default()).await;
        let idea = store.save_idea(draft("Keeps channel alive")).await.unwrap();

        let result = store.delete_channel(&idea.channel_id).await;
        assert!(matches!(result, Err(AppError::StillReferenced(_, 1))));
        assert_eq!(store.snapshot().await.channels.len(), 2);
    }

    #[tokio::test]
    async fn test_channel_delete_cascade() {
        let store = create_test_store(StorePolicy {
            channel_deletion: ReferencePolicy::Cascade,
            ..Default::default()
        })
        .await;
        let idea = store.save_idea(draft("Goes with channel")).await.unwrap();

        store.delete_channel(&idea.channel_id).await.unwrap();
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.channels.len(), 1);
        assert!(snapshot.ideas.is_empty());
    }

    #[tokio::test]
    async fn test_channel_delete_reassign() {
        let store = create_test_store(StorePolicy {
            channel_deletion: ReferencePolicy::Reassign,
            ..Default::default()
        })
        .await;
        let idea = store.save_idea(draft("Moves channel")).await.unwrap();

        store.delete_channel(&idea.channel_id).await.unwrap();
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.channels.len(), 1);
        assert_eq!(snapshot.ideas[0].channel_id, snapshot.channels[0].id);
    }

    #[tokio::test]
    async fn test_status_reassign_recomputes_completion() {
        let store = create_test_store(StorePolicy {
            status_deletion: ReferencePolicy::Reassign,
            ..Default::default()
        })
        .await;
        let upload = status_id(&store.snapshot().await, "Upload");
        let idea = store
            .save_idea(IdeaDraft {
                status_id: Some(upload.clone()),
                ..draft("Live")
            })
            .await
            .unwrap();
        assert!(idea.completed_at.is_some());

        store.delete_status(&upload).await.unwrap();
        let snapshot = store.snapshot().await;
        let moved = &snapshot.ideas[0];
        assert_eq!(moved.status_id, snapshot.statuses[0].id);
        assert!(moved.completed_at.is_none());
    }

    async fn idea_in(store: &Store<Repository>, status: &str, title: &str) -> Idea {
        let status_id = status_id(&store.snapshot().await, status);
        store
            .save_idea(IdeaDraft {
                status_id: Some(status_id),
                ..draft(title)
            })
            .await
            .unwrap()
    }

    fn stored(snapshot: &Snapshot, id: &str) -> Idea {
        snapshot.ideas.iter().find(|i| i.id == id).cloned().unwrap()
    }

    #[tokio::test]
    async fn test_new_status_appends_after_terminal() {
        let store = create_test_store(StorePolicy::default()).await;
        let shipped = idea_in(&store, "Upload", "Shipped").await;
        assert!(shipped.completed_at.is_some());

        let status = store
            .save_status(StatusDraft {
                name: "Promote".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(status.order, 5);

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.statuses.last().unwrap().name, "Promote");
        // Upload is no longer the last stage
        assert!(stored(&snapshot, &shipped.id).completed_at.is_none());
    }

    #[tokio::test]
    async fn test_reorder_moves_completion_with_terminal() {
        let store = create_test_store(StorePolicy::default()).await;
        let shipped = idea_in(&store, "Upload", "Shipped").await;
        let editing = idea_in(&store, "Edit", "Editing").await;
        assert!(editing.completed_at.is_none());

        // Swap Edit and Upload so Edit becomes last
        let mut ids: Vec<String> = store
            .snapshot()
            .await
            .statuses
            .iter()
            .map(|s| s.id.clone())
            .collect();
        ids.swap(3, 4);
        store.reorder_statuses(&ids).await.unwrap();

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.statuses.last().unwrap().name, "Edit");
        assert!(stored(&snapshot, &editing.id).completed_at.is_some());
        assert!(stored(&snapshot, &shipped.id).completed_at.is_none());
    }

    #[tokio::test]
    async fn test_deleting_unused_terminal_promotes_previous_stage() {
        let store = create_test_store(StorePolicy::default()).await;
        let editing = idea_in(&store, "Edit", "Editing").await;
        let upload = status_id(&store.snapshot().await, "Upload");

        store.delete_status(&upload).await.unwrap();

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.statuses.last().unwrap().name, "Edit");
        assert!(stored(&snapshot, &editing.id).completed_at.is_some());
    }

    #[tokio::test]
    async fn test_deleted_channels_are_not_reseeded() {
        let store = create_test_store(StorePolicy::default()).await;

        for channel in store.snapshot().await.channels {
            store.delete_channel(&channel.id).await.unwrap();
        }
        store.reload().await.unwrap();

        let snapshot = store.snapshot().await;
        assert!(snapshot.channels.is_empty());
        let result = store.save_idea(draft("Nowhere to go")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_replace_all_rekeys_profile_and_aligns_completion() {
        let store = create_test_store(StorePolicy::default()).await;
        store.save_idea(draft("Replaced")).await.unwrap();

        let mut data = store.snapshot().await;
        let upload = status_id(&data, "Upload");
        let now = Utc::now();
        let restored = Idea {
            id: "restored".to_string(),
            title: "From backup".to_string(),
            description: String::new(),
            notes: None,
            channel_id: data.channels[0].id.clone(),
            status_id: upload,
            priority: Priority::Low,
            tags: Vec::new(),
            scheduled_date: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            is_deleted: false,
        };
        let dataset = Dataset {
            ideas: vec![restored],
            channels: std::mem::take(&mut data.channels),
            statuses: std::mem::take(&mut data.statuses),
            profile: Some(UserProfile {
                id: "someone-else".to_string(),
                display_name: "Old name".to_string(),
                avatar_url: None,
                updated_at: now,
            }),
        };

        store.replace_all(dataset).await.unwrap();

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.ideas.len(), 1);
        assert!(snapshot.ideas[0].completed_at.is_some());
        let profile = snapshot.profile.unwrap();
        assert_eq!(profile.id, "user-1");
        assert_eq!(profile.display_name, "Old name");
    }

    #[tokio::test]
    async fn test_replace_all_respects_write_guard() {
        let store = create_test_store(StorePolicy::default()).await;

        let _held = store.begin().unwrap();
        let result = store.replace_all(Dataset::default()).await;
        assert!(matches!(result, Err(AppError::Busy)));
    }

    #[tokio::test]
    async fn test_reorder_statuses() {
        let store = create_test_store(StorePolicy::default()).await;
        let mut ids: Vec<String> = store
            .snapshot()
            .await
            .statuses
            .iter()
            .map(|s| s.id.clone())
            .collect();
        ids.reverse();

        store.reorder_statuses(&ids).await.unwrap();
        let names: Vec<String> = store
            .snapshot()
            .await
            .statuses
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Upload", "Edit", "Record", "Script Write", "Initial"]);

        let partial = store.reorder_statuses(&ids[..2]).await;
        assert!(matches!(partial, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let store = create_test_store(StorePolicy::default()).await;

        let profile = store
            .update_profile(ProfileDraft {
                display_name: "  Sam  ".to_string(),
                avatar_url: Some("data:image/png;base64,AAAA".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(profile.display_name, "Sam");
        assert_eq!(store.snapshot().await.profile.unwrap().id, "user-1");
    }

    #[tokio::test]
    async fn test_second_write_while_busy_is_rejected() {
        let store = create_test_store(StorePolicy::default()).await;

        let _held = store.begin().unwrap();
        let result = store.save_idea(draft("Double submit")).await;
        assert!(matches!(result, Err(AppError::Busy)));
    }

    #[tokio::test]
    async fn test_clear_resets_snapshot() {
        let store = create_test_store(StorePolicy::default()).await;
        store.save_idea(draft("Soon forgotten")).await.unwrap();

        store.clear().await;
        let snapshot = store.snapshot().await;
        assert!(snapshot.ideas.is_empty());
        assert!(snapshot.statuses.is_empty());
    }

    #[tokio::test]
    async fn test_watch_changes_picks_up_other_writers() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        initialize_database(&pool).await.unwrap();
        let feed = ChangeFeed::new();

        let phone = Arc::new(Store::new(
            Repository::new(pool.clone(), "user-1", feed.clone()),
            StorePolicy::default(),
        ));
        let laptop = Store::new(Repository::new(pool, "user-1", feed), StorePolicy::default());
        phone.reload().await.unwrap();
        laptop.reload().await.unwrap();

        let watcher = phone.watch_changes();
        laptop.save_idea(draft("From the laptop")).await.unwrap();

        let mut seen = false;
        for _ in 0..50 {
            if phone.snapshot().await.ideas.len() == 1 {
                seen = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        watcher.abort();
        assert!(seen, "phone never saw the laptop's idea");
    }

    #[test]
    fn test_completion_rules() {
        let now = Utc::now();
        let earlier = now - chrono::Duration::days(1);
        let mut prev = Idea {
            id: "i".into(),
            title: "t".into(),
            description: String::new(),
            notes: None,
            channel_id: "c".into(),
            status_id: "edit".into(),
            priority: Priority::Low,
            tags: vec![],
            scheduled_date: None,
            created_at: earlier,
            updated_at: earlier,
            completed_at: None,
            is_deleted: false,
        };

        assert_eq!(completion_after_transition(Some(&prev), "upload", Some("upload"), now), Some(now));
        assert_eq!(completion_after_transition(Some(&prev), "record", Some("upload"), now), None);

        prev.status_id = "upload".into();
        prev.completed_at = Some(earlier);
        assert_eq!(completion_after_transition(Some(&prev), "upload", Some("upload"), now), Some(earlier));
        assert_eq!(completion_after_transition(Some(&prev), "edit", Some("upload"), now), None);
        assert_eq!(completion_after_transition(None, "initial", Some("upload"), now), None);
        assert_eq!(completion_after_transition(None, "anything", None, now), None);
    }
}
