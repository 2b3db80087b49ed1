//! Persistence adapter
//!
//! The store talks to its backing data through [`PersistenceAdapter`]: list,
//! insert, update, and delete per collection, scoped to one user, plus a
//! change feed that only tells listeners *that* something changed.
//!
//! Two backends implement it: the relational [`Repository`] and the
//! offline [`LocalStore`]. [`Backend`] dispatches between them.

pub mod local_store;

pub use local_store::LocalStore;

use crate::config;
use crate::database::{Channel, Idea, Repository, Status, UserProfile};
use crate::error::Result;
use chrono::{Duration, Utc};
use serde::Serialize;
use std::future::Future;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Collection named by a change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Resource {
    Ideas,
    Channels,
    Statuses,
    Profiles,
}

/// All four collections of one user, as restored from a backup
#[derive(Debug, Clone, Default, Serialize)]
pub struct Dataset {
    pub ideas: Vec<Idea>,
    pub channels: Vec<Channel>,
    pub statuses: Vec<Status>,
    pub profile: Option<UserProfile>,
}

/// "Something changed for this user, re-fetch"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub resource: Resource,
    pub user_id: String,
}

/// Broadcast channel shared by every adapter opened against the same data
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(config::CHANGE_FEED_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn notify(&self, resource: Resource, user_id: &str) {
        // No listeners is not an error
        let _ = self.tx.send(ChangeEvent {
            resource,
            user_id: user_id.to_string(),
        });
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Row-level access to one user's collections
pub trait PersistenceAdapter: Send + Sync {
    /// Identity every call is scoped to
    fn user_id(&self) -> &str;

    /// Ideas, newest first
    fn list_ideas(&self) -> impl Future<Output = Result<Vec<Idea>>> + Send;
    fn get_idea(&self, id: &str) -> impl Future<Output = Result<Option<Idea>>> + Send;
    fn insert_idea(&self, idea: &Idea) -> impl Future<Output = Result<()>> + Send;
    fn update_idea(&self, idea: &Idea) -> impl Future<Output = Result<()>> + Send;
    /// Removing an id that does not exist is a no-op
    fn delete_idea(&self, id: &str) -> impl Future<Output = Result<()>> + Send;
    /// Delete every idea flagged `is_deleted`, returning how many went
    fn purge_deleted_ideas(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Channels by name
    fn list_channels(&self) -> impl Future<Output = Result<Vec<Channel>>> + Send;
    fn insert_channel(&self, channel: &Channel) -> impl Future<Output = Result<()>> + Send;
    fn update_channel(&self, channel: &Channel) -> impl Future<Output = Result<()>> + Send;
    fn delete_channel(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Statuses in pipeline order
    fn list_statuses(&self) -> impl Future<Output = Result<Vec<Status>>> + Send;
    fn insert_status(&self, status: &Status) -> impl Future<Output = Result<()>> + Send;
    fn update_status(&self, status: &Status) -> impl Future<Output = Result<()>> + Send;
    fn delete_status(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    fn get_profile(&self, user_id: &str) -> impl Future<Output = Result<Option<UserProfile>>> + Send;
    fn upsert_profile(&self, profile: &UserProfile) -> impl Future<Output = Result<()>> + Send;

    /// Swap the user's ideas, channels, and statuses for `data` (and upsert
    /// its profile) in one step. On error nothing has changed.
    fn replace_all(&self, data: &Dataset) -> impl Future<Output = Result<()>> + Send;

    /// Whether the default pipeline was ever seeded for this user
    fn is_seeded(&self) -> impl Future<Output = Result<bool>> + Send;
    fn mark_seeded(&self) -> impl Future<Output = Result<()>> + Send;

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}

/// Seed the canonical pipeline and starter channels for a new account.
///
/// Runs once per account: empty collections are filled and the account is
/// marked seeded. Later loads leave the collections alone, even when the
/// user has since deleted everything in them.
pub async fn seed_defaults<A: PersistenceAdapter>(adapter: &A) -> Result<()> {
    if adapter.is_seeded().await? {
        return Ok(());
    }

    let now = Utc::now();

    if adapter.list_statuses().await?.is_empty() {
        tracing::info!("Seeding default pipeline for user {}", adapter.user_id());
        for (order, (name, color)) in config::DEFAULT_STATUSES.iter().enumerate() {
            let status = Status {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                color: color.to_string(),
                order: order as i64,
                created_at: now + Duration::milliseconds(order as i64),
            };
            adapter.insert_status(&status).await?;
        }
    }

    if adapter.list_channels().await?.is_empty() {
        tracing::info!("Seeding default channels for user {}", adapter.user_id());
        for (name, color, icon) in config::DEFAULT_CHANNELS {
            let channel = Channel {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                color: color.to_string(),
                icon: icon.to_string(),
                created_at: now,
            };
            adapter.insert_channel(&channel).await?;
        }
    }

    adapter.mark_seeded().await
}

/// The configured backend
#[derive(Clone)]
pub enum Backend {
    Sqlite(Repository),
    Local(LocalStore),
}

macro_rules! dispatch {
    ($self:ident, $inner:ident => $call:expr) => {
        match $self {
            Backend::Sqlite($inner) => $call,
            Backend::Local($inner) => $call,
        }
    };
}

impl PersistenceAdapter for Backend {
    fn user_id(&self) -> &str {
        dispatch!(self, b => b.user_id())
    }

    async fn list_ideas(&self) -> Result<Vec<Idea>> {
        dispatch!(self, b => b.list_ideas().await)
    }

    async fn get_idea(&self, id: &str) -> Result<Option<Idea>> {
        dispatch!(self, b => b.get_idea(id).await)
    }

    async fn insert_idea(&self, idea: &Idea) -> Result<()> {
        dispatch!(self, b => b.insert_idea(idea).await)
    }

    async fn update_idea(&self, idea: &Idea) -> Result<()> {
        dispatch!(self, b => b.update_idea(idea).await)
    }

    async fn delete_idea(&self, id: &str) -> Result<()> {
        dispatch!(self, b => b.delete_idea(id).await)
    }

    async fn purge_deleted_ideas(&self) -> Result<u64> {
        dispatch!(self, b => b.purge_deleted_ideas().await)
    }

    async fn list_channels(&self) -> Result<Vec<Channel>> {
        dispatch!(self, b => b.list_channels().await)
    }

    async fn insert_channel(&self, channel: &Channel) -> Result<()> {
        dispatch!(self, b => b.insert_channel(channel).await)
    }

    async fn update_channel(&self, channel: &Channel) -> Result<()> {
        dispatch!(self, b => b.update_channel(channel).await)
    }

    async fn delete_channel(&self, id: &str) -> Result<()> {
        dispatch!(self, b => b.delete_channel(id).await)
    }

    async fn list_statuses(&self) -> Result<Vec<Status>> {
        dispatch!(self, b => b.list_statuses().await)
    }

    async fn insert_status(&self, status: &Status) -> Result<()> {
        dispatch!(self, b => b.insert_status(status).await)
    }

    async fn update_status(&self, status: &Status) -> Result<()> {
        dispatch!(self, b => b.update_status(status).await)
    }

    async fn delete_status(&self, id: &str) -> Result<()> {
        dispatch!(self, b => b.delete_status(id).await)
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        dispatch!(self, b => b.get_profile(user_id).await)
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<()> {
        dispatch!(self, b => b.upsert_profile(profile).await)
    }

    async fn replace_all(&self, data: &Dataset) -> Result<()> {
        dispatch!(self, b => b.replace_all(data).await)
    }

    async fn is_seeded(&self) -> Result<bool> {
        dispatch!(self, b => b.is_seeded().await)
    }

    async fn mark_seeded(&self) -> Result<()> {
        dispatch!(self, b => b.mark_seeded().await)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        dispatch!(self, b => b.subscribe())
    }
}
