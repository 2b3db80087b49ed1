//! Idea-related commands
//!
//! Capture and edit ideas, plus the read views the Home, Channels, and
//! Calendar pages are built from.

use super::{resolve_channel_id, resolve_idea_id, resolve_status_id};
use crate::app::AppState;
use crate::config;
use crate::database::{Idea, IdeaDraft, Priority};
use crate::error::{AppError, Result};
use crate::services::{ChannelFolder, IdeaDetail, StatusFolder};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeSet;

/// Partial edit of an idea; `None` leaves a field as it is.
/// Channel and status accept an id or a name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdeaChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub channel: Option<String>,
    pub status: Option<String>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    /// `Some(None)` clears the date
    pub scheduled_date: Option<Option<NaiveDate>>,
}

impl IdeaChanges {
    fn apply(self, draft: &mut IdeaDraft) {
        if let Some(title) = self.title {
            draft.title = title;
        }
        if let Some(description) = self.description {
            draft.description = description;
        }
        if let Some(notes) = self.notes {
            draft.notes = Some(notes);
        }
        if let Some(priority) = self.priority {
            draft.priority = priority;
        }
        if let Some(tags) = self.tags {
            draft.tags = tags;
        }
        if let Some(date) = self.scheduled_date {
            draft.scheduled_date = date;
        }
    }
}

/// Create a new idea. Missing channel/status default to the first ones.
pub async fn create_idea(state: &AppState, changes: IdeaChanges) -> Result<Idea> {
    let snapshot = state.store.snapshot().await;

    let mut draft = IdeaDraft {
        channel_id: changes
            .channel
            .as_deref()
            .map(|c| resolve_channel_id(&snapshot, c))
            .transpose()?,
        status_id: changes
            .status
            .as_deref()
            .map(|s| resolve_status_id(&snapshot, s))
            .transpose()?,
        ..Default::default()
    };
    changes.apply(&mut draft);

    state.store.save_idea(draft).await
}

pub async fn update_idea(state: &AppState, id: &str, changes: IdeaChanges) -> Result<Idea> {
    let snapshot = state.store.snapshot().await;
    let id = resolve_idea_id(&snapshot, id)?;

    let mut draft = snapshot
        .find_idea(&id)
        .map(IdeaDraft::from)
        .unwrap_or_default();
    draft.id = Some(id);
    if let Some(channel) = changes.channel.as_deref() {
        draft.channel_id = Some(resolve_channel_id(&snapshot, channel)?);
    }
    if let Some(status) = changes.status.as_deref() {
        draft.status_id = Some(resolve_status_id(&snapshot, status)?);
    }
    changes.apply(&mut draft);

    state.store.save_idea(draft).await
}

pub async fn get_idea_detail(state: &AppState, id: &str) -> Result<IdeaDetail> {
    let snapshot = state.store.snapshot().await;
    let id = resolve_idea_id(&snapshot, id)?;
    snapshot
        .idea_detail(&id)
        .ok_or(AppError::IdeaNotFound(id))
}

/// Active ideas, optionally narrowed to one status and/or channel
pub async fn list_ideas(
    state: &AppState,
    status: Option<&str>,
    channel: Option<&str>,
) -> Result<Vec<Idea>> {
    let snapshot = state.store.snapshot().await;
    let status_id = status.map(|s| resolve_status_id(&snapshot, s)).transpose()?;

    let ideas = match channel {
        Some(channel) => {
            let channel_id = resolve_channel_id(&snapshot, channel)?;
            snapshot.ideas_in_channel(&channel_id, status_id.as_deref())
        }
        None => match status_id.as_deref() {
            Some(status_id) => snapshot.ideas_in_status(status_id),
            None => snapshot.active_ideas().collect(),
        },
    };

    Ok(ideas.into_iter().cloned().collect())
}

pub async fn search_ideas(state: &AppState, query: &str) -> Result<Vec<Idea>> {
    let snapshot = state.store.snapshot().await;
    Ok(snapshot.search(query).into_iter().cloned().collect())
}

/// Home page: pipeline folders with counts, plus the newest ideas
pub async fn get_home(state: &AppState) -> Result<(Vec<StatusFolder>, Vec<Idea>)> {
    let snapshot = state.store.snapshot().await;
    let recent = snapshot
        .recent_activity(config::RECENT_ACTIVITY_COUNT)
        .into_iter()
        .cloned()
        .collect();
    Ok((snapshot.status_folders(), recent))
}

pub async fn get_channel_folders(state: &AppState) -> Result<Vec<ChannelFolder>> {
    Ok(state.store.snapshot().await.channel_folders())
}

pub async fn get_scheduled_on(state: &AppState, date: NaiveDate) -> Result<Vec<Idea>> {
    let snapshot = state.store.snapshot().await;
    Ok(snapshot.scheduled_on(date).into_iter().cloned().collect())
}

pub async fn get_scheduled_days(state: &AppState, year: i32, month: u32) -> Result<BTreeSet<u32>> {
    Ok(state
        .store
        .snapshot()
        .await
        .scheduled_days_in_month(year, month))
}
