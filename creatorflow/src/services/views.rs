//! Read-only projections over a store snapshot
//!
//! Everything the Home, Channels, Calendar, and detail pages show is derived
//! here. Active lists never include binned ideas.

use super::store::Snapshot;
use crate::config;
use crate::database::{Channel, Idea, Status};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeSet;

/// A status with the number of active ideas in it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusFolder {
    pub status: Status,
    pub count: usize,
}

/// A channel with the number of active ideas in it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelFolder {
    pub channel: Channel,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelLabel {
    pub name: String,
    pub color: String,
}

/// An idea joined with what it references
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaDetail {
    pub idea: Idea,
    pub channel: ChannelLabel,
    pub status: Option<Status>,
    pub is_completed: bool,
}

impl Snapshot {
    pub fn active_ideas(&self) -> impl Iterator<Item = &Idea> {
        self.ideas.iter().filter(|i| i.is_active())
    }

    /// The recycle bin
    pub fn bin(&self) -> Vec<&Idea> {
        self.ideas.iter().filter(|i| i.is_deleted).collect()
    }

    pub fn find_idea(&self, id: &str) -> Option<&Idea> {
        self.ideas.iter().find(|i| i.id == id)
    }

    /// Look up a channel by id, then by name (case-insensitive)
    pub fn find_channel(&self, key: &str) -> Option<&Channel> {
        self.channels
            .iter()
            .find(|c| c.id == key)
            .or_else(|| self.channels.iter().find(|c| c.name.eq_ignore_ascii_case(key)))
    }

    /// Look up a status by id, then by name (case-insensitive)
    pub fn find_status(&self, key: &str) -> Option<&Status> {
        self.statuses
            .iter()
            .find(|s| s.id == key)
            .or_else(|| self.statuses.iter().find(|s| s.name.eq_ignore_ascii_case(key)))
    }

    /// Home: every status in pipeline order with its active count
    pub fn status_folders(&self) -> Vec<StatusFolder> {
        self.statuses
            .iter()
            .map(|status| StatusFolder {
                count: self.active_ideas().filter(|i| i.status_id == status.id).count(),
                status: status.clone(),
            })
            .collect()
    }

    pub fn ideas_in_status(&self, status_id: &str) -> Vec<&Idea> {
        self.active_ideas()
            .filter(|i| i.status_id == status_id)
            .collect()
    }

    /// Channels page: every channel with its active count
    pub fn channel_folders(&self) -> Vec<ChannelFolder> {
        self.channels
            .iter()
            .map(|channel| ChannelFolder {
                count: self.active_ideas().filter(|i| i.channel_id == channel.id).count(),
                channel: channel.clone(),
            })
            .collect()
    }

    pub fn ideas_in_channel(&self, channel_id: &str, status_filter: Option<&str>) -> Vec<&Idea> {
        self.active_ideas()
            .filter(|i| i.channel_id == channel_id)
            .filter(|i| status_filter.map_or(true, |s| i.status_id == s))
            .collect()
    }

    /// The `n` newest active ideas. Ideas are kept newest first.
    pub fn recent_activity(&self, n: usize) -> Vec<&Idea> {
        self.active_ideas().take(n).collect()
    }

    pub fn scheduled_on(&self, date: NaiveDate) -> Vec<&Idea> {
        self.active_ideas()
            .filter(|i| i.scheduled_date == Some(date))
            .collect()
    }

    /// Days of the month that have at least one active idea scheduled
    pub fn scheduled_days_in_month(&self, year: i32, month: u32) -> BTreeSet<u32> {
        self.active_ideas()
            .filter_map(|i| i.scheduled_date)
            .filter(|d| d.year() == year && d.month() == month)
            .map(|d| d.day())
            .collect()
    }

    pub fn channel_label(&self, channel_id: &str) -> ChannelLabel {
        match self.channels.iter().find(|c| c.id == channel_id) {
            Some(channel) => ChannelLabel {
                name: channel.name.clone(),
                color: channel.color.clone(),
            },
            None => ChannelLabel {
                name: config::UNKNOWN_CHANNEL_NAME.to_string(),
                color: config::UNKNOWN_CHANNEL_COLOR.to_string(),
            },
        }
    }

    /// Active ideas whose title, description, notes, or any tag contains `query`
    pub fn search(&self, query: &str) -> Vec<&Idea> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        self.active_ideas()
            .filter(|i| {
                i.title.to_lowercase().contains(&needle)
                    || i.description.to_lowercase().contains(&needle)
                    || i
                        .notes
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&needle))
                    || i.tags.iter().any(|t| t.to_lowercase().contains(&needle))
            })
            .collect()
    }

    pub fn idea_detail(&self, id: &str) -> Option<IdeaDetail> {
        let idea = self.find_idea(id)?;
        Some(IdeaDetail {
            idea: idea.clone(),
            channel: self.channel_label(&idea.channel_id),
            status: self.statuses.iter().find(|s| s.id == idea.status_id).cloned(),
            is_completed: idea.completed_at.is_some(),
        })
    }
}
