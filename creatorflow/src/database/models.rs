//! Database models
//!
//! Rust structs representing the tracked entities, the editor drafts that
//! create or change them, and the raw row shapes read back from SQLite.
//! All models use serde for serialization to front ends and the offline store.

use crate::config;
use crate::error::{AppError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Idea priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(AppError::Validation(format!("Unknown priority: {}", other))),
        }
    }
}

/// A video idea moving through the production pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Idea {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub channel_id: String,
    pub status_id: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub scheduled_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set while the idea sits in the terminal (upload) stage
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl Idea {
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }

    /// Structural checks applied to every record crossing the adapter boundary
    pub fn check(&self) -> Result<()> {
        require_non_empty("idea id", &self.id)?;
        require_non_empty("idea title", &self.title)?;
        require_non_empty("idea channel", &self.channel_id)?;
        require_non_empty("idea status", &self.status_id)?;
        Ok(())
    }
}

/// A content brand grouping ideas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub color: String,
    pub icon: String,
    pub created_at: DateTime<Utc>,
}

impl Channel {
    pub fn check(&self) -> Result<()> {
        require_non_empty("channel id", &self.id)?;
        require_non_empty("channel name", &self.name)
    }
}

/// A pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub id: String,
    pub name: String,
    pub color: String,
    pub order: i64,
    pub created_at: DateTime<Utc>,
}

impl Status {
    pub fn check(&self) -> Result<()> {
        require_non_empty("status id", &self.id)?;
        require_non_empty("status name", &self.name)
    }

    /// Pipeline ordering: `order`, then creation time, then id
    pub fn pipeline_cmp(&self, other: &Status) -> Ordering {
        self.order
            .cmp(&other.order)
            .then_with(|| self.created_at.cmp(&other.created_at))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Sort statuses into pipeline order
pub fn sort_statuses(statuses: &mut [Status]) {
    statuses.sort_by(Status::pipeline_cmp);
}

/// The terminal ("uploaded") stage: the last status in pipeline order
pub fn terminal_status(statuses: &[Status]) -> Option<&Status> {
    statuses.iter().max_by(|a, b| a.pipeline_cmp(b))
}

/// Profile of the signed-in creator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Create or edit an idea. `id: None` creates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdeaDraft {
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub notes: Option<String>,
    pub channel_id: Option<String>,
    pub status_id: Option<String>,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub scheduled_date: Option<NaiveDate>,
}

impl From<&Idea> for IdeaDraft {
    fn from(idea: &Idea) -> Self {
        Self {
            id: Some(idea.id.clone()),
            title: idea.title.clone(),
            description: idea.description.clone(),
            notes: idea.notes.clone(),
            channel_id: Some(idea.channel_id.clone()),
            status_id: Some(idea.status_id.clone()),
            priority: idea.priority,
            tags: idea.tags.clone(),
            scheduled_date: idea.scheduled_date,
        }
    }
}

/// Create or edit a channel. `id: None` creates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelDraft {
    pub id: Option<String>,
    pub name: String,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// Create or edit a status. `id: None` creates; a new status without an
/// explicit order is appended after the current terminal stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusDraft {
    pub id: Option<String>,
    pub name: String,
    pub color: Option<String>,
    pub order: Option<i64>,
}

/// Profile edit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileDraft {
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Trim tags, drop empties, and drop repeats (case-insensitive, first wins)
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            continue;
        }
        let tag: String = tag.chars().take(config::MAX_TAG_LENGTH).collect();
        if !out.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
            out.push(tag);
        }
    }
    out
}

fn require_non_empty(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::MalformedRow(format!("{} is empty", what)));
    }
    Ok(())
}

// ===== Raw rows =====

/// Idea row as stored. Priority, tags, and dates are validated on conversion.
#[derive(Debug, FromRow)]
pub struct IdeaRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub notes: Option<String>,
    pub channel_id: String,
    pub status_id: String,
    pub priority: String,
    pub tags: String,
    pub scheduled_date: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
}

impl TryFrom<IdeaRow> for Idea {
    type Error = AppError;

    fn try_from(row: IdeaRow) -> Result<Self> {
        let priority = row
            .priority
            .parse::<Priority>()
            .map_err(|_| AppError::MalformedRow(format!("idea {} has priority {:?}", row.id, row.priority)))?;

        let tags: Vec<String> = serde_json::from_str(&row.tags)
            .map_err(|e| AppError::MalformedRow(format!("idea {} has unreadable tags: {}", row.id, e)))?;

        let scheduled_date = row
            .scheduled_date
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
            .transpose()
            .map_err(|e| AppError::MalformedRow(format!("idea {} has bad schedule date: {}", row.id, e)))?;

        let idea = Idea {
            id: row.id,
            title: row.title,
            description: row.description,
            notes: row.notes,
            channel_id: row.channel_id,
            status_id: row.status_id,
            priority,
            tags,
            scheduled_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
            is_deleted: row.is_deleted,
        };
        idea.check()?;
        Ok(idea)
    }
}

#[derive(Debug, FromRow)]
pub struct ChannelRow {
    pub id: String,
    pub name: String,
    pub color: String,
    pub icon: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ChannelRow> for Channel {
    type Error = AppError;

    fn try_from(row: ChannelRow) -> Result<Self> {
        let channel = Channel {
            id: row.id,
            name: row.name,
            color: row.color,
            icon: row.icon,
            created_at: row.created_at,
        };
        channel.check()?;
        Ok(channel)
    }
}

#[derive(Debug, FromRow)]
pub struct StatusRow {
    pub id: String,
    pub name: String,
    pub color: String,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<StatusRow> for Status {
    type Error = AppError;

    fn try_from(row: StatusRow) -> Result<Self> {
        let status = Status {
            id: row.id,
            name: row.name,
            color: row.color,
            order: row.sort_order,
            created_at: row.created_at,
        };
        status.check()?;
        Ok(status)
    }
}

#[derive(Debug, FromRow)]
pub struct ProfileRow {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            display_name: row.display_name,
            avatar_url: row.avatar_url,
            updated_at: row.updated_at,
        }
    }
}

/// Convert rows, logging and skipping the ones that fail validation
pub fn quarantine<R, T>(kind: &str, rows: Vec<R>) -> Vec<T>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter()
        .filter_map(|row| match T::try_from(row) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Quarantined malformed {} row: {}", kind, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(id: &str, order: i64, created_offset_secs: i64) -> Status {
        Status {
            id: id.to_string(),
            name: id.to_string(),
            color: "#000000".to_string(),
            order,
            created_at: DateTime::from_timestamp(created_offset_secs, 0).unwrap(),
        }
    }

    fn idea_row(priority: &str, tags: &str) -> IdeaRow {
        IdeaRow {
            id: "i-1".to_string(),
            title: "Unboxing Video".to_string(),
            description: String::new(),
            notes: None,
            channel_id: "ch-1".to_string(),
            status_id: "st-1".to_string(),
            priority: priority.to_string(),
            tags: tags.to_string(),
            scheduled_date: Some("2026-10-20".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: None,
            is_deleted: false,
        }
    }

    #[test]
    fn test_priority_parse_is_case_insensitive() {
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!(" Low ".parse::<Priority>().unwrap(), Priority::Low);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_status_ties_break_on_creation_then_id() {
        let mut statuses = vec![status("b", 1, 10), status("a", 1, 10), status("c", 1, 5), status("z", 0, 99)];
        sort_statuses(&mut statuses);
        let ids: Vec<&str> = statuses.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "c", "a", "b"]);
        assert_eq!(terminal_status(&statuses).unwrap().id, "b");
    }

    #[test]
    fn test_normalize_tags() {
        let tags = normalize_tags(vec![" tech ", "", "Tech", "review"]);
        assert_eq!(tags, vec!["tech".to_string(), "review".to_string()]);
    }

    #[test]
    fn test_idea_row_conversion() {
        let idea = Idea::try_from(idea_row("Medium", r#"["a","b"]"#)).unwrap();
        assert_eq!(idea.priority, Priority::Medium);
        assert_eq!(idea.tags.len(), 2);
        assert_eq!(idea.scheduled_date, NaiveDate::from_ymd_opt(2026, 10, 20));
    }

    #[test]
    fn test_malformed_rows_are_quarantined() {
        let rows = vec![
            idea_row("Medium", "[]"),
            idea_row("Urgent", "[]"),
            idea_row("Low", "not json"),
        ];
        let ideas: Vec<Idea> = quarantine("idea", rows);
        assert_eq!(ideas.len(), 1);
    }
}
