//! Repository layer for database operations
//!
//! CRUD operations for ideas, channels, statuses, and profiles. A repository
//! is bound to one user: every query filters on `user_id`, so rows that
//! belong to another account are invisible to it.

use super::models::*;
use crate::error::{AppError, Result};
use crate::storage::{ChangeEvent, ChangeFeed, Dataset, PersistenceAdapter, Resource};
use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};
use tokio::sync::broadcast;

const IDEA_COLUMNS: &str = "id, title, description, notes, channel_id, status_id, priority, tags, \
     scheduled_date, created_at, updated_at, completed_at, is_deleted";

/// Tables holding per-user rows that a restore replaces
const USER_TABLES: [&str; 3] = ["ideas", "channels", "statuses"];

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    user_id: String,
    feed: ChangeFeed,
}

impl Repository {
    pub fn new(pool: SqlitePool, user_id: impl Into<String>, feed: ChangeFeed) -> Self {
        Self {
            pool,
            user_id: user_id.into(),
            feed,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn changed(&self, resource: Resource) {
        self.feed.notify(resource, &self.user_id);
    }
}

fn encode_tags(tags: &[String]) -> Result<String> {
    Ok(serde_json::to_string(tags)?)
}

fn encode_date(idea: &Idea) -> Option<String> {
    idea.scheduled_date.map(|d| d.format("%Y-%m-%d").to_string())
}

// Row writers shared by the single-row calls and the restore transaction

async fn insert_idea_row<'e>(
    exec: impl SqliteExecutor<'e>,
    user_id: &str,
    idea: &Idea,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO ideas (id, user_id, title, description, notes, channel_id, status_id,
                           priority, tags, scheduled_date, created_at, updated_at,
                           completed_at, is_deleted)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&idea.id)
    .bind(user_id)
    .bind(&idea.title)
    .bind(&idea.description)
    .bind(&idea.notes)
    .bind(&idea.channel_id)
    .bind(&idea.status_id)
    .bind(idea.priority.as_str())
    .bind(encode_tags(&idea.tags)?)
    .bind(encode_date(idea))
    .bind(idea.created_at)
    .bind(idea.updated_at)
    .bind(idea.completed_at)
    .bind(idea.is_deleted)
    .execute(exec)
    .await?;
    Ok(())
}

async fn insert_channel_row<'e>(
    exec: impl SqliteExecutor<'e>,
    user_id: &str,
    channel: &Channel,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO channels (id, user_id, name, color, icon, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&channel.id)
    .bind(user_id)
    .bind(&channel.name)
    .bind(&channel.color)
    .bind(&channel.icon)
    .bind(channel.created_at)
    .execute(exec)
    .await?;
    Ok(())
}

async fn insert_status_row<'e>(
    exec: impl SqliteExecutor<'e>,
    user_id: &str,
    status: &Status,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO statuses (id, user_id, name, color, sort_order, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&status.id)
    .bind(user_id)
    .bind(&status.name)
    .bind(&status.color)
    .bind(status.order)
    .bind(status.created_at)
    .execute(exec)
    .await?;
    Ok(())
}

async fn upsert_profile_row<'e>(exec: impl SqliteExecutor<'e>, profile: &UserProfile) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO profiles (id, display_name, avatar_url, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            display_name = excluded.display_name,
            avatar_url = excluded.avatar_url,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&profile.id)
    .bind(&profile.display_name)
    .bind(&profile.avatar_url)
    .bind(profile.updated_at)
    .execute(exec)
    .await?;
    Ok(())
}

/// Ids are global keys, so a row id already owned by another account
/// surfaces as a unique violation.
fn owned_elsewhere(err: AppError, what: &str, id: &str) -> AppError {
    let taken = matches!(
        &err,
        AppError::Database(sqlx::Error::Database(db)) if db.is_unique_violation()
    );
    if taken {
        AppError::Restore(format!("{} {} belongs to another account", what, id))
    } else {
        err
    }
}

impl PersistenceAdapter for Repository {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn list_ideas(&self) -> Result<Vec<Idea>> {
        let rows = sqlx::query_as::<_, IdeaRow>(&format!(
            "SELECT {} FROM ideas WHERE user_id = ? ORDER BY created_at DESC, id DESC",
            IDEA_COLUMNS
        ))
        .bind(&self.user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(quarantine("idea", rows))
    }

    async fn get_idea(&self, id: &str) -> Result<Option<Idea>> {
        let row = sqlx::query_as::<_, IdeaRow>(&format!(
            "SELECT {} FROM ideas WHERE id = ? AND user_id = ?",
            IDEA_COLUMNS
        ))
        .bind(id)
        .bind(&self.user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Idea::try_from).transpose()
    }

    async fn insert_idea(&self, idea: &Idea) -> Result<()> {
        insert_idea_row(&self.pool, &self.user_id, idea).await?;
        tracing::debug!("Inserted idea: {}", idea.id);
        self.changed(Resource::Ideas);
        Ok(())
    }

    async fn update_idea(&self, idea: &Idea) -> Result<()> {
        let rows = sqlx::query(
            r#"
            UPDATE ideas
            SET title = ?, description = ?, notes = ?, channel_id = ?, status_id = ?,
                priority = ?, tags = ?, scheduled_date = ?, updated_at = ?,
                completed_at = ?, is_deleted = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(&idea.title)
        .bind(&idea.description)
        .bind(&idea.notes)
        .bind(&idea.channel_id)
        .bind(&idea.status_id)
        .bind(idea.priority.as_str())
        .bind(encode_tags(&idea.tags)?)
        .bind(encode_date(idea))
        .bind(idea.updated_at)
        .bind(idea.completed_at)
        .bind(idea.is_deleted)
        .bind(&idea.id)
        .bind(&self.user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(AppError::IdeaNotFound(idea.id.clone()));
        }

        tracing::debug!("Updated idea: {}", idea.id);
        self.changed(Resource::Ideas);
        Ok(())
    }

    async fn delete_idea(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM ideas WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(&self.user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows > 0 {
            tracing::debug!("Deleted idea: {}", id);
            self.changed(Resource::Ideas);
        }
        Ok(())
    }

    async fn purge_deleted_ideas(&self) -> Result<u64> {
        let rows = sqlx::query("DELETE FROM ideas WHERE user_id = ? AND is_deleted = 1")
            .bind(&self.user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!("Purged {} binned ideas", rows);
        if rows > 0 {
            self.changed(Resource::Ideas);
        }
        Ok(rows)
    }

    async fn list_channels(&self) -> Result<Vec<Channel>> {
        let rows = sqlx::query_as::<_, ChannelRow>(
            r#"
            SELECT id, name, color, icon, created_at FROM channels
            WHERE user_id = ?
            ORDER BY name ASC, id ASC
            "#,
        )
        .bind(&self.user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(quarantine("channel", rows))
    }

    async fn insert_channel(&self, channel: &Channel) -> Result<()> {
        insert_channel_row(&self.pool, &self.user_id, channel).await?;
        tracing::debug!("Inserted channel: {}", channel.id);
        self.changed(Resource::Channels);
        Ok(())
    }

    async fn update_channel(&self, channel: &Channel) -> Result<()> {
        let rows = sqlx::query(
            "UPDATE channels SET name = ?, color = ?, icon = ? WHERE id = ? AND user_id = ?",
        )
        .bind(&channel.name)
        .bind(&channel.color)
        .bind(&channel.icon)
        .bind(&channel.id)
        .bind(&self.user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(AppError::ChannelNotFound(channel.id.clone()));
        }

        tracing::debug!("Updated channel: {}", channel.id);
        self.changed(Resource::Channels);
        Ok(())
    }

    async fn delete_channel(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM channels WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(&self.user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows > 0 {
            tracing::debug!("Deleted channel: {}", id);
            self.changed(Resource::Channels);
        }
        Ok(())
    }

    async fn list_statuses(&self) -> Result<Vec<Status>> {
        let rows = sqlx::query_as::<_, StatusRow>(
            r#"
            SELECT id, name, color, sort_order, created_at FROM statuses
            WHERE user_id = ?
            ORDER BY sort_order ASC, created_at ASC, id ASC
            "#,
        )
        .bind(&self.user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut statuses: Vec<Status> = quarantine("status", rows);
        // Text timestamps can tie-break differently than the typed ordering
        sort_statuses(&mut statuses);
        Ok(statuses)
    }

    async fn insert_status(&self, status: &Status) -> Result<()> {
        insert_status_row(&self.pool, &self.user_id, status).await?;
        tracing::debug!("Inserted status: {}", status.id);
        self.changed(Resource::Statuses);
        Ok(())
    }

    async fn update_status(&self, status: &Status) -> Result<()> {
        let rows = sqlx::query(
            "UPDATE statuses SET name = ?, color = ?, sort_order = ? WHERE id = ? AND user_id = ?",
        )
        .bind(&status.name)
        .bind(&status.color)
        .bind(status.order)
        .bind(&status.id)
        .bind(&self.user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(AppError::StatusNotFound(status.id.clone()));
        }

        tracing::debug!("Updated status: {}", status.id);
        self.changed(Resource::Statuses);
        Ok(())
    }

    async fn delete_status(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM statuses WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(&self.user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows > 0 {
            tracing::debug!("Deleted status: {}", id);
            self.changed(Resource::Statuses);
        }
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        // Profiles of other accounts are out of scope
        if user_id != self.user_id {
            return Ok(None);
        }

        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, display_name, avatar_url, updated_at FROM profiles WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserProfile::from))
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<()> {
        if profile.id != self.user_id {
            return Err(AppError::Validation(
                "Cannot write another account's profile".to_string(),
            ));
        }

        upsert_profile_row(&self.pool, profile).await?;
        tracing::debug!("Saved profile: {}", profile.id);
        self.changed(Resource::Profiles);
        Ok(())
    }

    async fn replace_all(&self, data: &Dataset) -> Result<()> {
        if data.profile.as_ref().is_some_and(|p| p.id != self.user_id) {
            return Err(AppError::Validation(
                "Cannot write another account's profile".to_string(),
            ));
        }

        // Dropping the transaction before commit rolls every statement back
        let mut tx = self.pool.begin().await?;

        for table in USER_TABLES {
            sqlx::query(&format!("DELETE FROM {} WHERE user_id = ?", table))
                .bind(&self.user_id)
                .execute(&mut *tx)
                .await?;
        }

        for status in &data.statuses {
            insert_status_row(&mut *tx, &self.user_id, status)
                .await
                .map_err(|e| owned_elsewhere(e, "Status", &status.id))?;
        }
        for channel in &data.channels {
            insert_channel_row(&mut *tx, &self.user_id, channel)
                .await
                .map_err(|e| owned_elsewhere(e, "Channel", &channel.id))?;
        }
        for idea in &data.ideas {
            insert_idea_row(&mut *tx, &self.user_id, idea)
                .await
                .map_err(|e| owned_elsewhere(e, "Idea", &idea.id))?;
        }
        if let Some(profile) = &data.profile {
            upsert_profile_row(&mut *tx, profile).await?;
        }

        tx.commit().await?;

        tracing::debug!(
            "Replaced data for {}: {} ideas, {} channels, {} statuses",
            self.user_id,
            data.ideas.len(),
            data.channels.len(),
            data.statuses.len()
        );
        for resource in [Resource::Ideas, Resource::Channels, Resource::Statuses, Resource::Profiles] {
            self.changed(resource);
        }
        Ok(())
    }

    async fn is_seeded(&self) -> Result<bool> {
        let seeded: Option<String> =
            sqlx::query_scalar("SELECT user_id FROM seeded_accounts WHERE user_id = ?")
                .bind(&self.user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(seeded.is_some())
    }

    async fn mark_seeded(&self) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO seeded_accounts (user_id, seeded_at) VALUES (?, ?)")
            .bind(&self.user_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }
}
