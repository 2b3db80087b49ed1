//! Integration tests for CreatorFlow
//!
//! These tests drive the command layer end to end:
//! - Accounts, sessions, and per-user scoping
//! - Idea lifecycle through the pipeline and the bin
//! - Confirmation flow for destructive actions
//! - Trends, backups, and the offline backend

use chrono::{Duration, Utc};
use creatorflow::app::{self, AppState};
use creatorflow::commands::{self, ActionOutcome, IdeaChanges};
use creatorflow::database::Priority;
use creatorflow::error::AppError;
use creatorflow::router::{PendingAction, Screen};
use creatorflow::services::{Metric, Timeframe, TrendQuery};
use std::path::Path;
use tempfile::TempDir;

/// Sign up a fresh account in `dir` and open the app as it
async fn signed_in_state(dir: &Path, email: &str) -> AppState {
    commands::sign_up(dir, email, "hunter22", "Creator")
        .await
        .unwrap();
    app::setup(dir.to_path_buf()).await.unwrap()
}

fn titled(title: &str) -> IdeaChanges {
    IdeaChanges {
        title: Some(title.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_setup_requires_session_on_sqlite() {
    let temp = TempDir::new().unwrap();

    let result = app::setup(temp.path().to_path_buf()).await;
    assert!(matches!(result, Err(AppError::NotSignedIn)));
}

#[tokio::test]
async fn test_new_account_gets_default_pipeline() {
    let temp = TempDir::new().unwrap();
    let state = signed_in_state(temp.path(), "sam@example.com").await;

    let statuses = commands::list_statuses(&state).await.unwrap();
    let names: Vec<&str> = statuses.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Initial", "Script Write", "Record", "Edit", "Upload"]);

    let profile = commands::get_profile(&state).await.unwrap().unwrap();
    assert_eq!(profile.display_name, "Creator");
}

#[tokio::test]
async fn test_channel_and_idea_counts() {
    let temp = TempDir::new().unwrap();
    let state = signed_in_state(temp.path(), "sam@example.com").await;

    let channel = commands::create_channel(
        &state,
        "Gaming".to_string(),
        Some("#ef4444".to_string()),
        None,
    )
    .await
    .unwrap();

    let idea = commands::create_idea(
        &state,
        IdeaChanges {
            channel: Some(channel.id.clone()),
            status: Some("Initial".to_string()),
            priority: Some(Priority::Medium),
            ..titled("Unboxing Video")
        },
    )
    .await
    .unwrap();
    assert_eq!(idea.channel_id, channel.id);

    let (folders, recent) = commands::get_home(&state).await.unwrap();
    let initial = folders.iter().find(|f| f.status.name == "Initial").unwrap();
    assert_eq!(initial.count, 1);
    assert_eq!(recent[0].title, "Unboxing Video");

    let channels = commands::get_channel_folders(&state).await.unwrap();
    let tech = channels
        .iter()
        .find(|f| f.channel.name == "Gaming")
        .unwrap();
    assert_eq!(tech.count, 1);
}

#[tokio::test]
async fn test_completion_follows_upload_stage() {
    let temp = TempDir::new().unwrap();
    let state = signed_in_state(temp.path(), "sam@example.com").await;

    let idea = commands::create_idea(&state, titled("Unboxing Video"))
        .await
        .unwrap();
    assert!(idea.completed_at.is_none());

    let uploaded = commands::update_idea(
        &state,
        &idea.id,
        IdeaChanges {
            status: Some("Upload".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(uploaded.completed_at.is_some());

    let reopened = commands::update_idea(
        &state,
        &idea.id,
        IdeaChanges {
            status: Some("Edit".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(reopened.completed_at.is_none());
}

#[tokio::test]
async fn test_bin_round_trip_through_confirmation() {
    let temp = TempDir::new().unwrap();
    let state = signed_in_state(temp.path(), "sam@example.com").await;

    let idea = commands::create_idea(&state, titled("Binned")).await.unwrap();
    commands::open_idea(&state, &idea.id).await.unwrap();

    let dialog = commands::request_move_to_bin(&state, &idea.id).await.unwrap();
    assert!(dialog.is_destructive);

    // Other input is blocked while the dialog is open
    assert!(matches!(
        commands::close_detail(&state).await,
        Err(AppError::InputBlocked)
    ));

    let outcome = commands::confirm_pending(&state).await.unwrap();
    assert_eq!(
        outcome,
        ActionOutcome::MovedToBin {
            idea_id: idea.id.clone()
        }
    );
    assert!(commands::get_router(&state).await.unwrap().detail().is_none());

    assert!(commands::list_ideas(&state, None, None).await.unwrap().is_empty());
    assert_eq!(commands::list_bin(&state).await.unwrap().len(), 1);

    commands::restore_idea(&state, &idea.id).await.unwrap();
    let restored = commands::list_ideas(&state, None, None).await.unwrap();
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].updated_at, idea.updated_at);
    assert!(commands::list_bin(&state).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_leaves_data_alone() {
    let temp = TempDir::new().unwrap();
    let state = signed_in_state(temp.path(), "sam@example.com").await;
    let idea = commands::create_idea(&state, titled("Kept")).await.unwrap();

    commands::request_delete_forever(&state, &idea.id)
        .await
        .unwrap();
    commands::cancel_pending(&state).await.unwrap();

    assert_eq!(commands::list_ideas(&state, None, None).await.unwrap().len(), 1);
    assert!(commands::get_router(&state)
        .await
        .unwrap()
        .pending_confirmation()
        .is_none());
}

#[tokio::test]
async fn test_empty_bin() {
    let temp = TempDir::new().unwrap();
    let state = signed_in_state(temp.path(), "sam@example.com").await;

    for title in ["A", "B"] {
        let idea = commands::create_idea(&state, titled(title)).await.unwrap();
        commands::request_move_to_bin(&state, &idea.id).await.unwrap();
        commands::confirm_pending(&state).await.unwrap();
    }
    commands::create_idea(&state, titled("C")).await.unwrap();

    commands::request_empty_bin(&state).await.unwrap();
    let outcome = commands::confirm_pending(&state).await.unwrap();
    assert_eq!(outcome, ActionOutcome::BinEmptied { removed: 2 });

    let active = commands::list_ideas(&state, None, None).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].title, "C");
    assert!(commands::list_bin(&state).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_channel_delete_blocked_by_default() {
    let temp = TempDir::new().unwrap();
    let state = signed_in_state(temp.path(), "sam@example.com").await;
    let idea = commands::create_idea(&state, titled("Anchor")).await.unwrap();

    commands::request_delete_channel(&state, &idea.channel_id)
        .await
        .unwrap();
    let result = commands::confirm_pending(&state).await;
    assert!(matches!(result, Err(AppError::StillReferenced(_, 1))));
    assert_eq!(commands::list_channels(&state).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_weekly_trend() {
    let temp = TempDir::new().unwrap();
    let state = signed_in_state(temp.path(), "sam@example.com").await;

    commands::create_idea(&state, titled("Today 1")).await.unwrap();
    commands::create_idea(&state, titled("Today 2")).await.unwrap();

    let query = TrendQuery {
        metric: Metric::Created,
        timeframe: Timeframe::Week,
        channel: None,
    };

    let today = Utc::now().date_naive();
    let report = commands::get_trend_on(&state, query.clone(), today)
        .await
        .unwrap();
    let counts: Vec<usize> = report.buckets.iter().map(|b| b.count).collect();
    assert_eq!(counts, vec![0, 0, 0, 0, 0, 0, 2]);
    assert_eq!(report.scale, 5);

    // Ten days later both ideas are outside the window
    let later = commands::get_trend_on(&state, query, today + Duration::days(10))
        .await
        .unwrap();
    assert_eq!(later.total, 0);
}

#[tokio::test]
async fn test_accounts_do_not_see_each_other() {
    let temp = TempDir::new().unwrap();

    let first = signed_in_state(temp.path(), "one@example.com").await;
    commands::create_idea(&first, titled("Private")).await.unwrap();
    drop(first);

    let second = signed_in_state(temp.path(), "two@example.com").await;
    assert!(commands::list_ideas(&second, None, None).await.unwrap().is_empty());
    assert_eq!(commands::list_statuses(&second).await.unwrap().len(), 5);
    drop(second);

    commands::sign_in(temp.path(), "one@example.com", "hunter22")
        .await
        .unwrap();
    let first_again = app::setup(temp.path().to_path_buf()).await.unwrap();
    assert_eq!(
        commands::list_ideas(&first_again, None, None).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_sign_out_clears_everything() {
    let temp = TempDir::new().unwrap();
    let state = signed_in_state(temp.path(), "sam@example.com").await;
    commands::create_idea(&state, titled("Soon hidden")).await.unwrap();

    let dialog = commands::request_sign_out(&state).await.unwrap();
    assert_eq!(dialog.action, PendingAction::SignOut);
    assert_eq!(
        commands::confirm_pending(&state).await.unwrap(),
        ActionOutcome::SignedOut
    );

    assert!(state.store.snapshot().await.ideas.is_empty());
    assert_eq!(
        commands::get_router(&state).await.unwrap().screen(),
        Screen::Auth
    );
    assert!(matches!(
        app::setup(temp.path().to_path_buf()).await,
        Err(AppError::NotSignedIn)
    ));
}

#[tokio::test]
async fn test_backup_and_restore() {
    let temp = TempDir::new().unwrap();
    let state = signed_in_state(temp.path(), "sam@example.com").await;
    let idea = commands::create_idea(&state, titled("Worth keeping"))
        .await
        .unwrap();

    let path = commands::create_backup(&state).await.unwrap();
    assert_eq!(commands::list_backups(&state).await.unwrap().len(), 1);

    commands::request_delete_forever(&state, &idea.id)
        .await
        .unwrap();
    commands::confirm_pending(&state).await.unwrap();
    assert!(commands::list_ideas(&state, None, None).await.unwrap().is_empty());

    let summary = commands::restore_backup(&state, &path).await.unwrap();
    assert_eq!(summary.ideas, 1);

    let ideas = commands::list_ideas(&state, None, None).await.unwrap();
    assert_eq!(ideas.len(), 1);
    assert_eq!(ideas[0].id, idea.id);
}

#[tokio::test]
async fn test_local_backend_needs_no_account() {
    let temp = TempDir::new().unwrap();
    commands::update_setting(temp.path(), "backend", "local")
        .await
        .unwrap();

    {
        let state = app::setup(temp.path().to_path_buf()).await.unwrap();
        assert!(state.session.is_none());
        commands::create_idea(&state, titled("Offline idea"))
            .await
            .unwrap();
        assert!(matches!(
            commands::request_sign_out(&state).await,
            Err(AppError::Auth(_))
        ));
    }

    assert!(temp.path().join("creatorflow.json").exists());

    let state = app::setup(temp.path().to_path_buf()).await.unwrap();
    let ideas = commands::list_ideas(&state, None, None).await.unwrap();
    assert_eq!(ideas.len(), 1);
    assert_eq!(ideas[0].title, "Offline idea");
}

#[tokio::test]
async fn test_search_and_calendar() {
    let temp = TempDir::new().unwrap();
    let state = signed_in_state(temp.path(), "sam@example.com").await;
    let date = Utc::now().date_naive() + Duration::days(3);

    commands::create_idea(
        &state,
        IdeaChanges {
            tags: Some(vec!["gadgets".to_string(), " Gadgets ".to_string()]),
            scheduled_date: Some(Some(date)),
            ..titled("Phone review")
        },
    )
    .await
    .unwrap();
    commands::create_idea(&state, titled("Travel vlog")).await.unwrap();

    let found = commands::search_ideas(&state, "GADGET").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].tags, vec!["gadgets".to_string()]);

    let scheduled = commands::get_scheduled_on(&state, date).await.unwrap();
    assert_eq!(scheduled.len(), 1);
}

#[tokio::test]
async fn test_restoring_foreign_backup_keeps_current_data() {
    let temp = TempDir::new().unwrap();

    let first = signed_in_state(temp.path(), "one@example.com").await;
    commands::create_idea(&first, titled("First's idea")).await.unwrap();
    let foreign = commands::create_backup(&first).await.unwrap();
    drop(first);

    let second = signed_in_state(temp.path(), "two@example.com").await;
    commands::create_idea(&second, titled("Second's idea")).await.unwrap();

    let result = commands::restore_backup(&second, &foreign).await;
    assert!(matches!(result, Err(AppError::Restore(_))));

    let ideas = commands::list_ideas(&second, None, None).await.unwrap();
    assert_eq!(ideas.len(), 1);
    assert_eq!(ideas[0].title, "Second's idea");
    assert_eq!(commands::list_statuses(&second).await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_pipeline_changes_keep_completion_in_step() {
    let temp = TempDir::new().unwrap();
    let state = signed_in_state(temp.path(), "sam@example.com").await;

    let shipped = commands::create_idea(
        &state,
        IdeaChanges {
            status: Some("Upload".to_string()),
            ..titled("Shipped")
        },
    )
    .await
    .unwrap();
    assert!(shipped.completed_at.is_some());

    commands::create_status(&state, "Promote".to_string(), None, None)
        .await
        .unwrap();

    let detail = commands::get_idea_detail(&state, &shipped.id).await.unwrap();
    assert!(!detail.is_completed);
    assert!(detail.idea.completed_at.is_none());
}
