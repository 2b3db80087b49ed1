//! Error types for CreatorFlow
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized for any front end that drives the store.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Idea not found: {0}")]
    IdeaNotFound(String),

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("Status not found: {0}")]
    StatusNotFound(String),

    /// A backend round trip failed. `action` is the user-facing label
    /// ("Save failed", "Restore failed", ...).
    #[error("{action}: {reason}")]
    SyncFailed { action: &'static str, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Malformed row: {0}")]
    MalformedRow(String),

    #[error("Another change is still being saved")]
    Busy,

    #[error("Timed out after {0}s waiting for the backend")]
    Timeout(u64),

    #[error("{0} is still referenced by {1} idea(s)")]
    StillReferenced(String, usize),

    #[error("Input is blocked until the open dialog is resolved")]
    InputBlocked,

    #[error("Nothing to confirm")]
    NothingPending,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Backup error: {0}")]
    Backup(String),

    #[error("Restore error: {0}")]
    Restore(String),

    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Wrap a backend failure under a user-facing action label.
    ///
    /// Errors the user caused (validation, dangling references, an unusable
    /// backup, a second submit while one is in flight) pass through unchanged.
    pub fn sync_failed(action: &'static str, err: AppError) -> AppError {
        match err {
            AppError::Validation(_)
            | AppError::StillReferenced(..)
            | AppError::Restore(_)
            | AppError::Busy
            | AppError::SyncFailed { .. } => err,
            other => AppError::SyncFailed {
                action,
                reason: other.to_string(),
            },
        }
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_failed_wraps_backend_errors() {
        let err = AppError::sync_failed("Save failed", AppError::Timeout(10));
        assert_eq!(err.to_string(), "Save failed: Timed out after 10s waiting for the backend");
    }

    #[test]
    fn test_sync_failed_keeps_validation_errors() {
        let err = AppError::sync_failed("Save failed", AppError::Validation("Title is required".into()));
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_serializes_as_display_string() {
        let json = serde_json::to_string(&AppError::IdeaNotFound("abc".into())).unwrap();
        assert_eq!(json, format!("\"{}\"", AppError::IdeaNotFound("abc".into())));
    }
}
