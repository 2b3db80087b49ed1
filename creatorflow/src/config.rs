//! Application configuration constants
//!
//! Central location for file names, defaults, resource limits,
//! and validation boundaries used throughout the application.

// ===== Files =====

/// SQLite database file inside the data directory
pub const DB_FILE_NAME: &str = "creatorflow.sqlite";
/// Offline document store inside the data directory
pub const LOCAL_STORE_FILE_NAME: &str = "creatorflow.json";
/// Persisted session (present = signed in)
pub const SESSION_FILE_NAME: &str = "session.json";
/// Settings file inside the data directory
pub const SETTINGS_FILE_NAME: &str = "settings.json";
/// Backups live in a per-user folder under this directory
pub const BACKUPS_DIR_NAME: &str = "backups";

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "CREATORFLOW_DATA_DIR";
/// Data directory used when neither the flag nor the env var is set
pub const DEFAULT_DATA_DIR: &str = ".creatorflow";

// ===== Offline store keys =====

pub const KEY_IDEAS: &str = "cf_ideas";
pub const KEY_CHANNELS: &str = "cf_channels";
pub const KEY_STATUSES: &str = "cf_statuses";
pub const KEY_USER: &str = "cf_user";

/// Identity used by the offline store, which has no accounts
pub const LOCAL_USER_ID: &str = "local";

// ===== Seed data =====

/// Canonical pipeline: (name, color). Order is the position in this list.
pub const DEFAULT_STATUSES: &[(&str, &str)] = &[
    ("Initial", "#71717a"),
    ("Script Write", "#3b82f6"),
    ("Record", "#f97316"),
    ("Edit", "#a855f7"),
    ("Upload", "#22c55e"),
];

/// Starter channels: (name, color, icon)
pub const DEFAULT_CHANNELS: &[(&str, &str, &str)] = &[
    ("Tech Reviews", "#ef4444", "Cpu"),
    ("Vlog Daily", "#ec4899", "Camera"),
];

pub const DEFAULT_CHANNEL_COLOR: &str = "#3b82f6";
pub const DEFAULT_CHANNEL_ICON: &str = "Youtube";
pub const DEFAULT_STATUS_COLOR: &str = "#71717a";

/// Label and accent shown for an idea whose channel no longer exists
pub const UNKNOWN_CHANNEL_NAME: &str = "Unknown Channel";
pub const UNKNOWN_CHANNEL_COLOR: &str = "#52525b";

// ===== Limits =====

/// Maximum idea title length in characters
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum length of a single tag
pub const MAX_TAG_LENGTH: usize = 40;

/// Maximum avatar URL length. Avatars may be small embedded `data:` images,
/// anything larger belongs in object storage.
pub const MAX_AVATAR_URL_LENGTH: usize = 256 * 1024;

/// Minimum password length accepted at sign-up
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Broadcast buffer for change notifications. Slow listeners that fall
/// further behind than this simply reload once.
pub const CHANGE_FEED_CAPACITY: usize = 64;

/// Default backend round-trip timeout in seconds
pub const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 15;

/// Default number of backups kept per user
pub const DEFAULT_BACKUP_RETENTION: usize = 10;

/// Number of ideas in the Home page's "Recent Activity" list
pub const RECENT_ACTIVITY_COUNT: usize = 3;

/// Trend graphs never scale below this, so an all-zero series stays flat
/// instead of degenerate.
pub const MIN_TREND_SCALE: usize = 5;
