//! Services module
//!
//! Business logic that sits between the commands and the persistence
//! adapters: the domain store and its read projections, trends, identity,
//! backups, and settings.

pub mod auth;
pub mod backup;
pub mod settings;
pub mod store;
pub mod trends;
pub mod views;

pub use auth::{IdentityService, Session};
pub use backup::{BackupInfo, BackupService, RestoreSummary};
pub use settings::{AppSettings, BackendKind, SettingsService};
pub use store::{ReferencePolicy, Snapshot, Store, StorePolicy};
pub use trends::{Metric, Timeframe, TrendBucket, TrendQuery, TrendSeries};
pub use views::{ChannelFolder, ChannelLabel, IdeaDetail, StatusFolder};
