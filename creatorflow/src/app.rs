//! Application state and initialization
//!
//! This module manages the central application state and lifecycle.
//! All services are initialized here and made available through AppState.

use crate::config;
use crate::database::{create_pool, Repository};
use crate::error::{AppError, Result};
use crate::router::Router;
use crate::services::{
    AppSettings, BackendKind, BackupService, IdentityService, Session, SettingsService, Store,
};
use crate::storage::{Backend, ChangeFeed, LocalStore, PersistenceAdapter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Central application state holding all services
pub struct AppState {
    pub app_data_dir: PathBuf,
    pub settings: AppSettings,
    pub settings_service: SettingsService,
    pub store: Arc<Store<Backend>>,
    pub backup_service: BackupService,
    /// Present only on the sqlite backend
    pub identity: Option<IdentityService>,
    pub session: Option<Session>,
    pub router: Mutex<Router>,
}

impl AppState {
    /// Wire up state around an already-opened backend
    pub fn for_backend(
        app_data_dir: PathBuf,
        settings: AppSettings,
        backend: Backend,
        identity: Option<IdentityService>,
        session: Option<Session>,
    ) -> Self {
        let store = Arc::new(Store::new(backend, settings.store_policy()));
        let backup_service = BackupService::new(&app_data_dir, settings.backup_retention);

        Self {
            settings_service: SettingsService::new(app_data_dir.clone()),
            app_data_dir,
            settings,
            store,
            backup_service,
            identity,
            session,
            router: Mutex::new(Router::new()),
        }
    }

    /// Id every store operation is scoped to
    pub fn user_id(&self) -> &str {
        self.store.adapter().user_id()
    }
}

/// Open the account database without requiring a session
pub async fn open_identity(app_data_dir: &Path) -> Result<IdentityService> {
    let pool = create_pool(&app_data_dir.join(config::DB_FILE_NAME)).await?;
    Ok(IdentityService::new(pool, app_data_dir))
}

/// Application setup - called once on startup
///
/// On the sqlite backend this fails with [`AppError::NotSignedIn`] until a
/// session exists.
pub async fn setup(app_data_dir: PathBuf) -> Result<AppState> {
    tracing::info!("Initializing application");
    tracing::info!("App data directory: {:?}", app_data_dir);

    std::fs::create_dir_all(&app_data_dir)?;
    std::fs::create_dir_all(app_data_dir.join(config::BACKUPS_DIR_NAME))?;

    let settings = SettingsService::new(app_data_dir.clone()).load().await?;
    let feed = ChangeFeed::new();

    let (backend, identity, session) = match settings.backend {
        BackendKind::Sqlite => {
            let pool = create_pool(&app_data_dir.join(config::DB_FILE_NAME)).await?;
            let identity = IdentityService::new(pool.clone(), &app_data_dir);
            let session = identity
                .current_session()
                .await?
                .ok_or(AppError::NotSignedIn)?;

            tracing::info!("Using sqlite backend for {}", session.email);
            let repo = Repository::new(pool, session.user_id.clone(), feed);
            (Backend::Sqlite(repo), Some(identity), Some(session))
        }
        BackendKind::Local => {
            let path = app_data_dir.join(config::LOCAL_STORE_FILE_NAME);
            tracing::info!("Using local backend at {:?}", path);
            let local = LocalStore::open(path, feed).await?;
            (Backend::Local(local), None, None)
        }
    };

    let state = AppState::for_backend(app_data_dir, settings, backend, identity, session);
    state.store.reload().await?;

    tracing::info!("Application initialized successfully");

    Ok(state)
}
