//! Identity service
//!
//! Email/password accounts for the relational backend. Passwords are stored
//! as Argon2id PHC strings; the signed-in session is a small JSON file in
//! the data directory.

use crate::config;
use crate::database::{Account, Accounts};
use crate::error::{AppError, Result};
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tokio::fs;

const SALT_SIZE: usize = 16;

/// Who is signed in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub signed_in_at: DateTime<Utc>,
}

/// Hash a password with Argon2id and a random salt
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);

    let salt_string = SaltString::encode_b64(&salt)
        .map_err(|e| AppError::Generic(format!("Salt encoding failed: {}", e)))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt_string)
        .map_err(|e| AppError::Generic(format!("Password hashing failed: {}", e)))?;

    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AppError::Generic(format!("Stored hash is invalid: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(AppError::Validation(format!("Not an email address: {}", email)));
    }
    Ok(email)
}

fn check_password(password: &str) -> Result<()> {
    if password.chars().count() < config::MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            config::MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

pub struct IdentityService {
    accounts: Accounts,
    session_path: PathBuf,
}

impl IdentityService {
    pub fn new(pool: SqlitePool, data_dir: &Path) -> Self {
        Self {
            accounts: Accounts::new(pool),
            session_path: data_dir.join(config::SESSION_FILE_NAME),
        }
    }

    /// Create an account and its profile, then sign in as it
    pub async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<Session> {
        let email = normalize_email(email)?;
        check_password(password)?;

        let display_name = match display_name.trim() {
            "" => email.split('@').next().unwrap_or_default().to_string(),
            name => name.to_string(),
        };

        let hash = hash_password(password)?;
        let account = self.accounts.create(&email, &hash, &display_name).await?;

        tracing::info!("Signed up: {}", account.email);
        self.start_session(&account).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email)?;

        // Same message for unknown email and wrong password
        let account = self
            .accounts
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::Auth("Invalid email or password".to_string()))?;

        if !verify_password(password, &account.password_hash)? {
            tracing::warn!("Failed sign-in for {}", email);
            return Err(AppError::Auth("Invalid email or password".to_string()));
        }

        tracing::info!("Signed in: {}", account.email);
        self.start_session(&account).await
    }

    pub async fn update_password(&self, user_id: &str, old: &str, new: &str) -> Result<()> {
        check_password(new)?;

        let account = self
            .accounts
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotSignedIn)?;

        if !verify_password(old, &account.password_hash)? {
            return Err(AppError::Auth("Current password is incorrect".to_string()));
        }

        let hash = hash_password(new)?;
        self.accounts.update_password_hash(user_id, &hash).await?;

        tracing::info!("Password updated for {}", account.email);
        Ok(())
    }

    /// Forget the session. Signing out twice is fine.
    pub async fn sign_out(&self) -> Result<()> {
        match fs::remove_file(&self.session_path).await {
            Ok(()) => {
                tracing::info!("Signed out");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// The persisted session, if one exists and its account still does
    pub async fn current_session(&self) -> Result<Option<Session>> {
        if !fs::try_exists(&self.session_path).await? {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.session_path).await?;
        let session: Session = match serde_json::from_str(&contents) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Ignoring unreadable session file: {}", e);
                return Ok(None);
            }
        };

        if self.accounts.find_by_id(&session.user_id).await?.is_none() {
            tracing::warn!("Session refers to a missing account, ignoring it");
            return Ok(None);
        }

        Ok(Some(session))
    }

    async fn start_session(&self, account: &Account) -> Result<Session> {
        let session = Session {
            user_id: account.id.clone(),
            email: account.email.clone(),
            signed_in_at: Utc::now(),
        };

        if let Some(parent) = self.session_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&session)?;
        fs::write(&self.session_path, json).await?;

        Ok(session)
    }
}
