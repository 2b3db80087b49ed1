//! Account storage
//!
//! Email and password-hash records for the identity service. Accounts are
//! not user-scoped: lookups happen before anyone is signed in.

use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Accounts {
    pool: SqlitePool,
}

impl Accounts {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, email, password_hash, created_at FROM accounts WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, email, password_hash, created_at FROM accounts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Insert an account together with its first profile row
    pub async fn create(
        &self,
        email: &str,
        password_hash: &str,
        display_name: &str,
    ) -> Result<Account> {
        if self.find_by_email(email).await?.is_some() {
            return Err(AppError::Auth("An account with this email already exists".to_string()));
        }

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO accounts (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&account.id)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO profiles (id, display_name, avatar_url, updated_at) VALUES (?, ?, NULL, ?)",
        )
        .bind(&account.id)
        .bind(display_name)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("Created account: {}", account.id);
        Ok(account)
    }

    pub async fn update_password_hash(&self, id: &str, password_hash: &str) -> Result<()> {
        let result = sqlx::query("UPDATE accounts SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Auth(format!("No account with id {}", id)));
        }

        tracing::debug!("Updated password for account: {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::initialize_database;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_accounts() -> Accounts {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        initialize_database(&pool).await.unwrap();
        Accounts::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let accounts = create_test_accounts().await;

        let created = accounts.create("sam@example.com", "hash", "Sam").await.unwrap();

        let by_email = accounts.find_by_email("sam@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);

        let by_id = accounts.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "sam@example.com");

        let name: String = sqlx::query_scalar("SELECT display_name FROM profiles WHERE id = ?")
            .bind(&created.id)
            .fetch_one(&accounts.pool)
            .await
            .unwrap();
        assert_eq!(name, "Sam");
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let accounts = create_test_accounts().await;
        accounts.create("sam@example.com", "hash", "Sam").await.unwrap();

        let result = accounts.create("sam@example.com", "other", "Sam 2").await;
        assert!(matches!(result, Err(AppError::Auth(_))));
    }

    #[tokio::test]
    async fn test_update_password_hash() {
        let accounts = create_test_accounts().await;
        let account = accounts.create("sam@example.com", "old", "Sam").await.unwrap();

        accounts.update_password_hash(&account.id, "new").await.unwrap();
        let reloaded = accounts.find_by_id(&account.id).await.unwrap().unwrap();
        assert_eq!(reloaded.password_hash, "new");

        assert!(accounts.update_password_hash("missing", "x").await.is_err());
    }
}
