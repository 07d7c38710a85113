//! Credential store: persistence of users and password reset tokens

use async_trait::async_trait;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, error};

use super::models::{NewUser, Provider, ResetToken, User};
use crate::common::generate_user_id;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write; carries a client-safe message
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Maps unique-constraint violations to `Conflict`, everything else to `Database`
fn classify(err: sqlx::Error, conflict_message: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::Conflict(conflict_message.to_string())
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_provider(
        &self,
        provider: Provider,
        provider_id: &str,
    ) -> Result<Option<User>, StoreError>;

    /// Inserts a user, assigning its id
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Returns false when no user has the given id
    async fn update_password(&self, user_id: &str, password_hash: &str)
        -> Result<bool, StoreError>;

    /// Attaches a provider identity to an existing user and refreshes its
    /// name and picture. Returns the updated row, or `None` if the user is gone.
    async fn link_provider(
        &self,
        user_id: &str,
        provider: Provider,
        provider_id: &str,
        name: &str,
        profile_picture: Option<&str>,
    ) -> Result<Option<User>, StoreError>;

    async fn insert_reset_token(&self, token: &ResetToken) -> Result<(), StoreError>;

    /// Most recently created unused token for `(email, token_hash)` that
    /// expires after `now_ms`
    async fn find_active_reset_token(
        &self,
        email: &str,
        token_hash: &str,
        now_ms: i64,
    ) -> Result<Option<ResetToken>, StoreError>;

    /// Atomically flips a live token to used. Returns false when another
    /// redemption already claimed it or it expired before `now_ms`.
    async fn claim_reset_token(&self, id: &str, now_ms: i64) -> Result<bool, StoreError>;

    async fn delete_reset_token(&self, id: &str) -> Result<(), StoreError>;
}

/// SQLite implementation of [`CredentialStore`]
#[derive(Debug, Clone)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_provider(
        &self,
        provider: Provider,
        provider_id: &str,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT * FROM users WHERE {} = ?", provider.id_column());
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(provider_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let id = generate_user_id();
        let (google_id, facebook_id) = match &new_user.provider {
            Some((Provider::Google, pid)) => (Some(pid.as_str()), None),
            Some((Provider::Facebook, pid)) => (None, Some(pid.as_str())),
            None => (None, None),
        };

        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, google_id, facebook_id, profile_picture) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(new_user.password_hash.as_deref())
        .bind(google_id)
        .bind(facebook_id)
        .bind(new_user.profile_picture.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let classified = classify(e, "Email already exists");
            if let StoreError::Database(db) = &classified {
                error!(error = %db, user_id = %id, "Database error inserting user");
            }
            classified
        })?;

        debug!(user_id = %id, "Inserted user, fetching record");

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(&id)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_password(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn link_provider(
        &self,
        user_id: &str,
        provider: Provider,
        provider_id: &str,
        name: &str,
        profile_picture: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "UPDATE users SET {} = ?, name = ?, profile_picture = ? WHERE id = ?",
            provider.id_column()
        );
        let result = sqlx::query(&sql)
            .bind(provider_id)
            .bind(name)
            .bind(profile_picture)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| classify(e, "Provider account already linked"))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_user_by_id(user_id).await
    }

    async fn insert_reset_token(&self, token: &ResetToken) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO password_reset_tokens (id, email, token_hash, expires_at, created_at, used) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&token.id)
        .bind(&token.email)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(token.created_at)
        .bind(token.used)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_active_reset_token(
        &self,
        email: &str,
        token_hash: &str,
        now_ms: i64,
    ) -> Result<Option<ResetToken>, StoreError> {
        let token = sqlx::query_as::<_, ResetToken>(
            r#"
            SELECT * FROM password_reset_tokens
            WHERE email = ? AND token_hash = ? AND used = 0 AND expires_at > ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(token_hash)
        .bind(now_ms)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }

    async fn claim_reset_token(&self, id: &str, now_ms: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE password_reset_tokens SET used = 1 WHERE id = ? AND used = 0 AND expires_at > ?",
        )
        .bind(id)
        .bind(now_ms)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_reset_token(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM password_reset_tokens WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
