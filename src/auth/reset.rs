//! Single-use, time-limited password reset tokens

use chrono::{Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use super::models::ResetToken;
use super::password::{CredentialHasher, HashError};
use super::store::{CredentialStore, StoreError};
use crate::common::{generate_reset_token_id, safe_email_log};
use crate::services::email::{password_reset_email, MailError, Mailer};

pub const RESET_TOKEN_TTL_MINUTES: i64 = 10;

/// Entropy of a reset token before hex encoding
const RESET_TOKEN_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum ResetError {
    #[error("invalid or expired reset token")]
    InvalidOrExpired,

    #[error("user not found")]
    UserNotFound,

    #[error("failed to deliver reset email: {0}")]
    Delivery(#[from] MailError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Hash(#[from] HashError),
}

/// Hex encoded random token handed to the user
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// One-way digest stored in place of the token
pub fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Link consumed by the frontend reset page
pub fn reset_url(frontend_url: &str, token: &str, email: &str) -> String {
    format!(
        "{}/reset-password?token={}&email={}",
        frontend_url,
        urlencoding::encode(token),
        urlencoding::encode(email)
    )
}

pub struct ResetTokenManager {
    store: Arc<dyn CredentialStore>,
    mailer: Arc<dyn Mailer>,
    hasher: CredentialHasher,
    frontend_url: String,
    ttl: Duration,
}

impl ResetTokenManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        mailer: Arc<dyn Mailer>,
        hasher: CredentialHasher,
        frontend_url: String,
    ) -> Self {
        Self {
            store,
            mailer,
            hasher,
            frontend_url,
            ttl: Duration::minutes(RESET_TOKEN_TTL_MINUTES),
        }
    }

    /// Issues and mails a reset link if `email` belongs to a user.
    ///
    /// Returns the link that was sent, or `None` for unknown emails. Callers
    /// must answer both cases identically.
    pub async fn request(&self, email: &str) -> Result<Option<String>, ResetError> {
        let user = match self.store.find_user_by_email(email).await? {
            Some(user) => user,
            None => {
                info!(email = %safe_email_log(email), "Password reset requested for unknown email");
                return Ok(None);
            }
        };

        let token = generate_reset_token();
        let now = Utc::now();
        let record = ResetToken {
            id: generate_reset_token_id(),
            email: user.email.clone(),
            token_hash: hash_reset_token(&token),
            expires_at: (now + self.ttl).timestamp_millis(),
            created_at: now.timestamp_millis(),
            used: false,
        };
        self.store.insert_reset_token(&record).await?;

        let url = reset_url(&self.frontend_url, &token, &user.email);
        let message =
            password_reset_email(&user.email, &user.name, &url, self.ttl.num_minutes());

        if let Err(e) = self.mailer.send(&message).await {
            error!(
                error = %e,
                email = %safe_email_log(&user.email),
                "Failed to send password reset email, revoking token"
            );
            if let Err(del) = self.store.delete_reset_token(&record.id).await {
                warn!(error = %del, token_id = %record.id, "Failed to delete undelivered reset token");
            }
            return Err(ResetError::Delivery(e));
        }

        info!(
            user_id = %user.id,
            token_id = %record.id,
            "Password reset token issued"
        );
        Ok(Some(url))
    }

    /// Sets a new password if `token` is the live token for `email`.
    ///
    /// `new_password` must already satisfy the password policy.
    pub async fn redeem(
        &self,
        email: &str,
        token: &str,
        new_password: &str,
    ) -> Result<(), ResetError> {
        let now_ms = Utc::now().timestamp_millis();
        let record = self
            .store
            .find_active_reset_token(email, &hash_reset_token(token), now_ms)
            .await?
            .ok_or(ResetError::InvalidOrExpired)?;

        let user = self
            .store
            .find_user_by_email(email)
            .await?
            .ok_or(ResetError::UserNotFound)?;

        let digest = self.hasher.hash(new_password).await?;

        // Only one concurrent redemption wins the claim
        if !self
            .store
            .claim_reset_token(&record.id, Utc::now().timestamp_millis())
            .await?
        {
            warn!(token_id = %record.id, "Reset token claimed by a concurrent redemption");
            return Err(ResetError::InvalidOrExpired);
        }

        if !self.store.update_password(&user.id, &digest).await? {
            return Err(ResetError::UserNotFound);
        }

        info!(user_id = %user.id, "Password reset completed");
        Ok(())
    }
}
