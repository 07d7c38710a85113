//! Fixtures shared by unit and router tests

use async_trait::async_trait;
use reqwest::Client;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};

use super::config::AppConfig;
use super::migrations::create_schema;
use super::state::AppState;
use crate::auth::password::CredentialHasher;
use crate::auth::service::AuthService;
use crate::auth::store::SqliteCredentialStore;
use crate::auth::tokens::TokenIssuer;
use crate::services::email::{EmailMessage, MailError, Mailer};
use crate::services::oauth::OAuthClients;

/// In-memory database with the production schema
///
/// A single connection keeps every query on the same in-memory database.
pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    create_schema(&pool).await.unwrap();
    pool
}

/// Keeps every message instead of sending it
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Plaintext token from the most recent reset link
    pub fn last_reset_token(&self) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let body = &sent.last()?.text_body;
        let rest = body.split("token=").nth(1)?;
        Some(rest.split('&').next()?.to_string())
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Rejects every message
#[derive(Debug, Default)]
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _message: &EmailMessage) -> Result<(), MailError> {
        Err(MailError::SESError("transport unavailable".to_string()))
    }
}

pub fn test_config(dev_mode: bool) -> AppConfig {
    let mut config = AppConfig::for_tests();
    config.dev_mode.enabled = dev_mode;
    config
}

pub fn test_auth_service(
    pool: &SqlitePool,
    mailer: Arc<dyn Mailer>,
    dev_mode: bool,
) -> AuthService {
    let config = test_config(dev_mode);
    AuthService::new(
        Arc::new(SqliteCredentialStore::new(pool.clone())),
        mailer,
        CredentialHasher::for_tests(),
        TokenIssuer::new(&config.jwt_secret),
        &config,
    )
}

pub fn test_state(pool: &SqlitePool, mailer: Arc<dyn Mailer>) -> Arc<AppState> {
    let config = test_config(false);
    Arc::new(AppState {
        db: pool.clone(),
        auth: Arc::new(test_auth_service(pool, mailer, false)),
        oauth: OAuthClients::from_config(&config, Client::new()),
        config: Arc::new(config),
    })
}
