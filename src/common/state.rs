// Application state shared across all modules

use sqlx::SqlitePool;
use std::sync::Arc;

use super::config::AppConfig;
use crate::auth::service::AuthService;
use crate::services::oauth::OAuthClients;

/// Built once in `main`, shared read-only by every request
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
    pub oauth: OAuthClients,
}
