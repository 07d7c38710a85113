// src/common/config.rs
//! Process configuration, read once from the environment at startup

use std::env;
use thiserror::Error;

use super::dev_mode::DevModeConfig;

const DEFAULT_DATABASE_URL: &str = "sqlite://site_api.db";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";
const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Client credentials for one OAuth provider
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// SES sender settings; credentials come from the default AWS chain
#[derive(Debug, Clone)]
pub struct SesSettings {
    pub from_email: String,
    pub region: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    /// Base URL of the React frontend, used for redirects and reset links
    pub frontend_url: String,
    /// Externally reachable base URL of this API, used for OAuth callbacks
    pub public_base_url: String,
    pub google: Option<OAuthCredentials>,
    pub facebook: Option<OAuthCredentials>,
    pub ses: Option<SesSettings>,
    pub cors_origins: Vec<String>,
    pub port: u16,
    pub dev_mode: DevModeConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = non_empty("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let google = oauth_credentials("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET");
        let facebook = oauth_credentials("FACEBOOK_APP_ID", "FACEBOOK_APP_SECRET");

        let ses = non_empty("AWS_SES_FROM_EMAIL").map(|from_email| SesSettings {
            from_email,
            region: non_empty("AWS_SES_REGION")
                .or_else(|| non_empty("AWS_REGION"))
                .unwrap_or_else(|| "us-east-1".to_string()),
        });

        let cors_origins = non_empty("CORS_ORIGINS")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        Ok(Self {
            database_url: non_empty("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            jwt_secret,
            frontend_url: trim_slash(
                non_empty("FRONTEND_URL").unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string()),
            ),
            public_base_url: trim_slash(
                non_empty("PUBLIC_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string()),
            ),
            google,
            facebook,
            ses,
            cors_origins,
            port,
            dev_mode: DevModeConfig::from_env(),
        })
    }

    /// Configuration used by unit tests
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test_secret_key".to_string(),
            frontend_url: "http://frontend.test".to_string(),
            public_base_url: "http://api.test".to_string(),
            google: Some(OAuthCredentials {
                client_id: "google-client".to_string(),
                client_secret: "google-secret".to_string(),
            }),
            facebook: None,
            ses: None,
            cors_origins: vec![],
            port: 0,
            dev_mode: DevModeConfig::default(),
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn oauth_credentials(id_key: &str, secret_key: &str) -> Option<OAuthCredentials> {
    Some(OAuthCredentials {
        client_id: non_empty(id_key)?,
        client_secret: non_empty(secret_key)?,
    })
}

fn trim_slash(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
