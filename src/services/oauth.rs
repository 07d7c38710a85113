// src/services/oauth.rs
//! Authorization-code flow against Google and Facebook

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::auth::models::{Provider, ProviderProfile};
use crate::common::config::{AppConfig, OAuthCredentials};

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("{0} OAuth not configured")]
    NotConfigured(Provider),

    #[error("OAuth flow failed: {0}")]
    OAuthFailed(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Unexpected provider response: {0}")]
    InvalidProfile(String),
}

/// Provider endpoints and requested scopes
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub profile_url: String,
    pub scope: &'static str,
}

impl ProviderEndpoints {
    pub fn for_provider(provider: Provider) -> Self {
        match provider {
            Provider::Google => Self {
                authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token_url: "https://oauth2.googleapis.com/token".to_string(),
                profile_url: "https://www.googleapis.com/oauth2/v3/userinfo".to_string(),
                scope: "openid profile email",
            },
            Provider::Facebook => Self {
                authorize_url: "https://www.facebook.com/v18.0/dialog/oauth".to_string(),
                token_url: "https://graph.facebook.com/v18.0/oauth/access_token".to_string(),
                profile_url: "https://graph.facebook.com/me?fields=id,name,email,picture.type(large)"
                    .to_string(),
                scope: "email,public_profile",
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Client for one configured provider
#[derive(Debug, Clone)]
pub struct OAuthProviderClient {
    provider: Provider,
    credentials: OAuthCredentials,
    redirect_uri: String,
    endpoints: ProviderEndpoints,
    client: Client,
}

impl OAuthProviderClient {
    pub fn new(
        provider: Provider,
        credentials: OAuthCredentials,
        public_base_url: &str,
        client: Client,
    ) -> Self {
        Self {
            provider,
            credentials,
            redirect_uri: callback_url(public_base_url, provider),
            endpoints: ProviderEndpoints::for_provider(provider),
            client,
        }
    }

    /// Provider consent page the browser is redirected to
    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.endpoints.authorize_url,
            urlencoding::encode(&self.credentials.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(self.endpoints.scope),
            urlencoding::encode(state)
        )
    }

    /// Trades the callback `code` for a provider access token
    pub async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        let params = [
            ("code", code),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        debug!(provider = %self.provider, "Exchanging authorization code for tokens");

        let response = self
            .client
            .post(&self.endpoints.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| OAuthError::RequestFailed(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(provider = %self.provider, status = %status, error = %error_text, "Token exchange failed");
            return Err(OAuthError::OAuthFailed(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| OAuthError::OAuthFailed(e.to_string()))?;

        Ok(token.access_token)
    }

    pub async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, OAuthError> {
        let response = self
            .client
            .get(&self.endpoints.profile_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| OAuthError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            error!(provider = %self.provider, status = %status, "Profile request failed");
            return Err(OAuthError::OAuthFailed(format!("HTTP {}", status)));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| OAuthError::InvalidProfile(e.to_string()))?;

        let profile = parse_profile(self.provider, &body)?;
        info!(provider = %self.provider, "Fetched provider profile");
        Ok(profile)
    }

    /// Full exchange: code to access token to normalized profile
    pub async fn authenticate(&self, code: &str) -> Result<ProviderProfile, OAuthError> {
        let access_token = self.exchange_code(code).await?;
        self.fetch_profile(&access_token).await
    }
}

/// `{public_base_url}/auth/{provider}/callback`
pub fn callback_url(public_base_url: &str, provider: Provider) -> String {
    format!("{}/auth/{}/callback", public_base_url, provider)
}

pub fn parse_profile(provider: Provider, body: &Value) -> Result<ProviderProfile, OAuthError> {
    match provider {
        Provider::Google => parse_google_profile(body),
        Provider::Facebook => parse_facebook_profile(body),
    }
}

/// OpenID userinfo: `sub`, `name`, `email`, `picture`
pub fn parse_google_profile(body: &Value) -> Result<ProviderProfile, OAuthError> {
    let provider_id = string_field(body, "sub")
        .or_else(|| string_field(body, "id"))
        .ok_or_else(|| OAuthError::InvalidProfile("missing subject".to_string()))?;
    let email = string_field(body, "email");

    Ok(ProviderProfile {
        display_name: display_name(string_field(body, "name"), email.as_deref()),
        provider_id,
        email,
        avatar_url: string_field(body, "picture"),
    })
}

/// Graph API `/me`: `id`, `name`, `email`, `picture.data.url`
pub fn parse_facebook_profile(body: &Value) -> Result<ProviderProfile, OAuthError> {
    let provider_id = string_field(body, "id")
        .ok_or_else(|| OAuthError::InvalidProfile("missing id".to_string()))?;
    let email = string_field(body, "email");
    let avatar_url = body
        .pointer("/picture/data/url")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(ProviderProfile {
        display_name: display_name(string_field(body, "name"), email.as_deref()),
        provider_id,
        email,
        avatar_url,
    })
}

fn string_field(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Falls back to the email's local part when the provider sends no name
fn display_name(name: Option<String>, email: Option<&str>) -> String {
    name.or_else(|| {
        email
            .and_then(|e| e.split('@').next())
            .filter(|local| !local.is_empty())
            .map(str::to_string)
    })
    .unwrap_or_else(|| "User".to_string())
}

/// Configured provider clients; unconfigured providers are `None`
#[derive(Debug, Clone, Default)]
pub struct OAuthClients {
    pub google: Option<Arc<OAuthProviderClient>>,
    pub facebook: Option<Arc<OAuthProviderClient>>,
}

impl OAuthClients {
    pub fn from_config(config: &AppConfig, client: Client) -> Self {
        let build = |provider: Provider, credentials: &Option<OAuthCredentials>| {
            credentials.clone().map(|creds| {
                info!(provider = %provider, "OAuth provider configured");
                Arc::new(OAuthProviderClient::new(
                    provider,
                    creds,
                    &config.public_base_url,
                    client.clone(),
                ))
            })
        };

        Self {
            google: build(Provider::Google, &config.google),
            facebook: build(Provider::Facebook, &config.facebook),
        }
    }

    pub fn get(&self, provider: Provider) -> Result<Arc<OAuthProviderClient>, OAuthError> {
        let client = match provider {
            Provider::Google => self.google.clone(),
            Provider::Facebook => self.facebook.clone(),
        };
        client.ok_or(OAuthError::NotConfigured(provider))
    }
}
