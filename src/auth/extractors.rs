//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::common::{safe_email_log, safe_token_log, ApiError, AppState};

/// Authenticated user extractor
///
/// Validates the `Authorization: Bearer <token>` header. Identity comes from
/// the token claims alone; no database lookup is made.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(app_state): Extension<Arc<AppState>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let token = match header.and_then(|h| h.strip_prefix("Bearer ")).map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => {
                warn!("Authentication failed: missing bearer token");
                return Err(ApiError::Unauthorized("Access denied. No token provided".into()));
            }
        };

        let claims = app_state.auth.authenticate(token).map_err(|e| {
            warn!(token = %safe_token_log(token), "Bearer token rejected");
            e
        })?;

        debug!(
            user_id = %claims.id,
            email = %safe_email_log(&claims.email),
            "User authenticated via bearer token"
        );

        Ok(AuthedUser { id: claims.id })
    }
}
