//! Authentication handlers

use axum::{
    extract::{rejection::JsonRejection, Extension, Json, Path, Query},
    http::StatusCode,
    response::Redirect,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::extractors::AuthedUser;
use super::models::{
    ChangePasswordRequest, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest,
    LoginResponse, MessageResponse, OAuthCallbackQuery, ProfileResponse, Provider,
    ResetPasswordRequest, SignupRequest, SignupResponse,
};
use crate::common::{ApiError, AppState};

/// Unwraps a JSON body, turning extractor rejections into a 400 with our error shape
pub(crate) fn json_body<T: DeserializeOwned>(
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, ApiError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "Rejected request body");
            Err(ApiError::BadRequest("Invalid request body".to_string()))
        }
    }
}

/// POST /api/auth/signup
///
/// # Request Body
/// ```json
/// { "name": "Ann", "email": "ann@x.com", "password": "Abcd123!" }
/// ```
///
/// # Response
/// `201 { "message": "Registered successfully", "userId": "U_..." }`
pub async fn signup(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    let req = json_body(payload)?;
    let response = state.auth.signup(req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/auth/login
///
/// # Request Body
/// ```json
/// { "email": "ann@x.com", "password": "Abcd123!", "rememberMe": true }
/// ```
///
/// # Response
/// ```json
/// { "message": "Login successful", "token": "<jwt>", "user": { ... }, "expiresIn": "30d" }
/// ```
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let req = json_body(payload)?;
    Ok(Json(state.auth.login(req).await?))
}

/// POST /api/auth/forgot-password
///
/// Answers identically whether or not the email has an account.
pub async fn forgot_password(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<Json<ForgotPasswordResponse>, ApiError> {
    let req = json_body(payload)?;
    Ok(Json(state.auth.forgot_password(req).await?))
}

/// POST /api/auth/reset-password
pub async fn reset_password(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let req = json_body(payload)?;
    Ok(Json(state.auth.reset_password(req).await?))
}

/// POST /api/auth/change-password
pub async fn change_password(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthedUser,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let req = json_body(payload)?;
    Ok(Json(state.auth.change_password(&user.id, req).await?))
}

/// GET /api/auth/profile
pub async fn profile(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthedUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    Ok(Json(state.auth.profile(&user.id).await?))
}

/// Holds the OAuth state nonce between the start and callback requests
pub const OAUTH_NONCE_COOKIE: &str = "oauth_nonce";

const OAUTH_COOKIE_PATH: &str = "/auth";

fn nonce_cookie(nonce: String, secure: bool) -> Cookie<'static> {
    Cookie::build((OAUTH_NONCE_COOKIE, nonce))
        .path(OAUTH_COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

fn parse_provider(raw: &str) -> Result<Provider, ApiError> {
    raw.parse::<Provider>()
        .map_err(|_| ApiError::NotFound("Unknown provider".to_string()))
}

/// GET /auth/:provider
/// Redirects the browser to the provider's consent screen
pub async fn oauth_start(
    Extension(state): Extension<Arc<AppState>>,
    Path(provider): Path<String>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    let provider = parse_provider(&provider)?;
    let client = state.oauth.get(provider).map_err(|e| {
        warn!(provider = %provider, "OAuth start requested for unconfigured provider");
        ApiError::NotFound(e.to_string())
    })?;

    let issued = state.auth.tokens().issue_oauth_state(provider)?;
    let secure = state.config.public_base_url.starts_with("https://");

    info!(provider = %provider, "Redirecting to OAuth consent screen");
    Ok((
        jar.add(nonce_cookie(issued.nonce, secure)),
        Redirect::to(&client.authorization_url(&issued.state)),
    ))
}

/// GET /auth/:provider/callback
/// Always ends in a redirect to the frontend, carrying a token on success.
/// The nonce cookie is cleared either way.
pub async fn oauth_callback(
    Extension(state): Extension<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<OAuthCallbackQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    let provider = parse_provider(&provider)?;
    let nonce = jar
        .get(OAUTH_NONCE_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .unwrap_or_default();

    let target = complete_oauth(&state, provider, &query, &nonce).await;
    let jar = jar.remove(Cookie::build(OAUTH_NONCE_COOKIE).path(OAUTH_COOKIE_PATH));
    Ok((jar, Redirect::to(&target)))
}

async fn complete_oauth(
    state: &AppState,
    provider: Provider,
    query: &OAuthCallbackQuery,
    nonce: &str,
) -> String {
    let failure = || state.auth.oauth_failure_redirect();

    if let Some(error) = query.error.as_deref() {
        warn!(provider = %provider, error = %error, "Provider reported an OAuth error");
        return failure();
    }

    let (code, oauth_state) = match (query.code.as_deref(), query.state.as_deref()) {
        (Some(code), Some(s)) if !code.is_empty() => (code, s),
        _ => {
            warn!(provider = %provider, "OAuth callback missing code or state");
            return failure();
        }
    };

    if state
        .auth
        .tokens()
        .verify_oauth_state(oauth_state, provider, nonce)
        .is_err()
    {
        warn!(provider = %provider, "OAuth callback with invalid state or nonce");
        return failure();
    }

    let client = match state.oauth.get(provider) {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "OAuth callback for unconfigured provider");
            return failure();
        }
    };

    let profile = match client.authenticate(code).await {
        Ok(profile) => profile,
        Err(e) => {
            warn!(error = %e, provider = %provider, "OAuth code exchange failed");
            return failure();
        }
    };

    state.auth.oauth_callback(provider, &profile).await
}
