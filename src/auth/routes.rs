//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `POST /api/auth/signup` - Register with email and password
/// - `POST /api/auth/login` - Credential login
/// - `POST /api/auth/forgot-password` - Request a reset link
/// - `POST /api/auth/reset-password` - Redeem a reset link
/// - `POST /api/auth/change-password` - Change password (bearer)
/// - `GET /api/auth/profile` - Current user (bearer)
/// - `GET /auth/:provider` - Start Google/Facebook OAuth
/// - `GET /auth/:provider/callback` - OAuth callback
pub fn auth_routes() -> Router {
    Router::new()
        .route("/api/auth/signup", post(handlers::signup))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/forgot-password", post(handlers::forgot_password))
        .route("/api/auth/reset-password", post(handlers::reset_password))
        .route("/api/auth/change-password", post(handlers::change_password))
        .route("/api/auth/profile", get(handlers::profile))
        .route("/auth/:provider", get(handlers::oauth_start))
        .route("/auth/:provider/callback", get(handlers::oauth_callback))
}
