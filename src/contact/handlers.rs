// src/contact/handlers.rs
//! Contact form handler - stores submissions for follow-up

use axum::{
    extract::{rejection::JsonRejection, Extension},
    Json,
};
use std::sync::Arc;
use tracing::{error, info};

use super::models::{ContactRequest, ContactResponse};
use super::validators::ContactValidator;
use crate::auth::handlers::json_body;
use crate::common::validation::present;
use crate::common::{generate_contact_id, safe_email_log, ApiError, AppState, Validator};

/// POST /api/contact - Submit contact form (public endpoint)
pub async fn submit_contact_form(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<ContactRequest>, JsonRejection>,
) -> Result<Json<ContactResponse>, ApiError> {
    let request = json_body(payload)?;
    ContactValidator.validate(&request).into_result()?;

    let id = generate_contact_id();
    let email = present(&request.email).unwrap_or_default();

    sqlx::query(
        "INSERT INTO contacts (id, name, email, company, message) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(present(&request.name))
    .bind(email)
    .bind(present(&request.company))
    .bind(present(&request.message))
    .execute(&state.db)
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to store contact form submission");
        ApiError::DatabaseError(e)
    })?;

    info!(
        contact_id = %id,
        from_email = %safe_email_log(email),
        "Contact form submission stored"
    );

    Ok(Json(ContactResponse {
        message: "Form submitted successfully".to_string(),
    }))
}
