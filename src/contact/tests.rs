// src/contact/tests.rs

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::build_router;
    use crate::common::test_support::{setup_test_db, test_state, RecordingMailer};
    use crate::common::Validator;
    use crate::contact::models::ContactRequest;
    use crate::contact::validators::{ContactValidator, REQUIRED_FIELDS_MISSING};

    /// Row as stored in `contacts`
    #[derive(Debug, sqlx::FromRow)]
    struct ContactSubmission {
        id: String,
        company: Option<String>,
        message: String,
    }

    fn request(body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/api/contact")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn test_contact_validator_valid_request() {
        let request = ContactRequest {
            name: Some("Ann".to_string()),
            email: Some("ann@x.com".to_string()),
            company: None,
            message: Some("Hello".to_string()),
        };

        let result = ContactValidator.validate(&request);
        assert!(result.is_valid);
        assert_eq!(result.errors.len(), 0);
    }

    #[test]
    fn test_contact_validator_missing_fields() {
        let request = ContactRequest {
            name: Some("  ".to_string()),
            ..Default::default()
        };

        let result = ContactValidator.validate(&request);
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 3);
        assert!(result.errors.iter().all(|e| e.message == REQUIRED_FIELDS_MISSING));
    }

    #[tokio::test]
    async fn test_submit_contact_form() {
        let pool = setup_test_db().await;
        let app = build_router(test_state(&pool, Arc::new(RecordingMailer::default())));

        let response = app
            .oneshot(request(json!({
                "name": "Ann",
                "email": "ann@x.com",
                "company": "Acme",
                "message": "Please call me"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Form submitted successfully");

        let stored = sqlx::query_as::<_, ContactSubmission>(
            "SELECT id, company, message FROM contacts",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(stored.id.starts_with("C_"));
        assert_eq!(stored.company.as_deref(), Some("Acme"));
        assert_eq!(stored.message, "Please call me");
    }

    #[tokio::test]
    async fn test_submit_contact_form_missing_fields() {
        let pool = setup_test_db().await;
        let app = build_router(test_state(&pool, Arc::new(RecordingMailer::default())));

        let response = app
            .oneshot(request(json!({"name": "Ann", "email": "ann@x.com"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], REQUIRED_FIELDS_MISSING);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contacts")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
