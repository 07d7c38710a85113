// src/services/email.rs
//! Transactional email: the `Mailer` sink, its SES and log-only
//! implementations, and message templates.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sesv2::config::Region;
use aws_sdk_sesv2::Client as SesClient;
use tera::escape_html;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::common::config::SesSettings;
use crate::common::safe_email_log;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("SES operation failed: {0}")]
    SESError(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

/// A single outbound email
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Fire-and-forget notification sink
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Sends mail through AWS SES v2
#[derive(Debug, Clone)]
pub struct SesMailer {
    client: SesClient,
    from_email: String,
}

impl SesMailer {
    /// Builds the SES client once; credentials come from the default AWS chain
    pub async fn new(settings: &SesSettings) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .load()
            .await;

        info!(region = %settings.region, "SES mailer initialized");

        Self {
            client: SesClient::new(&aws_config),
            from_email: settings.from_email.clone(),
        }
    }
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        use aws_sdk_sesv2::types::{Body as SesBody, Content, Destination, EmailContent, Message};

        let destination = Destination::builder()
            .to_addresses(message.to.clone())
            .build();

        let subject_content = Content::builder()
            .data(&message.subject)
            .charset("UTF-8")
            .build()
            .map_err(|e| MailError::InvalidMessage(format!("Failed to build subject: {}", e)))?;

        let html_content = Content::builder()
            .data(&message.html_body)
            .charset("UTF-8")
            .build()
            .map_err(|e| MailError::InvalidMessage(format!("Failed to build body: {}", e)))?;

        let text_content = Content::builder()
            .data(&message.text_body)
            .charset("UTF-8")
            .build()
            .map_err(|e| MailError::InvalidMessage(format!("Failed to build body: {}", e)))?;

        let ses_body = SesBody::builder()
            .html(html_content)
            .text(text_content)
            .build();

        let ses_message = Message::builder()
            .subject(subject_content)
            .body(ses_body)
            .build();

        let email_content = EmailContent::builder().simple(ses_message).build();

        let result = self
            .client
            .send_email()
            .from_email_address(&self.from_email)
            .destination(destination)
            .content(email_content)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, to = %safe_email_log(&message.to), "Failed to send email via SES");
                MailError::SESError(format!("Send failed: {}", e))
            })?;

        info!(
            to = %safe_email_log(&message.to),
            message_id = ?result.message_id(),
            "Email sent successfully via SES"
        );
        Ok(())
    }
}

/// Mailer used when no transport is configured; only records the attempt
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        info!(
            to = %safe_email_log(&message.to),
            subject = %message.subject,
            "Email transport not configured, message not delivered"
        );
        debug!(body = %message.text_body, "Undelivered email body");
        Ok(())
    }
}

/// Password reset message carrying the plaintext reset link
pub fn password_reset_email(to: &str, name: &str, reset_url: &str, ttl_minutes: i64) -> EmailMessage {
    let html_body = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .header {{ background-color: #4F46E5; color: white; padding: 20px; text-align: center; }}
        .content {{ padding: 20px; background-color: #f9f9f9; }}
        .footer {{ padding: 20px; text-align: center; font-size: 12px; color: #666; }}
        .button {{ display: inline-block; padding: 12px 24px; background-color: #4F46E5; color: white; text-decoration: none; border-radius: 5px; margin: 10px 0; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>Reset your password</h1>
        </div>
        <div class="content">
            <p>Hi {name},</p>
            <p>We received a request to reset the password for your account.</p>
            <p><a class="button" href="{url}">Choose a new password</a></p>
            <p>This link expires in {ttl} minutes and can only be used once.</p>
            <p>If you did not request a reset you can ignore this email; your password will not change.</p>
        </div>
        <div class="footer">
            <p>This is an automated message. Please do not reply directly to this email.</p>
        </div>
    </div>
</body>
</html>"#,
        name = escape_html(name),
        url = escape_html(reset_url),
        ttl = ttl_minutes,
    );

    let text_body = format!(
        "Hi {name},\n\nWe received a request to reset the password for your account.\n\
         Open this link to choose a new password:\n{url}\n\n\
         The link expires in {ttl} minutes and can only be used once.\n\
         If you did not request a reset you can ignore this email.\n",
        name = name,
        url = reset_url,
        ttl = ttl_minutes,
    );

    EmailMessage {
        to: to.to_string(),
        subject: "Reset your password".to_string(),
        html_body,
        text_body,
    }
}
