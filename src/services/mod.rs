// src/services/mod.rs
//
// Outbound integrations: transactional email and OAuth providers

pub mod email;
pub mod oauth;

// Re-export commonly used types for convenience
pub use email::{LogMailer, Mailer, SesMailer};
pub use oauth::OAuthClients;
