//! Reconciles OAuth provider identities with local accounts

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::models::{NewUser, Provider, ProviderProfile, User};
use super::store::{CredentialStore, StoreError};
use crate::common::safe_email_log;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("provider profile has no email")]
    MissingEmail,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct OAuthIdentityLinker {
    store: Arc<dyn CredentialStore>,
}

impl OAuthIdentityLinker {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Resolves the local user for a provider login.
    ///
    /// Precedence, identical for every provider:
    /// 1. a user already carrying this provider id is returned untouched;
    /// 2. otherwise a user with the profile's email gets the provider id,
    ///    name and picture written onto it;
    /// 3. otherwise a password-less user is created.
    ///
    /// A profile without email can only match through step 1.
    pub async fn link(
        &self,
        provider: Provider,
        profile: &ProviderProfile,
    ) -> Result<User, LinkError> {
        if let Some(user) = self
            .store
            .find_user_by_provider(provider, &profile.provider_id)
            .await?
        {
            debug!(
                user_id = %user.id,
                provider = %provider,
                "Found existing user by provider id"
            );
            return Ok(user);
        }

        let email = profile
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                warn!(provider = %provider, "Provider profile carries no email");
                LinkError::MissingEmail
            })?;

        if let Some(existing) = self.store.find_user_by_email(email).await? {
            let linked = self
                .store
                .link_provider(
                    &existing.id,
                    provider,
                    &profile.provider_id,
                    &profile.display_name,
                    profile.avatar_url.as_deref(),
                )
                .await?;

            if let Some(user) = linked {
                info!(
                    user_id = %user.id,
                    provider = %provider,
                    "Linked provider identity to existing account"
                );
                return Ok(user);
            }
            warn!(user_id = %existing.id, "User disappeared while linking, creating a new one");
        }

        let user = self
            .store
            .create_user(NewUser {
                name: profile.display_name.clone(),
                email: email.to_string(),
                password_hash: None,
                provider: Some((provider, profile.provider_id.clone())),
                profile_picture: profile.avatar_url.clone(),
            })
            .await?;

        info!(
            user_id = %user.id,
            email = %safe_email_log(&user.email),
            provider = %provider,
            "Created new user account via OAuth"
        );
        Ok(user)
    }
}
