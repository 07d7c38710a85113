//! Bearer token and OAuth state signing (HS256 JWT)

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use uuid::Uuid;

use super::models::{Claims, OAuthStateClaims, Provider, User};

/// Lifetime of the OAuth `state` parameter
pub const OAUTH_STATE_TTL_MINUTES: i64 = 10;

/// Bearer token lifetimes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenTtl {
    /// Regular credential login
    Session,
    /// Credential login with "remember me"
    Remembered,
    /// Token handed out at the end of an OAuth callback
    OAuth,
}

impl TokenTtl {
    pub fn for_login(remember_me: bool) -> Self {
        if remember_me {
            TokenTtl::Remembered
        } else {
            TokenTtl::Session
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            TokenTtl::Session => Duration::days(1),
            TokenTtl::Remembered => Duration::days(30),
            TokenTtl::OAuth => Duration::days(7),
        }
    }

    /// Human readable form returned to clients as `expiresIn`
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenTtl::Session => "1d",
            TokenTtl::Remembered => "30d",
            TokenTtl::OAuth => "7d",
        }
    }
}

/// Signed `state` parameter plus the nonce the browser must echo back
#[derive(Debug, Clone)]
pub struct IssuedOAuthState {
    pub state: String,
    pub nonce: String,
}

#[derive(Debug, Error)]
pub enum TokenError {
    /// Malformed, wrongly signed and expired tokens are indistinguishable
    #[error("invalid token")]
    Invalid,

    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Signs and verifies short-lived tokens with the process-wide secret
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn issue(&self, user: &User, ttl: TokenTtl) -> Result<String, TokenError> {
        self.issue_with_lifetime(user, ttl.duration())
    }

    pub(crate) fn issue_with_lifetime(
        &self,
        user: &User,
        lifetime: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| TokenError::Invalid)
    }

    /// Signed correlation value for the provider redirect
    pub fn issue_oauth_state(&self, provider: Provider) -> Result<IssuedOAuthState, TokenError> {
        let now = Utc::now();
        let claims = OAuthStateClaims {
            provider,
            nonce: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(OAUTH_STATE_TTL_MINUTES)).timestamp(),
        };
        let state = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(IssuedOAuthState {
            state,
            nonce: claims.nonce,
        })
    }

    /// Accepts the state only if it is valid, unexpired, minted for `provider`
    /// and carries the nonce held by the browser that started the flow
    pub fn verify_oauth_state(
        &self,
        state: &str,
        provider: Provider,
        nonce: &str,
    ) -> Result<(), TokenError> {
        let claims = decode::<OAuthStateClaims>(state, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| TokenError::Invalid)?;

        if claims.provider != provider || nonce.is_empty() || claims.nonce != nonce {
            return Err(TokenError::Invalid);
        }
        Ok(())
    }
}
