//! Account workflows: signup, login, OAuth completion and password changes

use std::sync::Arc;
use tracing::{error, info, warn};

use super::linker::OAuthIdentityLinker;
use super::models::{
    ChangePasswordRequest, Claims, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest,
    LoginResponse, MessageResponse, NewUser, ProfileResponse, Provider, ProviderProfile,
    ResetPasswordRequest, SignupRequest, SignupResponse,
};
use super::password::{validate_password, CredentialHasher};
use super::reset::{ResetError, ResetTokenManager};
use super::store::CredentialStore;
use super::tokens::{TokenIssuer, TokenTtl};
use crate::common::config::AppConfig;
use crate::common::dev_mode::DevModeConfig;
use crate::common::validation::{is_valid_email, present};
use crate::common::{safe_email_log, ApiError};
use crate::services::email::Mailer;

pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account with that email exists, a password reset link has been sent";

const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: CredentialHasher,
    tokens: TokenIssuer,
    reset: ResetTokenManager,
    linker: OAuthIdentityLinker,
    frontend_url: String,
    dev_mode: DevModeConfig,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        mailer: Arc<dyn Mailer>,
        hasher: CredentialHasher,
        tokens: TokenIssuer,
        config: &AppConfig,
    ) -> Self {
        Self {
            reset: ResetTokenManager::new(
                store.clone(),
                mailer,
                hasher,
                config.frontend_url.clone(),
            ),
            linker: OAuthIdentityLinker::new(store.clone()),
            store,
            hasher,
            tokens,
            frontend_url: config.frontend_url.clone(),
            dev_mode: config.dev_mode.clone(),
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub async fn signup(&self, req: SignupRequest) -> Result<SignupResponse, ApiError> {
        let (name, email, password) = match (
            present(&req.name),
            present(&req.email),
            req.password.as_deref().filter(|p| !p.is_empty()),
        ) {
            (Some(name), Some(email), Some(password)) => (name, email, password),
            _ => return Err(ApiError::ValidationError("All fields required".to_string())),
        };

        if !is_valid_email(email) {
            return Err(ApiError::ValidationError("Invalid email format".to_string()));
        }

        validate_password(password).map_err(|v| ApiError::ValidationError(v.to_string()))?;

        if self.store.find_user_by_email(email).await?.is_some() {
            warn!(email = %safe_email_log(email), "Signup attempted with existing email");
            return Err(ApiError::Conflict("Email already exists".to_string()));
        }

        let password_hash = self.hasher.hash(password).await?;

        // A concurrent signup that wins the race surfaces as Conflict here
        let user = self
            .store
            .create_user(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password_hash: Some(password_hash),
                provider: None,
                profile_picture: None,
            })
            .await?;

        info!(user_id = %user.id, email = %safe_email_log(&user.email), "User registered");

        Ok(SignupResponse {
            message: "Registered successfully".to_string(),
            user_id: user.id,
        })
    }

    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, ApiError> {
        let (email, password) = match (
            present(&req.email),
            req.password.as_deref().filter(|p| !p.is_empty()),
        ) {
            (Some(email), Some(password)) => (email, password),
            _ => {
                return Err(ApiError::ValidationError(
                    "Email and password required".to_string(),
                ))
            }
        };

        if !is_valid_email(email) {
            return Err(ApiError::ValidationError("Invalid email format".to_string()));
        }

        let user = match self.store.find_user_by_email(email).await? {
            Some(user) => user,
            None => {
                info!(email = %safe_email_log(email), "Login failed: unknown email");
                return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
            }
        };

        let digest = match user.password_hash.as_deref() {
            Some(digest) => digest,
            None => {
                info!(user_id = %user.id, "Login failed: account has no password");
                return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
            }
        };

        if !self.hasher.verify(password, digest).await? {
            info!(user_id = %user.id, "Login failed: wrong password");
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let ttl = TokenTtl::for_login(req.remember_me.unwrap_or(false));
        let token = self.tokens.issue(&user, ttl)?;

        info!(user_id = %user.id, expires_in = ttl.as_str(), "User logged in");

        Ok(LoginResponse {
            message: "Login successful".to_string(),
            token,
            user: user.public(),
            expires_in: ttl.as_str().to_string(),
        })
    }

    /// Completes an OAuth login and returns the frontend URL to redirect to.
    ///
    /// Never fails; any error yields the frontend's error landing URL.
    pub async fn oauth_callback(&self, provider: Provider, profile: &ProviderProfile) -> String {
        let user = match self.linker.link(provider, profile).await {
            Ok(user) => user,
            Err(e) => {
                error!(error = %e, provider = %provider, "OAuth account linking failed");
                return self.oauth_failure_redirect();
            }
        };

        let token = match self.tokens.issue(&user, TokenTtl::OAuth) {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, user_id = %user.id, "Failed to issue OAuth token");
                return self.oauth_failure_redirect();
            }
        };

        let user_json = match serde_json::to_string(&user.public()) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "Failed to serialize user for redirect");
                return self.oauth_failure_redirect();
            }
        };

        info!(user_id = %user.id, provider = %provider, "OAuth login completed");

        format!(
            "{}/auth/success?token={}&user={}",
            self.frontend_url,
            urlencoding::encode(&token),
            urlencoding::encode(&user_json)
        )
    }

    pub fn oauth_failure_redirect(&self) -> String {
        format!("{}/?error=oauth_failed", self.frontend_url)
    }

    pub async fn forgot_password(
        &self,
        req: ForgotPasswordRequest,
    ) -> Result<ForgotPasswordResponse, ApiError> {
        let email = present(&req.email)
            .ok_or_else(|| ApiError::ValidationError("Email is required".to_string()))?;

        if !is_valid_email(email) {
            return Err(ApiError::ValidationError("Invalid email format".to_string()));
        }

        let reset_url = match self.reset.request(email).await {
            Ok(url) => url,
            // Delivery problems must not reveal that the account exists
            Err(ResetError::Delivery(e)) => {
                warn!(error = %e, "Reset email not delivered");
                None
            }
            Err(e) => return Err(e.into()),
        };

        Ok(ForgotPasswordResponse {
            message: FORGOT_PASSWORD_MESSAGE.to_string(),
            reset_url: reset_url.filter(|_| self.dev_mode.exposes_reset_links()),
        })
    }

    pub async fn reset_password(
        &self,
        req: ResetPasswordRequest,
    ) -> Result<MessageResponse, ApiError> {
        let (token, email, new_password) = match (
            present(&req.token),
            present(&req.email),
            req.new_password.as_deref().filter(|p| !p.is_empty()),
        ) {
            (Some(token), Some(email), Some(new_password)) => (token, email, new_password),
            _ => {
                return Err(ApiError::ValidationError(
                    "Token, email and new password are required".to_string(),
                ))
            }
        };

        validate_password(new_password).map_err(|v| ApiError::ValidationError(v.to_string()))?;

        self.reset.redeem(email, token, new_password).await?;
        Ok(MessageResponse::new("Password has been reset successfully"))
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        req: ChangePasswordRequest,
    ) -> Result<MessageResponse, ApiError> {
        let (current, new_password) = match (
            req.current_password.as_deref().filter(|p| !p.is_empty()),
            req.new_password.as_deref().filter(|p| !p.is_empty()),
        ) {
            (Some(current), Some(new_password)) => (current, new_password),
            _ => {
                return Err(ApiError::ValidationError(
                    "Current and new password are required".to_string(),
                ))
            }
        };

        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        let digest = user.password_hash.as_deref().ok_or_else(|| {
            ApiError::BadRequest("Account has no password set".to_string())
        })?;

        if !self.hasher.verify(current, digest).await? {
            info!(user_id = %user.id, "Password change rejected: wrong current password");
            return Err(ApiError::BadRequest(
                "Current password is incorrect".to_string(),
            ));
        }

        validate_password(new_password).map_err(|v| ApiError::ValidationError(v.to_string()))?;

        let new_digest = self.hasher.hash(new_password).await?;
        if !self.store.update_password(&user.id, &new_digest).await? {
            return Err(ApiError::NotFound("User not found".to_string()));
        }

        info!(user_id = %user.id, "Password changed");
        Ok(MessageResponse::new("Password updated successfully"))
    }

    pub async fn profile(&self, user_id: &str) -> Result<ProfileResponse, ApiError> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        Ok(ProfileResponse {
            message: "Protected profile data".to_string(),
            user: user.public(),
        })
    }

    /// Verifies a bearer token
    pub fn authenticate(&self, bearer: &str) -> Result<Claims, ApiError> {
        self.tokens
            .verify(bearer)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::test_support::{setup_test_db, test_auth_service, RecordingMailer};
    use sqlx::SqlitePool;

    fn signup_req(name: &str, email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }
    }

    fn login_req(email: &str, password: &str, remember_me: bool) -> LoginRequest {
        LoginRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            remember_me: Some(remember_me),
        }
    }

    async fn service(pool: &SqlitePool) -> (AuthService, Arc<RecordingMailer>) {
        let mailer = Arc::new(RecordingMailer::default());
        (test_auth_service(pool, mailer.clone(), false), mailer)
    }

    #[tokio::test]
    async fn test_signup_then_duplicate_conflicts() {
        let pool = setup_test_db().await;
        let (auth, _) = service(&pool).await;

        let created = auth
            .signup(signup_req("Ann", "ann@x.com", "Abcd123!"))
            .await
            .unwrap();
        assert_eq!(created.message, "Registered successfully");
        assert!(created.user_id.starts_with("U_"));

        let dup = auth.signup(signup_req("Ann", "ann@x.com", "Abcd123!")).await;
        assert!(matches!(dup, Err(ApiError::Conflict(msg)) if msg == "Email already exists"));
    }

    #[tokio::test]
    async fn test_signup_validation_order() {
        let pool = setup_test_db().await;
        let (auth, _) = service(&pool).await;

        let missing = auth
            .signup(SignupRequest {
                name: Some("Ann".into()),
                ..Default::default()
            })
            .await;
        assert!(matches!(missing, Err(ApiError::ValidationError(m)) if m == "All fields required"));

        let bad_email = auth.signup(signup_req("Ann", "ann@x", "x")).await;
        assert!(matches!(bad_email, Err(ApiError::ValidationError(m)) if m == "Invalid email format"));

        let weak = auth.signup(signup_req("Ann", "ann@x.com", "abcdefgh")).await;
        assert!(matches!(
            weak,
            Err(ApiError::ValidationError(m)) if m == "Password must contain at least one uppercase letter"
        ));
    }

    #[tokio::test]
    async fn test_signup_never_stores_plaintext() {
        let pool = setup_test_db().await;
        let (auth, _) = service(&pool).await;
        auth.signup(signup_req("Ann", "ann@x.com", "Abcd123!")).await.unwrap();

        let (hash,): (String,) = sqlx::query_as("SELECT password_hash FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_ne!(hash, "Abcd123!");
        assert!(hash.starts_with("$2"));
    }

    #[tokio::test]
    async fn test_login_outcomes() {
        let pool = setup_test_db().await;
        let (auth, _) = service(&pool).await;
        auth.signup(signup_req("Ann", "ann@x.com", "Abcd123!")).await.unwrap();

        let wrong = auth.login(login_req("ann@x.com", "Wrong123!", false)).await;
        assert!(matches!(wrong, Err(ApiError::Unauthorized(m)) if m == "Invalid credentials"));

        let unknown = auth.login(login_req("bob@x.com", "Abcd123!", false)).await;
        assert!(matches!(unknown, Err(ApiError::Unauthorized(m)) if m == "Invalid credentials"));

        let ok = auth.login(login_req("ann@x.com", "Abcd123!", false)).await.unwrap();
        assert_eq!(ok.expires_in, "1d");
        assert_eq!(ok.user.email, "ann@x.com");
        let claims = auth.authenticate(&ok.token).unwrap();
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    }

    #[tokio::test]
    async fn test_login_remember_me_issues_30_day_token() {
        let pool = setup_test_db().await;
        let (auth, _) = service(&pool).await;
        auth.signup(signup_req("Ann", "ann@x.com", "Abcd123!")).await.unwrap();

        let ok = auth.login(login_req("ann@x.com", "Abcd123!", true)).await.unwrap();
        assert_eq!(ok.expires_in, "30d");
        let claims = auth.authenticate(&ok.token).unwrap();
        assert_eq!(claims.exp - claims.iat, 30 * 24 * 60 * 60);
    }

    #[tokio::test]
    async fn test_oauth_only_account_cannot_password_login() {
        let pool = setup_test_db().await;
        let (auth, _) = service(&pool).await;
        let profile = ProviderProfile {
            provider_id: "G1".into(),
            email: Some("ann@x.com".into()),
            display_name: "Ann".into(),
            avatar_url: None,
        };
        auth.oauth_callback(Provider::Google, &profile).await;

        let result = auth.login(login_req("ann@x.com", "Abcd123!", false)).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(m)) if m == "Invalid credentials"));
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email() {
        let pool = setup_test_db().await;
        let (auth, mailer) = service(&pool).await;

        let response = auth
            .forgot_password(ForgotPasswordRequest {
                email: Some("nobody@x.com".into()),
            })
            .await
            .unwrap();
        assert_eq!(response.message, FORGOT_PASSWORD_MESSAGE);
        assert!(response.reset_url.is_none());
        assert!(mailer.sent().is_empty());

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM password_reset_tokens")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_forgot_password_same_answer_for_known_email() {
        let pool = setup_test_db().await;
        let (auth, mailer) = service(&pool).await;
        auth.signup(signup_req("Ann", "ann@x.com", "Abcd123!")).await.unwrap();

        let response = auth
            .forgot_password(ForgotPasswordRequest {
                email: Some("ann@x.com".into()),
            })
            .await
            .unwrap();
        assert_eq!(response.message, FORGOT_PASSWORD_MESSAGE);
        assert!(response.reset_url.is_none());
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_forgot_password_dev_mode_echoes_url() {
        let pool = setup_test_db().await;
        let mailer = Arc::new(RecordingMailer::default());
        let auth = test_auth_service(&pool, mailer, true);
        auth.signup(signup_req("Ann", "ann@x.com", "Abcd123!")).await.unwrap();

        let response = auth
            .forgot_password(ForgotPasswordRequest {
                email: Some("ann@x.com".into()),
            })
            .await
            .unwrap();
        let url = response.reset_url.unwrap();
        assert!(url.starts_with("http://frontend.test/reset-password?token="));
        assert!(url.ends_with("&email=ann%40x.com"));
    }

    #[tokio::test]
    async fn test_reset_password_flow() {
        let pool = setup_test_db().await;
        let (auth, mailer) = service(&pool).await;
        auth.signup(signup_req("Ann", "ann@x.com", "Abcd123!")).await.unwrap();
        auth.forgot_password(ForgotPasswordRequest {
            email: Some("ann@x.com".into()),
        })
        .await
        .unwrap();
        let token = mailer.last_reset_token().unwrap();

        let weak = auth
            .reset_password(ResetPasswordRequest {
                token: Some(token.clone()),
                email: Some("ann@x.com".into()),
                new_password: Some("weak".into()),
            })
            .await;
        assert!(matches!(weak, Err(ApiError::ValidationError(_))));

        let request = || ResetPasswordRequest {
            token: Some(token.clone()),
            email: Some("ann@x.com".into()),
            new_password: Some("Newpass1!".into()),
        };
        auth.reset_password(request()).await.unwrap();

        let reused = auth.reset_password(request()).await;
        assert!(matches!(reused, Err(ApiError::InvalidOrExpiredToken(_))));

        auth.login(login_req("ann@x.com", "Newpass1!", false)).await.unwrap();
    }

    #[tokio::test]
    async fn test_change_password_rules() {
        let pool = setup_test_db().await;
        let (auth, _) = service(&pool).await;
        let user_id = auth
            .signup(signup_req("Ann", "ann@x.com", "Abcd123!"))
            .await
            .unwrap()
            .user_id;

        let req = |current: &str, new: &str| ChangePasswordRequest {
            current_password: Some(current.to_string()),
            new_password: Some(new.to_string()),
        };

        let wrong = auth.change_password(&user_id, req("Nope123!", "Newpass1!")).await;
        assert!(matches!(wrong, Err(ApiError::BadRequest(m)) if m == "Current password is incorrect"));

        let weak = auth.change_password(&user_id, req("Abcd123!", "short")).await;
        assert!(matches!(weak, Err(ApiError::ValidationError(_))));

        let missing = auth.change_password("U_GONE", req("Abcd123!", "Newpass1!")).await;
        assert!(matches!(missing, Err(ApiError::NotFound(_))));

        auth.change_password(&user_id, req("Abcd123!", "Newpass1!"))
            .await
            .unwrap();
        auth.login(login_req("ann@x.com", "Newpass1!", false)).await.unwrap();
    }

    #[tokio::test]
    async fn test_change_password_for_oauth_only_account() {
        let pool = setup_test_db().await;
        let (auth, _) = service(&pool).await;
        let profile = ProviderProfile {
            provider_id: "F1".into(),
            email: Some("fb@x.com".into()),
            display_name: "Fb".into(),
            avatar_url: None,
        };
        auth.oauth_callback(Provider::Facebook, &profile).await;
        let (user_id,): (String,) = sqlx::query_as("SELECT id FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();

        let result = auth
            .change_password(
                &user_id,
                ChangePasswordRequest {
                    current_password: Some("Abcd123!".into()),
                    new_password: Some("Newpass1!".into()),
                },
            )
            .await;
        assert!(matches!(result, Err(ApiError::BadRequest(m)) if m == "Account has no password set"));
    }

    #[tokio::test]
    async fn test_oauth_callback_redirects() {
        let pool = setup_test_db().await;
        let (auth, _) = service(&pool).await;

        let profile = ProviderProfile {
            provider_id: "G1".into(),
            email: Some("ann@x.com".into()),
            display_name: "Ann".into(),
            avatar_url: None,
        };
        let url = auth.oauth_callback(Provider::Google, &profile).await;
        assert!(url.starts_with("http://frontend.test/auth/success?token="));
        assert!(url.contains("&user=%7B%22id%22"));

        let token = url
            .split("token=")
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .unwrap();
        let claims = auth.authenticate(token).unwrap();
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);

        let no_email = ProviderProfile {
            provider_id: "G2".into(),
            email: None,
            display_name: "Nobody".into(),
            avatar_url: None,
        };
        assert_eq!(
            auth.oauth_callback(Provider::Google, &no_email).await,
            "http://frontend.test/?error=oauth_failed"
        );
    }

    #[tokio::test]
    async fn test_profile() {
        let pool = setup_test_db().await;
        let (auth, _) = service(&pool).await;
        let user_id = auth
            .signup(signup_req("Ann", "ann@x.com", "Abcd123!"))
            .await
            .unwrap()
            .user_id;

        let profile = auth.profile(&user_id).await.unwrap();
        assert_eq!(profile.user.name, "Ann");
        assert!(matches!(auth.profile("U_GONE").await, Err(ApiError::NotFound(_))));
        assert!(matches!(auth.authenticate("garbage"), Err(ApiError::Unauthorized(_))));
    }
}
