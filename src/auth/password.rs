//! Password strength policy and bcrypt credential hashing

use thiserror::Error;

/// bcrypt work factor for stored passwords
pub const BCRYPT_COST: u32 = 12;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// bcrypt ignores everything past this many bytes
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Characters accepted as "special" by the strength policy
pub const SPECIAL_CHARACTERS: &str = r#"!@#$%^&*(),.?":{}|<>_-+=[]\/~`';"#;

/// First rule a candidate password breaks, in the order they are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PasswordViolation {
    #[error("Password must be at least 8 characters long")]
    TooShort,
    #[error("Password must not exceed 72 bytes")]
    TooLong,
    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,
    #[error("Password must contain at least one lowercase letter")]
    MissingLowercase,
    #[error("Password must contain at least one number")]
    MissingDigit,
    #[error("Password must contain at least one special character")]
    MissingSpecial,
}

/// Checks length, then uppercase, lowercase, digit and special character
pub fn validate_password(password: &str) -> Result<(), PasswordViolation> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordViolation::TooShort);
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(PasswordViolation::TooLong);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(PasswordViolation::MissingUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(PasswordViolation::MissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordViolation::MissingDigit);
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        return Err(PasswordViolation::MissingSpecial);
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum HashError {
    #[error("password hashing failed: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// One-way salted password hashing
///
/// bcrypt is CPU bound, so both operations run on the blocking thread pool.
#[derive(Debug, Clone, Copy)]
pub struct CredentialHasher {
    cost: u32,
}

impl CredentialHasher {
    pub fn new() -> Self {
        Self { cost: BCRYPT_COST }
    }

    /// Cheap hasher so tests do not spend seconds in bcrypt
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self { cost: 4 }
    }

    pub async fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        let plaintext = plaintext.to_owned();
        let cost = self.cost;
        let digest = tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, cost)).await??;
        Ok(digest)
    }

    /// Constant-time comparison is done inside bcrypt
    ///
    /// Inputs longer than bcrypt reads never match, so a stored password
    /// cannot be satisfied by appending bytes to it.
    pub async fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, HashError> {
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return Ok(false);
        }
        let plaintext = plaintext.to_owned();
        let digest = digest.to_owned();
        let matches =
            tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &digest)).await??;
        Ok(matches)
    }
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self::new()
    }
}
