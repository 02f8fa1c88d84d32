//! Authentication service.
//!
//! Password accounts with Argon2id hashes, plus emailed one-time codes for
//! OTP checks and password resets. Codes are generated here and only their
//! SHA-256 is stored.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use best_wishes_core::{Email, Role, UserId};

use crate::db::RepositoryError;
use crate::db::auth_codes::{AuthCodeRepository, CodePurpose};
use crate::db::users::UserRepository;
use crate::models::user::{NewUser, User};

/// Minimum password length for customer accounts.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Minimum password length for staff accounts created by an admin.
pub const MIN_STAFF_PASSWORD_LENGTH: usize = 8;

/// How long an emailed code stays valid.
pub const CODE_TTL_MINUTES: i64 = 10;

const STAFF_PASSWORD_SYMBOLS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Customer registration input.
#[derive(Debug, Clone)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub zip_code: Option<String>,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    codes: AuthCodeRepository<'a>,
}

impl<'a> AuthService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
            codes: AuthCodeRepository::new(pool),
        }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a customer account. The role is always `user`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password is too short.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, input: Registration) -> Result<User, AuthError> {
        let email = Email::parse(&input.email)?;
        validate_password(&input.password)?;
        let password_hash = hash_password(&input.password)?;

        let user = self
            .users
            .create(&NewUser {
                first_name: input.first_name,
                last_name: input.last_name,
                email,
                password_hash,
                phone: input.phone,
                address: input.address,
                zip_code: input.zip_code,
                role: Role::User,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        self.users.touch_login(user.id).await?;
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email or password is wrong.
    /// Returns `AuthError::AccountBlocked` if an admin blocked the account.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;
        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &user.password_hash)?;

        if user.is_blocked {
            return Err(AuthError::AccountBlocked);
        }

        self.users.touch_login(user.id).await?;
        Ok(user)
    }

    /// Replace a password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::IncorrectPassword` if `old_password` does not match.
    pub async fn change_password(
        &self,
        user_id: UserId,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self.get_user(user_id).await?;
        verify_password(old_password, &user.password_hash)
            .map_err(|_| AuthError::IncorrectPassword)?;
        validate_password(new_password)?;
        let hash = hash_password(new_password)?;
        self.users.update_password(user_id, &hash).await?;
        Ok(())
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    // =========================================================================
    // One-time codes
    // =========================================================================

    /// Issue a fresh 6-digit code and return it for emailing.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the code cannot be stored.
    pub async fn issue_code(&self, email: &Email, purpose: CodePurpose) -> Result<String, AuthError> {
        let code = generate_code();
        let expires_at = Utc::now() + Duration::minutes(CODE_TTL_MINUTES);
        self.codes
            .issue(email, purpose, &hash_code(&code), expires_at)
            .await?;
        Ok(code)
    }

    /// Check and consume an OTP.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidOtp` if the code is wrong or expired.
    pub async fn verify_otp(&self, email: &Email, code: &str) -> Result<(), AuthError> {
        if self
            .codes
            .consume(email, CodePurpose::Otp, &hash_code(code.trim()))
            .await?
        {
            Ok(())
        } else {
            Err(AuthError::InvalidOtp)
        }
    }

    /// Check a reset code without consuming it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResetCode` if the code is wrong or expired.
    pub async fn verify_reset_code(&self, email: &Email, code: &str) -> Result<(), AuthError> {
        if self
            .codes
            .is_valid(email, CodePurpose::PasswordReset, &hash_code(code.trim()))
            .await?
        {
            Ok(())
        } else {
            Err(AuthError::InvalidResetCode)
        }
    }

    /// Consume a reset code and set a new password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` before touching the code if the new
    /// password is too short, and `AuthError::InvalidResetCode` if the code
    /// is wrong or expired.
    pub async fn reset_password(
        &self,
        email: &Email,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_password(new_password)?;
        if !self
            .codes
            .consume(email, CodePurpose::PasswordReset, &hash_code(code.trim()))
            .await?
        {
            return Err(AuthError::InvalidResetCode);
        }
        let hash = hash_password(new_password)?;
        self.users
            .update_password_by_email(email, &hash)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })
    }
}

/// Check customer password requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` with a user-facing message.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }
    Ok(())
}

/// Staff passwords need a length of 8 plus a digit and a symbol.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` with a user-facing message.
pub fn validate_staff_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_STAFF_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_STAFF_PASSWORD_LENGTH} characters long"
        )));
    }
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| STAFF_PASSWORD_SYMBOLS.contains(c));
    if !has_digit || !has_symbol {
        return Err(AuthError::WeakPassword(
            "Password must contain at least one number and one symbol".to_string(),
        ));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// A zero-padded 6-digit code.
fn generate_code() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000))
}

/// Hex SHA-256 of a code, as stored.
fn hash_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_password_length() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn test_staff_password_rules() {
        assert!(matches!(
            validate_staff_password("abc1!"),
            Err(AuthError::WeakPassword(msg)) if msg.contains("at least 8")
        ));
        assert!(matches!(
            validate_staff_password("abcdefgh1"),
            Err(AuthError::WeakPassword(msg)) if msg.contains("number and one symbol")
        ));
        assert!(validate_staff_password("abcdefg!").is_err());
        assert!(validate_staff_password("s3cure!pass").is_ok());
    }

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let hash = hash_password("hunter22").unwrap_or_else(|e| panic!("{e}"));
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22", &hash).is_ok());
        assert!(matches!(
            verify_password("hunter23", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_generated_codes_are_six_digits() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_code_hash_is_stable_hex() {
        let a = hash_code("042137");
        assert_eq!(a, hash_code("042137"));
        assert_ne!(a, hash_code("042138"));
        assert_eq!(a.len(), 64);
    }
}
