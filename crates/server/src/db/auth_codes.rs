//! One-time codes for OTP login checks and password resets.
//!
//! Only the SHA-256 of a code is stored. Issuing a new code for the same
//! email and purpose replaces the previous one.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use best_wishes_core::Email;

use super::RepositoryError;

/// What a code may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "auth_code_purpose", rename_all = "snake_case")]
pub enum CodePurpose {
    Otp,
    PasswordReset,
}

pub struct AuthCodeRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AuthCodeRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a code hash, replacing any live code for the same purpose.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn issue(
        &self,
        email: &Email,
        purpose: CodePurpose,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO auth_codes (email, purpose, code_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email, purpose) DO UPDATE
            SET code_hash = EXCLUDED.code_hash,
                expires_at = EXCLUDED.expires_at,
                created_at = NOW()
            ",
        )
        .bind(email)
        .bind(purpose)
        .bind(code_hash)
        .bind(expires_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Whether an unexpired code with this hash exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_valid(
        &self,
        email: &Email,
        purpose: CodePurpose,
        code_hash: &str,
    ) -> Result<bool, RepositoryError> {
        let valid: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM auth_codes
                WHERE email = $1 AND purpose = $2 AND code_hash = $3 AND expires_at > NOW()
            )
            ",
        )
        .bind(email)
        .bind(purpose)
        .bind(code_hash)
        .fetch_one(self.pool)
        .await?;
        Ok(valid)
    }

    /// Delete a matching unexpired code. Returns whether one was consumed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn consume(
        &self,
        email: &Email,
        purpose: CodePurpose,
        code_hash: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM auth_codes
            WHERE email = $1 AND purpose = $2 AND code_hash = $3 AND expires_at > NOW()
            ",
        )
        .bind(email)
        .bind(purpose)
        .bind(code_hash)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove expired codes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query(r"DELETE FROM auth_codes WHERE expires_at <= NOW()")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
