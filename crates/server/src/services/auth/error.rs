//! Failures of the account and login flows.

use thiserror::Error;

use crate::db::RepositoryError;

/// Why an account operation was refused.
///
/// Route handlers turn these into HTTP responses via `AppError`; the
/// messages here are for logs only.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("malformed email address: {0}")]
    InvalidEmail(#[from] best_wishes_core::EmailError),

    /// Unknown email or wrong password. The two are not told apart.
    #[error("email or password did not match")]
    InvalidCredentials,

    #[error("no account with that id or email")]
    UserNotFound,

    #[error("an account with that email is already registered")]
    UserAlreadyExists,

    /// Carries the message shown to the user.
    #[error("password rejected: {0}")]
    WeakPassword(String),

    /// The current password supplied with a change request was wrong.
    #[error("current password did not match")]
    IncorrectPassword,

    #[error("login code missing, wrong or expired")]
    InvalidOtp,

    #[error("reset code missing, wrong or expired")]
    InvalidResetCode,

    #[error("account is blocked")]
    AccountBlocked,

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("argon2 hashing failed")]
    PasswordHash,
}
