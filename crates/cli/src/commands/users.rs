//! Staff account commands.
//!
//! # Usage
//!
//! ```bash
//! # Bootstrap the first admin
//! BW_NEW_USER_PASSWORD='s3cret!pass' bw-cli user create -e admin@example.com -f Ada -l Admin
//!
//! # A delivery account
//! bw-cli user create -e rider@example.com -f Sam -l Rider -r deliveryStaff -p 'r1der#pass'
//! ```
//!
//! # Environment Variables
//!
//! - `BW_DATABASE_URL` - `PostgreSQL` connection string
//! - `BW_NEW_USER_PASSWORD` - Password, when `-p` is not given

use thiserror::Error;

use best_wishes_core::{Email, Role, UserId};
use best_wishes_server::db::RepositoryError;
use best_wishes_server::db::users::UserRepository;
use best_wishes_server::models::user::NewUser;
use best_wishes_server::services::auth::{AuthError, hash_password, validate_staff_password};

use super::{CommandError, connect};

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    /// Not a staff role.
    #[error("Invalid role: {0}. Valid roles: admin, inventoryManager, deliveryStaff")]
    InvalidRole(String),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// User already exists.
    #[error("User already exists with email: {0}")]
    UserExists(String),

    /// Weak password or hashing failure.
    #[error("{0}")]
    Password(#[from] AuthError),

    /// Repository error.
    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Parse a staff role, rejecting the customer role.
fn staff_role(role: &str) -> Result<Role, UserError> {
    role.parse::<Role>()
        .ok()
        .filter(|r| r.is_staff())
        .ok_or_else(|| UserError::InvalidRole(role.to_owned()))
}

/// Create a staff account with a password.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns `UserError` for bad input, an existing email, or database errors.
pub async fn create(
    email: &str,
    first_name: &str,
    last_name: &str,
    role: &str,
    password: &str,
) -> Result<UserId, UserError> {
    let role = staff_role(role)?;
    let email = Email::parse(email).map_err(|_| UserError::InvalidEmail(email.to_owned()))?;
    validate_staff_password(password)?;

    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    if users.email_exists(&email).await? {
        return Err(UserError::UserExists(email.as_str().to_owned()));
    }

    tracing::info!("Creating user: {} ({})", email.as_str(), role);
    let user = users
        .create(&NewUser {
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
            email,
            password_hash: hash_password(password)?,
            phone: None,
            address: None,
            zip_code: None,
            role,
        })
        .await?;

    tracing::info!(
        "User created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email.as_str(),
        user.role
    );
    Ok(user.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staff_role_accepts_both_casings() {
        assert!(matches!(staff_role("deliveryStaff"), Ok(Role::DeliveryStaff)));
        assert!(matches!(staff_role("inventory_manager"), Ok(Role::InventoryManager)));
    }

    #[test]
    fn test_staff_role_rejects_customer() {
        assert!(matches!(staff_role("user"), Err(UserError::InvalidRole(_))));
        assert!(matches!(staff_role("owner"), Err(UserError::InvalidRole(_))));
    }
}
