//! Authentication extractors.
//!
//! The session only names the user. Each authenticated request reloads the
//! account, so blocking or demoting a user takes effect on their next call.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use best_wishes_core::Role;

use crate::db::users::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::session::keys;
use crate::models::CurrentUser;
use crate::models::user::User;
use crate::state::AppState;

const NOT_AUTHENTICATED: &str = "Not authenticated";

async fn session_user(parts: &Parts) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

async fn load_user(parts: &Parts, state: &AppState) -> Result<User, AppError> {
    let current = session_user(parts)
        .await
        .ok_or_else(|| AppError::Unauthorized(NOT_AUTHENTICATED.to_string()))?;

    let users = UserRepository::new(state.pool());
    let user = users
        .get_by_id(current.id)
        .await?
        .filter(|u| !u.is_blocked)
        .ok_or_else(|| AppError::Unauthorized(NOT_AUTHENTICATED.to_string()))?;

    if let Err(e) = users.touch_active(user.id).await {
        tracing::warn!(error = %e, user_id = %user.id, "Failed to record activity");
    }
    set_sentry_user(user.id, &user.email);
    Ok(user)
}

/// Extractor that requires a logged-in, unblocked user.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireAuth(user): RequireAuth) -> String {
///     format!("Hello, {}!", user.first_name)
/// }
/// ```
pub struct RequireAuth(pub User);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        load_user(parts, state).await.map(Self)
    }
}

/// Extractor that reads the session user without requiring one.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_user(parts).await))
    }
}

/// A set of roles allowed through [`RequireRole`].
pub trait RoleSet: Send + Sync {
    const ROLES: &'static [Role];
}

pub struct AdminOnly;

impl RoleSet for AdminOnly {
    const ROLES: &'static [Role] = &[Role::Admin];
}

pub struct AdminOrInventory;

impl RoleSet for AdminOrInventory {
    const ROLES: &'static [Role] = &[Role::Admin, Role::InventoryManager];
}

/// Delivery staff, plus admins who can do everything they can.
pub struct DeliveryStaff;

impl RoleSet for DeliveryStaff {
    const ROLES: &'static [Role] = &[Role::DeliveryStaff, Role::Admin];
}

/// Any staff role.
pub struct Staff;

impl RoleSet for Staff {
    const ROLES: &'static [Role] = &[Role::Admin, Role::InventoryManager, Role::DeliveryStaff];
}

/// Extractor that requires the user's role to be in `R`.
pub struct RequireRole<R: RoleSet>(pub User, pub PhantomData<R>);

impl<R: RoleSet> RequireRole<R> {
    #[must_use]
    pub fn into_user(self) -> User {
        self.0
    }
}

/// The 403 message for a role outside the allowed set.
#[must_use]
pub fn role_denied_message(role: Role) -> String {
    format!("Role '{}' is not allowed to access this resource", role.as_str())
}

impl<R: RoleSet> FromRequestParts<AppState> for RequireRole<R> {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = load_user(parts, state).await?;
        if !R::ROLES.contains(&user.role) {
            return Err(AppError::Forbidden(role_denied_message(user.role)));
        }
        Ok(Self(user, PhantomData))
    }
}

/// Store the user in the session after login.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(keys::CURRENT_USER, user).await
}

/// Forget the session user (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_sets() {
        assert!(AdminOnly::ROLES.contains(&Role::Admin));
        assert!(!AdminOnly::ROLES.contains(&Role::InventoryManager));
        assert!(AdminOrInventory::ROLES.contains(&Role::InventoryManager));
        assert!(DeliveryStaff::ROLES.contains(&Role::Admin));
        assert!(!DeliveryStaff::ROLES.contains(&Role::User));
        assert!(!Staff::ROLES.contains(&Role::User));
    }

    #[test]
    fn test_denied_message_uses_wire_role() {
        assert_eq!(
            role_denied_message(Role::InventoryManager),
            "Role 'inventoryManager' is not allowed to access this resource"
        );
    }
}
