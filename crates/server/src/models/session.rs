//! What a logged-in session carries.

use serde::{Deserialize, Serialize};

use best_wishes_core::{Email, Role, UserId};

/// Identity written to the session at login.
///
/// `role` is a snapshot. Role guards reload the account on each request, so
/// a demotion or block takes effect without waiting for the session to end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    pub role: Role,
    /// Used in greetings and notification text.
    pub first_name: String,
}

/// Keys used in the `tower_sessions` record.
pub mod keys {
    pub const CURRENT_USER: &str = "current_user";
}
