//! User account types.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use best_wishes_core::{Email, Role, UserId};

use super::CurrentUser;

/// Accounts seen within this window count as active.
pub const ACTIVE_WINDOW_MINUTES: i64 = 5;

/// A user account.
///
/// The password hash is never serialized.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    #[serde(skip)]
    pub password_hash: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub zip_code: Option<String>,
    pub role: Role,
    pub two_factor_enabled: bool,
    pub is_blocked: bool,
    pub profile_image: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Identity to store in the session after login.
    #[must_use]
    pub fn to_current_user(&self) -> CurrentUser {
        CurrentUser {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            first_name: self.first_name.clone(),
        }
    }

    /// `Active` when seen recently and not blocked.
    #[must_use]
    pub fn activity_status(&self, now: DateTime<Utc>) -> &'static str {
        let recent = self
            .last_active_at
            .is_some_and(|seen| now - seen <= Duration::minutes(ACTIVE_WINDOW_MINUTES));
        if recent && !self.is_blocked {
            "Active"
        } else {
            "Inactive"
        }
    }
}

/// Fields needed to create an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub password_hash: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub zip_code: Option<String>,
    pub role: Role,
}

/// Optional profile fields; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub zip_code: Option<String>,
    pub profile_image: Option<String>,
}

/// User row joined with purchase totals, for the staff user list.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserStatsRow {
    #[sqlx(flatten)]
    pub user: User,
    pub total_orders: i64,
    pub total_buying_amount: Decimal,
}

/// User list entry returned to admins.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWithStats {
    #[serde(flatten)]
    pub user: User,
    pub total_orders: i64,
    pub total_buying_amount: Decimal,
    pub status: &'static str,
}

impl UserWithStats {
    #[must_use]
    pub fn from_row(row: UserStatsRow, now: DateTime<Utc>) -> Self {
        let status = row.user.activity_status(now);
        Self {
            user: row.user,
            total_orders: row.total_orders,
            total_buying_amount: row.total_buying_amount,
            status,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod fixtures {
    use super::*;

    pub fn user(role: Role) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(7),
            first_name: "Ana".to_string(),
            last_name: "Perera".to_string(),
            email: Email::parse("ana@example.com").unwrap(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            phone: None,
            address: None,
            zip_code: None,
            role,
            two_factor_enabled: false,
            is_blocked: false,
            profile_image: None,
            last_login: None,
            last_active_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }
}
