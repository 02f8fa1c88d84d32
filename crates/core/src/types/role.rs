//! User roles.

use serde::{Deserialize, Serialize};

/// Account role. Determines which route groups a user may reach.
///
/// Serialized in camelCase (`inventoryManager`) for the JSON API and stored
/// as a snake-case Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    /// Shopper. The only role self-registration can produce.
    #[default]
    User,
    /// Full access, including staff management.
    Admin,
    /// Catalog, stock and order-summary maintenance.
    InventoryManager,
    /// Delivery workflows.
    DeliveryStaff,
}

impl Role {
    /// Roles an admin may assign when creating a staff account.
    #[must_use]
    pub const fn staff_roles() -> &'static [Self] {
        &[Self::Admin, Self::InventoryManager, Self::DeliveryStaff]
    }

    /// Whether this is a staff role.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        !matches!(self, Self::User)
    }

    /// The camelCase label used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::InventoryManager => "inventoryManager",
            Self::DeliveryStaff => "deliveryStaff",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "inventoryManager" | "inventory_manager" => Ok(Self::InventoryManager),
            "deliveryStaff" | "delivery_staff" => Ok(Self::DeliveryStaff),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_accepts_both_casings() {
        assert_eq!("inventoryManager".parse::<Role>().unwrap(), Role::InventoryManager);
        assert_eq!("delivery_staff".parse::<Role>().unwrap(), Role::DeliveryStaff);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_is_camel_case() {
        let json = serde_json::to_string(&Role::DeliveryStaff).unwrap();
        assert_eq!(json, "\"deliveryStaff\"");
        let role: Role = serde_json::from_str("\"inventoryManager\"").unwrap();
        assert_eq!(role, Role::InventoryManager);
    }

    #[test]
    fn test_staff_roles_exclude_user() {
        assert!(!Role::staff_roles().contains(&Role::User));
        assert!(Role::staff_roles().iter().all(|r| r.is_staff()));
        assert!(!Role::User.is_staff());
    }

    #[test]
    fn test_display_matches_wire_format() {
        for role in [Role::User, Role::Admin, Role::InventoryManager, Role::DeliveryStaff] {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json.trim_matches('"'), role.to_string());
        }
    }
}
