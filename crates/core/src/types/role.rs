//! User roles and back-office permissions.
//!
//! Roles are stored on the user row and copied into every access token.
//! Route guards never compare role strings; they ask whether a role grants
//! a [`Permission`].

use serde::{Deserialize, Serialize};

/// Role assigned to a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Regular shopper.
    #[default]
    Customer,
    /// Full back-office access.
    Admin,
    /// Back-office access for day-to-day store management.
    Manager,
    /// Customer support. Can read orders but has no back-office access.
    Support,
}

/// A capability checked by back-office route guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Enter the admin API at all.
    AccessBackOffice,
    /// Create, edit and delete products, categories and banners.
    ManageCatalog,
    /// Create, edit and delete coupons.
    ManageCoupons,
    /// Read every order and move them through the lifecycle.
    ManageOrders,
    /// Activate and deactivate customer accounts.
    ManageCustomers,
    /// Read orders placed by other users.
    ViewAllOrders,
}

impl UserRole {
    /// Whether this role grants `permission`.
    #[must_use]
    pub const fn has(self, permission: Permission) -> bool {
        match self {
            Self::Admin | Self::Manager => true,
            Self::Support => matches!(permission, Permission::ViewAllOrders),
            Self::Customer => false,
        }
    }

    /// Staff roles are the ones allowed into the back office.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        self.has(Permission::AccessBackOffice)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Support => "support",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "support" => Ok(Self::Support),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}
