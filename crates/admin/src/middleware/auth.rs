//! Staff authentication for the back office.
//!
//! Staff log in through the storefront and present the same access token
//! here, either as the `authToken` cookie or an `Authorization: Bearer`
//! header. Only roles granted [`Permission::AccessBackOffice`] get in;
//! individual handlers then check the narrower permission they need.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use bazaar_core::token::Claims;
use bazaar_core::{Permission, UserId, UserRole};
use chrono::Utc;
use cookie::Cookie;

use crate::error::{AppError, set_sentry_user};
use crate::state::AppState;

/// Cookie carrying the access token, shared with the storefront.
pub const AUTH_COOKIE: &str = "authToken";

/// The authenticated staff member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentStaff {
    pub id: UserId,
    pub email: String,
    pub role: UserRole,
}

impl CurrentStaff {
    /// Fail with 403 unless this staff member's role grants `permission`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` when the permission is missing.
    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        if self.role.has(permission) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = self.id.as_i32(),
                role = self.role.as_str(),
                ?permission,
                "staff permission denied"
            );
            Err(AppError::Forbidden("Insufficient permissions".to_string()))
        }
    }
}

impl From<Claims> for CurrentStaff {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Extractor that requires a staff access token.
///
/// Missing or invalid tokens are rejected with 401, customer tokens
/// with 403.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireStaff(staff): RequireStaff) -> impl IntoResponse {
///     format!("Hello, {}!", staff.email)
/// }
/// ```
pub struct RequireStaff(pub CurrentStaff);

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = access_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Access token required".to_string()))?;

        let claims = state
            .access_tokens()
            .verify(&token, Utc::now())
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected access token");
                AppError::Unauthorized("Invalid or expired token".to_string())
            })?;

        let staff = CurrentStaff::from(claims);
        staff.require(Permission::AccessBackOffice)?;

        tracing::Span::current().record("user_id", staff.id.as_i32());
        set_sentry_user(staff.id.as_i32(), Some(&staff.email));
        Ok(Self(staff))
    }
}

/// Access token from the `authToken` cookie or the bearer header.
fn access_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == AUTH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn staff(role: UserRole) -> CurrentStaff {
        CurrentStaff {
            id: UserId::new(7),
            email: "staff@example.com".to_string(),
            role,
        }
    }

    #[test]
    fn test_support_has_no_back_office_access() {
        let support = staff(UserRole::Support);
        assert!(matches!(
            support.require(Permission::AccessBackOffice),
            Err(AppError::Forbidden(_))
        ));
        assert!(support.require(Permission::ViewAllOrders).is_ok());
    }

    #[test]
    fn test_manager_manages_everything() {
        let manager = staff(UserRole::Manager);
        for permission in [
            Permission::ManageCatalog,
            Permission::ManageCoupons,
            Permission::ManageOrders,
            Permission::ManageCustomers,
        ] {
            assert!(manager.require(permission).is_ok());
        }
    }

    #[test]
    fn test_customer_is_locked_out() {
        assert!(staff(UserRole::Customer)
            .require(Permission::AccessBackOffice)
            .is_err());
    }

    #[test]
    fn test_access_token_sources() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(access_token(&headers).as_deref(), Some("abc"));

        headers.insert(header::COOKIE, HeaderValue::from_static("authToken=xyz"));
        assert_eq!(access_token(&headers).as_deref(), Some("xyz"));

        assert_eq!(access_token(&HeaderMap::new()), None);
    }
}
