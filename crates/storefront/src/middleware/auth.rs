//! Authentication extractors and auth cookies.
//!
//! A request is authenticated by an access token taken from the `authToken`
//! cookie or, failing that, an `Authorization: Bearer` header. Tokens are
//! verified statelessly against the access signer in [`AppState`].

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use bazaar_core::token::Claims;
use bazaar_core::{Permission, UserId, UserRole};
use chrono::Utc;
use cookie::{Cookie, SameSite, time::Duration};

use crate::error::{AppError, set_sentry_user};
use crate::state::AppState;

/// Cookie carrying the access token.
pub const AUTH_COOKIE: &str = "authToken";

/// Cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refreshToken";

/// The authenticated caller, as described by their access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: String,
    pub role: UserRole,
}

impl CurrentUser {
    #[must_use]
    pub const fn can(&self, permission: Permission) -> bool {
        self.role.has(permission)
    }
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Extractor that requires a valid access token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireUser(user): RequireUser) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireUser(pub CurrentUser);

impl FromRequestParts<AppState> for RequireUser {
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

        let user = CurrentUser::from(claims);
        tracing::Span::current().record("user_id", user.id.as_i32());
        set_sentry_user(&user.id, None);
        Ok(Self(user))
    }
}

/// Extractor that optionally gets the current user.
///
/// Missing or invalid tokens yield `None` instead of rejecting the request.
pub struct OptionalUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(
            RequireUser::from_request_parts(parts, state)
                .await
                .ok()
                .map(|RequireUser(user)| user),
        ))
    }
}

/// Access token from the `authToken` cookie or the bearer header.
#[must_use]
pub fn access_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, AUTH_COOKIE).or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
    })
}

/// Value of the named cookie across all `Cookie` headers.
#[must_use]
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// `Set-Cookie` value for an HTTP-only token cookie.
#[must_use]
pub fn token_cookie(name: &'static str, value: String, max_age_secs: i64, secure: bool) -> String {
    let same_site = if name == REFRESH_COOKIE {
        SameSite::Strict
    } else {
        SameSite::Lax
    };
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(same_site)
        .path("/")
        .max_age(Duration::seconds(max_age_secs))
        .build()
        .to_string()
}

/// `Set-Cookie` value that deletes a token cookie.
#[must_use]
pub fn expired_cookie(name: &'static str) -> String {
    Cookie::build((name, ""))
        .http_only(true)
        .path("/")
        .max_age(Duration::ZERO)
        .build()
        .to_string()
}
