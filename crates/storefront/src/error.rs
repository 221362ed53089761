//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Errors are rendered as the
//! `{"success": false, "error": ...}` envelope; server errors are captured to
//! Sentry first and their details are never sent to the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bazaar_core::api::ApiResponse;
use bazaar_core::coupon::CouponRejection;
use bazaar_core::db::RepositoryError;
use bazaar_core::db::orders::PlaceOrderError;
use bazaar_core::order::TransitionError;
use thiserror::Error;

use crate::services::auth::AuthError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Coupon does not apply to this cart.
    #[error("Coupon rejected: {0}")]
    Coupon(#[from] CouponRejection),

    /// Checkout could not turn the cart into an order.
    #[error("Order placement failed: {0}")]
    PlaceOrder(#[from] PlaceOrderError),

    /// Order lifecycle rule violated.
    #[error("Invalid transition: {0}")]
    Transition(#[from] TransitionError),

    /// Request body or query failed validation.
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// A validation error with only a message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    fn is_server_error(&self) -> bool {
        match self {
            Self::Database(err) | Self::PlaceOrder(PlaceOrderError::Repository(err)) => {
                !matches!(err, RepositoryError::NotFound | RepositoryError::Conflict(_))
            }
            Self::Auth(err) => err.is_server_error(),
            Self::Internal(_) => true,
            _ => false,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) | Self::PlaceOrder(PlaceOrderError::Repository(err)) => {
                repository_status(err)
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::AccountDisabled => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(err) => repository_status(err),
                AuthError::PasswordHash | AuthError::Token(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Coupon(CouponRejection::InvalidCode)
            | Self::PlaceOrder(PlaceOrderError::AddressNotFound)
            | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Coupon(_)
            | Self::PlaceOrder(_)
            | Self::Transition(_)
            | Self::Validation { .. }
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client.
    fn public_message(&self) -> String {
        if self.is_server_error() {
            return "Internal server error".to_string();
        }
        match self {
            Self::Database(err) | Self::PlaceOrder(PlaceOrderError::Repository(err)) => {
                repository_message(err)
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid email or password".to_string(),
                AuthError::AccountDisabled => "Account is inactive".to_string(),
                AuthError::UserAlreadyExists => "Email already exists".to_string(),
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::Repository(err) => repository_message(err),
                AuthError::PasswordHash | AuthError::Token(_) => {
                    "Internal server error".to_string()
                }
            },
            Self::Coupon(rejection) => rejection.to_string(),
            Self::PlaceOrder(err) => match err {
                PlaceOrderError::EmptyCart => "Cart is empty".to_string(),
                PlaceOrderError::Unavailable(name) => format!("{name} is no longer available"),
                PlaceOrderError::InsufficientStock(name) => format!("Insufficient stock for {name}"),
                PlaceOrderError::Coupon(rejection) => rejection.to_string(),
                PlaceOrderError::AddressNotFound => "Address not found".to_string(),
                PlaceOrderError::TotalMismatch { .. } => {
                    "Cart total changed, please review your order".to_string()
                }
                PlaceOrderError::Repository(err) => repository_message(err),
            },
            Self::Transition(err) => err.to_string(),
            Self::Validation { message, .. }
            | Self::NotFound(message)
            | Self::Unauthorized(message)
            | Self::Forbidden(message)
            | Self::BadRequest(message)
            | Self::Internal(message) => message.clone(),
            Self::RateLimited => "Too many requests".to_string(),
        }
    }
}

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn repository_message(err: &RepositoryError) -> String {
    match err {
        RepositoryError::NotFound => "Resource not found".to_string(),
        RepositoryError::Conflict(msg) => msg.clone(),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            "Internal server error".to_string()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();
        let message = self.public_message();
        let body = match self {
            Self::Validation {
                details: Some(details),
                ..
            } => ApiResponse::error_with_details(message, details),
            _ => ApiResponse::error(message),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context after successful authentication.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_json(err: AppError) -> serde_json::Value {
        let bytes = axum::body::to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::validation("test")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_repository_errors_map_to_http() {
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Conflict("dup".into()))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::DataCorruption("x".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_place_order_errors_map_to_http() {
        assert_eq!(
            get_status(AppError::PlaceOrder(PlaceOrderError::EmptyCart)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::PlaceOrder(PlaceOrderError::AddressNotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::PlaceOrder(PlaceOrderError::Coupon(
                CouponRejection::InvalidCode
            ))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Coupon(CouponRejection::InvalidCode)),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_auth_errors_map_to_http() {
        assert_eq!(
            get_status(AppError::Auth(AuthError::InvalidCredentials)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::UserAlreadyExists)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::PasswordHash)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_coupon_rejection_body() {
        let body = body_json(AppError::Coupon(CouponRejection::MinimumNotMet {
            minimum: Decimal::new(50, 0),
        }))
        .await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Minimum purchase amount of $50 required");
    }

    #[tokio::test]
    async fn test_server_error_body_hides_details() {
        let body = body_json(AppError::Internal("connection refused on 10.0.0.3".into())).await;
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_validation_details_are_included() {
        let body = body_json(AppError::Validation {
            message: "email: Invalid email address".into(),
            details: Some(serde_json::json!({"email": ["Invalid email address"]})),
        })
        .await;
        assert_eq!(body["error"], "email: Invalid email address");
        assert_eq!(body["details"]["email"][0], "Invalid email address");
    }
}
