//! Authentication error types.

use bazaar_core::EmailError;
use bazaar_core::db::RepositoryError;
use bazaar_core::token::TokenError;
use thiserror::Error;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Account has been deactivated by staff.
    #[error("account is inactive")]
    AccountDisabled,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Token could not be signed.
    #[error("token error: {0}")]
    Token(#[from] TokenError),
}

impl AuthError {
    /// Whether this is a fault on our side rather than the caller's.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        match self {
            Self::PasswordHash | Self::Token(_) => true,
            Self::Repository(err) => {
                !matches!(err, RepositoryError::NotFound | RepositoryError::Conflict(_))
            }
            _ => false,
        }
    }
}
