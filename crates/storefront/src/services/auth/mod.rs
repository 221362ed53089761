//! Authentication service.
//!
//! Password registration and login against the `users` table, plus the
//! access/refresh token pair handed out on success.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use bazaar_core::db::RepositoryError;
use bazaar_core::db::users::{NewUser, User, UserRepository};
use bazaar_core::token::TokenSigner;
use bazaar_core::{Email, UserRole};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Signed tokens returned after login or refresh.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    #[serde(skip)]
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Fields of a registration request after validation.
#[derive(Debug, Clone, Copy)]
pub struct Registration<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub full_name: &'a str,
    pub phone: Option<&'a str>,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new customer account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, registration: Registration<'_>) -> Result<User, AuthError> {
        let email = Email::parse(registration.email)?;
        validate_password(registration.password)?;
        let password_hash = hash_password(registration.password)?;

        let full_name = registration.full_name.trim();
        let user = self
            .users
            .create(&NewUser {
                email: &email,
                full_name: Some(full_name),
                phone: registration.phone.map(str::trim).filter(|p| !p.is_empty()),
                password_hash: &password_hash,
                role: UserRole::Customer,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, email = %email.masked(), "user registered");
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong
    /// and `AuthError::AccountDisabled` if the account has been deactivated.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let credentials = self
            .users
            .get_credentials(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &credentials.password_hash)?;

        if !credentials.user.status.is_active() {
            return Err(AuthError::AccountDisabled);
        }

        Ok(credentials.user)
    }

    /// Reload the account behind a refresh token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the user no longer exists
    /// and `AuthError::AccountDisabled` if it has been deactivated.
    pub async fn active_user(&self, user_id: bazaar_core::UserId) -> Result<User, AuthError> {
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        if !user.status.is_active() {
            return Err(AuthError::AccountDisabled);
        }
        Ok(user)
    }
}

/// Sign an access and a refresh token for `user`.
///
/// # Errors
///
/// Returns `AuthError::Token` if signing fails.
pub fn issue_tokens(
    access: &TokenSigner,
    refresh: &TokenSigner,
    user: &User,
    now: DateTime<Utc>,
) -> Result<TokenPair, AuthError> {
    Ok(TokenPair {
        access_token: access.issue(user.id, user.email.as_str(), user.role, now)?,
        refresh_token: refresh.issue(user.id, user.email.as_str(), user.role, now)?,
        expires_in: access.ttl_secs(),
    })
}

/// Validate password strength.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
