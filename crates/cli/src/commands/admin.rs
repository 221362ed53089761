//! Staff account management.
//!
//! Staff log in through the storefront like any other user; what makes
//! them staff is the role stored on their account. This command creates
//! that account, or promotes an existing customer and resets their
//! password.

use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use bazaar_core::db::users::NewUser;
use bazaar_core::db::{RepositoryError, UserRepository};
use bazaar_core::{Email, UserId, UserRole};
use thiserror::Error;

/// Shortest password accepted for staff accounts.
const MIN_PASSWORD_LENGTH: usize = 12;

const PASSWORD_ENV: &str = "BAZAAR_ADMIN_PASSWORD";

/// Errors that can occur during staff account operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Invalid role: {0}. Valid roles: admin, manager, support")]
    InvalidRole(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("No password given; pass --password or set {PASSWORD_ENV}")]
    MissingPassword,

    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters")]
    WeakPassword,

    #[error("Failed to hash password")]
    PasswordHash,

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Parse a role name, refusing roles without back-office access.
fn staff_role(role: &str) -> Result<UserRole, AdminError> {
    role.parse::<UserRole>()
        .ok()
        .filter(|r| *r != UserRole::Customer)
        .ok_or_else(|| AdminError::InvalidRole(role.to_owned()))
}

fn check_password(password: Option<String>) -> Result<String, AdminError> {
    let password = password
        .or_else(|| std::env::var(PASSWORD_ENV).ok())
        .filter(|p| !p.is_empty())
        .ok_or(AdminError::MissingPassword)?;
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AdminError::WeakPassword);
    }
    Ok(password)
}

fn hash_password(password: &str) -> Result<String, AdminError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AdminError::PasswordHash)
}

/// Create a staff account, or promote the existing account with this email.
///
/// # Errors
///
/// Returns an error for an invalid role, email or password, or if the
/// database is unreachable.
pub async fn create_user(
    email: &str,
    name: Option<&str>,
    role: &str,
    password: Option<String>,
) -> Result<UserId, Box<dyn std::error::Error>> {
    let role = staff_role(role)?;
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    let password_hash = hash_password(&check_password(password)?)?;

    let pool = super::connect().await?;
    let users = UserRepository::new(&pool);

    let user = if let Some(existing) = users.get_by_email(&email).await? {
        tracing::warn!(
            user_id = %existing.id,
            from = %existing.role,
            to = %role,
            "Account exists; updating role and password"
        );
        users
            .set_password_and_role(existing.id, &password_hash, role)
            .await?
    } else {
        users
            .create(&NewUser {
                email: &email,
                full_name: name,
                phone: None,
                password_hash: &password_hash,
                role,
            })
            .await?
    };

    tracing::info!(
        "Staff account ready! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );
    Ok(user.id)
}
