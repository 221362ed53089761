//! `PostgreSQL` repositories shared by the storefront and admin binaries.
//!
//! # Tables
//!
//! - `users` - Customer and staff accounts (argon2 password hashes)
//! - `categories`, `products`, `product_variants` - Catalog
//! - `cart_items` - Server-side carts keyed by user
//! - `orders`, `order_items` - Placed orders with price snapshots
//! - `coupons` - Discount codes and their usage counters
//! - `addresses` - Saved shipping/billing addresses
//! - `banners`, `contact_messages` - Storefront content
//!
//! # Migrations
//!
//! Migrations are stored in `crates/core/migrations/` and run via:
//! ```bash
//! cargo run -p bazaar-cli -- migrate
//! ```
//!
//! Queries are runtime-checked (`query_as::<_, Row>`), so the crate builds
//! without a live database.

pub mod addresses;
pub mod banners;
pub mod cart;
pub mod categories;
pub mod contact;
pub mod coupons;
pub mod dashboard;
pub mod orders;
pub mod products;
pub mod users;
pub mod validate;

use thiserror::Error;

pub use addresses::AddressRepository;
pub use banners::BannerRepository;
pub use cart::CartRepository;
pub use categories::CategoryRepository;
pub use contact::ContactRepository;
pub use coupons::CouponRepository;
pub use dashboard::DashboardRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-violation into [`RepositoryError::Conflict`] with `message`,
/// passing every other error through.
pub(crate) fn conflict_on_unique(message: &str) -> impl FnOnce(sqlx::Error) -> RepositoryError + '_ {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict(message.to_owned());
        }
        RepositoryError::Database(e)
    }
}
