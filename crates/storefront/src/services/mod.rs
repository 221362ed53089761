//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Password registration and login, token issuance

pub mod auth;
