//! Bazaar Core - Shared domain library.
//!
//! This crate provides the types and business rules used across all Bazaar
//! components:
//! - `storefront` - Public shopping API (catalog, cart, checkout)
//! - `admin` - Back-office API for staff
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! Everything outside [`db`] is pure: no I/O, no HTTP, no clock reads
//! (callers pass `now` in). Pricing, coupon and order-status rules can
//! therefore be tested without a database.
//!
//! The [`db`] module holds the `PostgreSQL` repositories shared by both
//! binaries and is only compiled with the `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, money helpers, statuses and roles
//! - [`coupon`] - Coupon evaluation
//! - [`pricing`] - Cart aggregation and order totals
//! - [`order`] - Order status state machine and payment events
//! - [`token`] - HS256 access/refresh tokens
//! - [`payment`] - Payment webhook payloads and signatures
//! - [`api`] - JSON response envelope and pagination

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod coupon;
pub mod order;
pub mod payment;
pub mod pricing;
pub mod token;
pub mod types;

#[cfg(feature = "postgres")]
pub mod db;

pub use types::*;
