//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request span with method, path, status, latency)
//! 3. Request ID (adopt or generate `x-request-id`)
//! 4. CORS (the configured storefront origin, with credentials)
//! 5. Rate limiting on auth and mutating routes (governor)
//!
//! Authentication is not a layer; handlers opt in through the
//! [`RequireUser`] and [`OptionalUser`] extractors.

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::{CurrentUser, OptionalUser, RequireUser};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use request_id::request_id_middleware;
