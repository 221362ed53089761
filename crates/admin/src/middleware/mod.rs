//! HTTP middleware stack for the back office.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request span with method, path, status, latency)
//! 3. Request ID (adopt or generate `x-request-id`)
//! 4. CORS (the configured back-office origin, with credentials)
//! 5. Security headers (`nosniff`, `DENY` framing, `no-store`)
//!
//! Authentication is not a layer; every `/api/admin` handler takes the
//! [`RequireStaff`] extractor and checks its own [`Permission`].
//!
//! [`Permission`]: bazaar_core::Permission

pub mod auth;
pub mod request_id;
pub mod security_headers;

pub use auth::{CurrentStaff, RequireStaff};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
