//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! POST   /api/auth/register               - Create a customer account
//! POST   /api/auth/login                  - Log in, set auth cookies
//! POST   /api/auth/refresh                - Rotate tokens from the refresh cookie
//! POST   /api/auth/logout                 - Clear auth cookies
//! GET    /api/auth/me                     - Current user
//!
//! # Catalog
//! GET    /api/products                    - Active products (filters, paginated)
//! GET    /api/products/search?q=          - Product search
//! GET    /api/products/{id}               - Product with variants
//! GET    /api/products/slug/{slug}        - Product by slug
//! GET    /api/categories                  - Active categories
//! GET    /api/banners                     - Live banners
//!
//! # Cart (requires auth)
//! GET    /api/cart                        - Priced cart
//! POST   /api/cart                        - Add a line
//! DELETE /api/cart                        - Empty the cart
//! PATCH  /api/cart/{id}                   - Change a line's quantity
//! DELETE /api/cart/{id}                   - Remove a line
//!
//! # Orders (requires auth)
//! GET    /api/orders                      - Own orders (staff: all)
//! POST   /api/orders                      - Place an order from the cart
//! GET    /api/orders/{id}                 - Order with items
//!
//! # Payments
//! POST   /api/payments/validate-coupon    - Quote a coupon against a total
//! POST   /api/payments/checkout           - Place order and open a payment intent
//! POST   /api/payments/webhook            - Payment provider callback
//!
//! # Misc
//! POST   /api/contact                     - Contact form
//! GET    /api/account/addresses           - Saved addresses (requires auth)
//! POST   /api/account/addresses           - Save an address (requires auth)
//! ```

pub mod account;
pub mod auth;
pub mod banners;
pub mod cart;
pub mod categories;
pub mod contact;
pub mod orders;
pub mod payments;
pub mod products;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
///
/// Credential endpoints share the strict auth limiter.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .merge(limited)
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::list))
        .route("/search", get(products::search))
        .route("/slug/{slug}", get(products::show_by_slug))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).post(cart::add).delete(cart::clear))
        .route("/{id}", patch(cart::update).delete(cart::remove))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list).post(orders::place))
        .route("/{id}", get(orders::show))
}

/// Create the payment routes router.
///
/// The webhook is not rate limited; the provider may burst redeliveries.
pub fn payment_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/validate-coupon", post(payments::validate_coupon))
        .route("/checkout", post(payments::checkout))
        .layer(api_rate_limiter());

    Router::new()
        .route("/webhook", post(payments::webhook))
        .merge(limited)
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new().route(
        "/addresses",
        get(account::addresses).post(account::create_address),
    )
}

/// Create all API routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/auth", auth_routes())
        .nest("/api/products", product_routes())
        .route("/api/categories", get(categories::list))
        .route("/api/banners", get(banners::list))
        .nest("/api/cart", cart_routes())
        .nest("/api/orders", order_routes())
        .nest("/api/payments", payment_routes())
        .route(
            "/api/contact",
            post(contact::submit).layer(api_rate_limiter()),
        )
        .nest("/api/account", account_routes())
}
