//! HTTP route handlers for the back-office API.
//!
//! # Route Structure
//!
//! ```text
//! # All routes require a staff access token
//! GET    /api/admin/dashboard               - Counts, revenue, low stock, recent orders
//!
//! # Catalog (ManageCatalog for writes)
//! GET    /api/admin/products                - All products incl. inactive (paginated)
//! POST   /api/admin/products                - Create product
//! GET    /api/admin/products/{id}           - Product with all variants
//! PATCH  /api/admin/products/{id}           - Partial update
//! DELETE /api/admin/products/{id}           - Delete product
//! GET    /api/admin/categories              - All categories
//! POST   /api/admin/categories              - Create category
//! PATCH  /api/admin/categories/{id}         - Partial update
//! DELETE /api/admin/categories/{id}         - Delete category
//! GET    /api/admin/banners                 - All banners
//! POST   /api/admin/banners                 - Create banner
//! PATCH  /api/admin/banners/{id}            - Partial update
//! DELETE /api/admin/banners/{id}            - Delete banner
//!
//! # Coupons (ManageCoupons)
//! GET    /api/admin/coupons                 - Coupons (paginated)
//! POST   /api/admin/coupons                 - Create coupon
//! PATCH  /api/admin/coupons/{id}            - Partial update
//! DELETE /api/admin/coupons/{id}            - Delete coupon
//!
//! # Orders (ManageOrders)
//! GET    /api/admin/orders?status=          - All orders (paginated)
//! GET    /api/admin/orders/{id}             - Order with items and allowed next states
//! PATCH  /api/admin/orders/{id}             - Status transition
//!
//! # Customers (ManageCustomers)
//! GET    /api/admin/customers?search=       - Customer accounts (paginated)
//! PATCH  /api/admin/customers/{id}/status   - Activate / deactivate
//! ```

pub mod banners;
pub mod categories;
pub mod coupons;
pub mod customers;
pub mod dashboard;
pub mod orders;
pub mod products;

use axum::{
    Router,
    routing::{get, patch},
};

use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::list).post(products::create))
        .route(
            "/{id}",
            get(products::show)
                .patch(products::update)
                .delete(products::delete),
        )
}

/// Create the category routes router.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::list).post(categories::create))
        .route(
            "/{id}",
            patch(categories::update).delete(categories::delete),
        )
}

/// Create the coupon routes router.
pub fn coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(coupons::list).post(coupons::create))
        .route("/{id}", patch(coupons::update).delete(coupons::delete))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list))
        .route("/{id}", get(orders::show).patch(orders::update_status))
}

/// Create the customer routes router.
pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(customers::list))
        .route("/{id}/status", patch(customers::set_status))
}

/// Create the banner routes router.
pub fn banner_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(banners::list).post(banners::create))
        .route("/{id}", patch(banners::update).delete(banners::delete))
}

/// Create all back-office API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/dashboard", get(dashboard::show))
        .nest("/api/admin/products", product_routes())
        .nest("/api/admin/categories", category_routes())
        .nest("/api/admin/coupons", coupon_routes())
        .nest("/api/admin/orders", order_routes())
        .nest("/api/admin/customers", customer_routes())
        .nest("/api/admin/banners", banner_routes())
}
