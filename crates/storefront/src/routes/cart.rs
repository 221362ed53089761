//! Server-side cart handlers.
//!
//! The cart belongs to the authenticated user. Every response carries the
//! full priced summary so clients never compute totals themselves.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use bazaar_core::CartItemId;
use bazaar_core::api::ApiResponse;
use bazaar_core::db::CartRepository;
use bazaar_core::db::cart::{AddToCart, CartEntry, UpdateCartQuantity};
use bazaar_core::pricing::{CartLine, OrderTotals, PricingPolicy};
use serde::Serialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::extract::ValidatedJson;
use crate::middleware::RequireUser;
use crate::state::AppState;

/// A priced cart.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub items: Vec<CartEntry>,
    pub item_count: usize,
    /// Total number of units across all lines.
    pub quantity: u64,
    #[serde(flatten)]
    pub totals: OrderTotals,
    /// True when every line is still purchasable in the requested quantity.
    pub ready_for_checkout: bool,
}

impl CartSummary {
    #[must_use]
    pub fn new(items: Vec<CartEntry>, policy: &PricingPolicy) -> Self {
        let lines: Vec<CartLine> = items.iter().map(CartEntry::line).collect();
        let totals = OrderTotals::for_lines(&lines, policy);
        let quantity = lines.iter().map(|l| u64::from(l.quantity)).sum();
        let ready_for_checkout = !items.is_empty()
            && items
                .iter()
                .all(|e| e.is_available && e.available >= e.quantity);

        Self {
            item_count: items.len(),
            items,
            quantity,
            totals,
            ready_for_checkout,
        }
    }
}

async fn summary(state: &AppState, user: &crate::middleware::CurrentUser) -> Result<CartSummary> {
    let items = CartRepository::new(state.pool()).list(user.id).await?;
    Ok(CartSummary::new(items, &state.config().pricing))
}

/// `GET /api/cart`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<ApiResponse<CartSummary>>> {
    Ok(Json(ApiResponse::ok(summary(&state, &user).await?)))
}

/// `POST /api/cart`
///
/// Adding a product already in the cart increases its quantity.
#[instrument(skip(state, user, body), fields(user_id = %user.id, product_id = %body.product_id))]
pub async fn add(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ValidatedJson(body): ValidatedJson<AddToCart>,
) -> Result<(StatusCode, Json<ApiResponse<CartSummary>>)> {
    CartRepository::new(state.pool())
        .add(user.id, body.product_id, body.variant_id, body.quantity)
        .await
        .map_err(|e| match e {
            bazaar_core::db::RepositoryError::NotFound => {
                AppError::NotFound("Product not found".to_string())
            }
            other => other.into(),
        })?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(summary(&state, &user).await?).with_message("Added to cart")),
    ))
}

/// `PATCH /api/cart/{id}`
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<CartItemId>,
    ValidatedJson(body): ValidatedJson<UpdateCartQuantity>,
) -> Result<Json<ApiResponse<CartSummary>>> {
    CartRepository::new(state.pool())
        .update_quantity(user.id, id, body.quantity)
        .await
        .map_err(cart_item_not_found)?;
    Ok(Json(ApiResponse::ok(summary(&state, &user).await?)))
}

/// `DELETE /api/cart/{id}`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<CartItemId>,
) -> Result<Json<ApiResponse<CartSummary>>> {
    CartRepository::new(state.pool())
        .remove(user.id, id)
        .await
        .map_err(cart_item_not_found)?;
    Ok(Json(ApiResponse::ok(summary(&state, &user).await?)))
}

/// `DELETE /api/cart`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn clear(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<ApiResponse<()>>> {
    CartRepository::new(state.pool()).clear(user.id).await?;
    Ok(Json(ApiResponse::message("Cart cleared successfully")))
}

fn cart_item_not_found(err: bazaar_core::db::RepositoryError) -> AppError {
    match err {
        bazaar_core::db::RepositoryError::NotFound => {
            AppError::NotFound("Cart item not found".to_string())
        }
        other => other.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bazaar_core::ProductId;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn entry(id: i32, price: &str, quantity: i32, available: i32) -> CartEntry {
        CartEntry {
            id: CartItemId::new(id),
            product_id: ProductId::new(id),
            variant_id: None,
            quantity,
            product_name: format!("Product {id}"),
            product_slug: format!("product-{id}"),
            variant_name: None,
            sku: None,
            image_url: None,
            unit_price: price.parse().unwrap(),
            available,
            is_available: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_prices_lines() {
        let summary = CartSummary::new(
            vec![entry(1, "20.00", 2, 10), entry(2, "10.00", 2, 10)],
            &PricingPolicy::default(),
        );
        assert_eq!(summary.item_count, 2);
        assert_eq!(summary.quantity, 4);
        assert_eq!(summary.totals.subtotal, Decimal::new(6000, 2));
        assert_eq!(summary.totals.shipping, Decimal::ZERO);
        assert_eq!(summary.totals.tax, Decimal::new(600, 2));
        assert_eq!(summary.totals.total, Decimal::new(6600, 2));
        assert!(summary.ready_for_checkout);
    }

    #[test]
    fn test_small_cart_pays_shipping() {
        let summary = CartSummary::new(vec![entry(1, "25.00", 1, 5)], &PricingPolicy::default());
        assert_eq!(summary.totals.shipping, Decimal::new(999, 2));
        assert_eq!(summary.totals.total, Decimal::new(3749, 2));
    }

    #[test]
    fn test_empty_or_short_cart_is_not_ready() {
        let empty = CartSummary::new(Vec::new(), &PricingPolicy::default());
        assert!(!empty.ready_for_checkout);
        assert_eq!(empty.totals.subtotal, Decimal::ZERO);

        let short = CartSummary::new(vec![entry(1, "5.00", 3, 2)], &PricingPolicy::default());
        assert!(!short.ready_for_checkout);
    }

    #[test]
    fn test_summary_serializes_flat_totals() {
        let summary = CartSummary::new(vec![entry(1, "60.00", 1, 1)], &PricingPolicy::default());
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["itemCount"], 1);
        assert_eq!(json["total"], "66.00");
        assert_eq!(json["readyForCheckout"], true);
    }
}
