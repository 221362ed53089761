//! Customer order handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use bazaar_core::api::{ApiResponse, PageParams};
use bazaar_core::db::OrderRepository;
use bazaar_core::db::orders::{Order, OrderDetail, PlaceOrder, PlacementContext};
use bazaar_core::{OrderId, OrderStatus, Permission};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::extract::ValidatedJson;
use crate::middleware::{CurrentUser, RequireUser};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Whose orders a listing covers. Staff allowed to see every order get an
/// unrestricted listing.
fn owner_filter(user: &CurrentUser) -> Option<bazaar_core::UserId> {
    (!user.can(Permission::ViewAllOrders)).then_some(user.id)
}

/// Whether `user` may read `order`.
fn can_view(user: &CurrentUser, order: &Order) -> bool {
    order.user_id == Some(user.id) || user.can(Permission::ViewAllOrders)
}

/// `GET /api/orders`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<ApiResponse<Vec<Order>>>> {
    let page = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let (orders, total) = OrderRepository::new(state.pool())
        .list(owner_filter(&user), query.status, page)
        .await?;
    Ok(Json(ApiResponse::paginated(orders, page.with_total(total))))
}

/// `POST /api/orders`
///
/// Places an order from the caller's cart.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn place(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ValidatedJson(body): ValidatedJson<PlaceOrder>,
) -> Result<(StatusCode, Json<ApiResponse<OrderDetail>>)> {
    let config = state.config();
    let detail = OrderRepository::new(state.pool())
        .place_from_cart(
            &body,
            PlacementContext {
                user_id: user.id,
                policy: &config.pricing,
                currency: config.currency,
                expected_total: None,
                now: Utc::now(),
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(detail).with_message("Order placed successfully")),
    ))
}

/// `GET /api/orders/{id}`
///
/// Orders belonging to someone else are reported as missing.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<ApiResponse<OrderDetail>>> {
    let detail = OrderRepository::new(state.pool())
        .get_detail(id)
        .await?
        .filter(|d| can_view(&user, &d.order))
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    Ok(Json(ApiResponse::ok(detail)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bazaar_core::{PaymentStatus, UserId, UserRole};
    use rust_decimal::Decimal;

    fn user(id: i32, role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            email: format!("user{id}@example.com"),
            role,
        }
    }

    fn order(owner: Option<i32>) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(7),
            order_number: "ORD-TEST-00007".into(),
            user_id: owner.map(UserId::new),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_intent_id: None,
            subtotal: Decimal::new(6000, 2),
            discount_amount: Decimal::ZERO,
            tax_amount: Decimal::new(600, 2),
            shipping_amount: Decimal::ZERO,
            total_amount: Decimal::new(6600, 2),
            currency: "USD".into(),
            shipping_address_id: None,
            billing_address_id: None,
            coupon_code: None,
            notes: None,
            tracking_number: None,
            shipped_at: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_customers_only_list_their_own_orders() {
        assert_eq!(
            owner_filter(&user(3, UserRole::Customer)),
            Some(UserId::new(3))
        );
        assert_eq!(owner_filter(&user(3, UserRole::Support)), None);
        assert_eq!(owner_filter(&user(3, UserRole::Admin)), None);
    }

    #[test]
    fn test_order_visibility() {
        assert!(can_view(&user(1, UserRole::Customer), &order(Some(1))));
        assert!(!can_view(&user(2, UserRole::Customer), &order(Some(1))));
        assert!(!can_view(&user(2, UserRole::Customer), &order(None)));
        assert!(can_view(&user(2, UserRole::Manager), &order(Some(1))));
        assert!(can_view(&user(2, UserRole::Support), &order(None)));
    }
}
