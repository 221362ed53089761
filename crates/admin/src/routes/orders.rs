//! Order management route handlers.
//!
//! Every status change goes through the order state machine in
//! `bazaar_core::order`; the update is then applied with an optimistic
//! check on the status it was planned from, so two staff members acting
//! on the same order cannot both succeed.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use bazaar_core::api::{ApiResponse, PageParams};
use bazaar_core::db::OrderRepository;
use bazaar_core::db::orders::{Order, OrderDetail};
use bazaar_core::order::plan_status_change;
use bazaar_core::{OrderId, OrderStatus, Permission};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::extract::ValidatedJson;
use crate::middleware::RequireStaff;
use crate::state::AppState;

const NOT_FOUND: &str = "Order not found";

/// `?status=&page=&limit=`
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// An order with its items and the statuses it may move to next.
#[derive(Debug, Serialize)]
pub struct AdminOrderDetail {
    #[serde(flatten)]
    pub detail: OrderDetail,
    pub allowed_next: &'static [OrderStatus],
}

impl From<OrderDetail> for AdminOrderDetail {
    fn from(detail: OrderDetail) -> Self {
        let allowed_next = detail.order.status.allowed_next();
        Self {
            detail,
            allowed_next,
        }
    }
}

/// Body of `PATCH /api/admin/orders/{id}`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: OrderStatus,
    /// Recorded only when the order moves to `shipped`.
    #[serde(alias = "tracking_number")]
    #[validate(length(min = 1, max = 100, message = "Tracking number must be 1-100 characters"))]
    pub tracking_number: Option<String>,
}

/// Parse the optional `status` filter, rejecting unknown values.
fn status_filter(raw: Option<&str>) -> Result<Option<OrderStatus>> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<OrderStatus>()
                .map_err(|_| AppError::validation(format!("Unknown order status: {s}")))
        })
        .transpose()
}

/// `GET /api/admin/orders`
#[instrument(skip(state, staff))]
pub async fn list(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<Order>>>> {
    staff.require(Permission::ManageOrders)?;

    let status = status_filter(query.status.as_deref())?;
    let page = PageParams {
        page: query.page,
        limit: query.limit,
    };

    let (orders, total) = OrderRepository::new(state.pool())
        .list(None, status, page)
        .await?;
    Ok(Json(ApiResponse::paginated(orders, page.with_total(total))))
}

/// `GET /api/admin/orders/{id}`
#[instrument(skip(state, staff))]
pub async fn show(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<OrderId>,
) -> Result<Json<ApiResponse<AdminOrderDetail>>> {
    staff.require(Permission::ManageOrders)?;

    let detail = OrderRepository::new(state.pool())
        .get_detail(id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.to_string()))?;
    Ok(Json(ApiResponse::ok(detail.into())))
}

/// `PATCH /api/admin/orders/{id}`
///
/// Invalid transitions are rejected with 400; a change that lost a race
/// with another update is rejected with 409.
#[instrument(skip(state, staff, body), fields(next = %body.status))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<OrderId>,
    ValidatedJson(body): ValidatedJson<StatusChange>,
) -> Result<Json<ApiResponse<Order>>> {
    staff.require(Permission::ManageOrders)?;

    let repo = OrderRepository::new(state.pool());
    let order = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.to_string()))?;

    let update = plan_status_change(
        order.status,
        order.payment_status,
        body.status,
        body.tracking_number,
        Utc::now(),
    )?;

    let updated = repo
        .apply(id, &update)
        .await
        .map_err(|e| AppError::or_not_found(e, NOT_FOUND))?;

    tracing::info!(
        order_id = %id,
        staff_id = %staff.id,
        from = %order.status,
        to = %updated.status,
        "order status changed"
    );
    Ok(Json(
        ApiResponse::ok(updated).with_message("Order status updated"),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_filter() {
        assert_eq!(status_filter(None).unwrap(), None);
        assert_eq!(status_filter(Some("  ")).unwrap(), None);
        assert_eq!(
            status_filter(Some("shipped")).unwrap(),
            Some(OrderStatus::Shipped)
        );
        assert!(matches!(
            status_filter(Some("lost")),
            Err(AppError::Validation { .. })
        ));
    }

    #[test]
    fn test_status_change_accepts_both_casings() {
        let camel: StatusChange =
            serde_json::from_str(r#"{"status":"shipped","trackingNumber":"1Z999"}"#).unwrap();
        let snake: StatusChange =
            serde_json::from_str(r#"{"status":"shipped","tracking_number":"1Z999"}"#).unwrap();
        assert_eq!(camel.tracking_number.as_deref(), Some("1Z999"));
        assert_eq!(snake.tracking_number, camel.tracking_number);
        assert_eq!(snake.status, OrderStatus::Shipped);
    }

    #[test]
    fn test_empty_tracking_number_fails_validation() {
        let body = StatusChange {
            status: OrderStatus::Shipped,
            tracking_number: Some(String::new()),
        };
        assert!(body.validate().is_err());
    }
}
