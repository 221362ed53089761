//! Coupon management route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use bazaar_core::api::{ApiResponse, PageParams};
use bazaar_core::coupon::Coupon;
use bazaar_core::db::CouponRepository;
use bazaar_core::db::coupons::{CouponChanges, NewCoupon};
use bazaar_core::{CouponId, DiscountType, Permission};
use rust_decimal::Decimal;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::extract::ValidatedJson;
use crate::middleware::RequireStaff;
use crate::state::AppState;

const NOT_FOUND: &str = "Coupon not found";

/// `GET /api/admin/coupons`
#[instrument(skip(state, staff))]
pub async fn list(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Query(page): Query<PageParams>,
) -> Result<Json<ApiResponse<Vec<Coupon>>>> {
    staff.require(Permission::ManageCoupons)?;

    let (coupons, total) = CouponRepository::new(state.pool()).list(page).await?;
    Ok(Json(ApiResponse::paginated(coupons, page.with_total(total))))
}

/// `POST /api/admin/coupons`
#[instrument(skip(state, staff, body), fields(code = %body.code))]
pub async fn create(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    ValidatedJson(body): ValidatedJson<NewCoupon>,
) -> Result<(StatusCode, Json<ApiResponse<Coupon>>)> {
    staff.require(Permission::ManageCoupons)?;

    let coupon = CouponRepository::new(state.pool()).create(&body).await?;
    tracing::info!(coupon_id = %coupon.id, code = %coupon.code, staff_id = %staff.id, "coupon created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(coupon).with_message("Coupon created")),
    ))
}

/// `PATCH /api/admin/coupons/{id}`
///
/// The code itself is immutable; create a new coupon to rename one.
#[instrument(skip(state, staff, body))]
pub async fn update(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<CouponId>,
    ValidatedJson(body): ValidatedJson<CouponChanges>,
) -> Result<Json<ApiResponse<Coupon>>> {
    staff.require(Permission::ManageCoupons)?;

    let repo = CouponRepository::new(state.pool());
    let current = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.to_string()))?;
    check_merged_discount(&current, &body)?;

    let coupon = repo
        .update(id, &body)
        .await
        .map_err(|e| AppError::or_not_found(e, NOT_FOUND))?;
    Ok(Json(ApiResponse::ok(coupon).with_message("Coupon updated")))
}

/// `DELETE /api/admin/coupons/{id}`
///
/// Orders that used the coupon keep the code they were placed with.
#[instrument(skip(state, staff))]
pub async fn delete(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<CouponId>,
) -> Result<Json<ApiResponse<()>>> {
    staff.require(Permission::ManageCoupons)?;

    CouponRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(|e| AppError::or_not_found(e, NOT_FOUND))?;
    tracing::info!(coupon_id = %id, staff_id = %staff.id, "coupon deleted");
    Ok(Json(ApiResponse::message("Coupon deleted")))
}

/// Reject a partial update that would leave a percentage coupon above 100%.
///
/// The body alone cannot tell when only one of type and value changes.
fn check_merged_discount(current: &Coupon, changes: &CouponChanges) -> Result<()> {
    let kind = changes.discount_type.unwrap_or(current.discount_type);
    let value = changes.discount_value.unwrap_or(current.discount_value);
    if kind == DiscountType::Percentage && value > Decimal::ONE_HUNDRED {
        return Err(AppError::validation(
            "discount_value: percentage discount cannot exceed 100",
        ));
    }
    Ok(())
}
