//! Home page banner route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use bazaar_core::api::ApiResponse;
use bazaar_core::db::BannerRepository;
use bazaar_core::db::banners::{Banner, BannerChanges, NewBanner};
use bazaar_core::{BannerId, Permission};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::extract::ValidatedJson;
use crate::middleware::RequireStaff;
use crate::state::AppState;

const NOT_FOUND: &str = "Banner not found";

/// `GET /api/admin/banners`
///
/// Every banner, including inactive and scheduled ones.
#[instrument(skip(state, _staff))]
pub async fn list(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
) -> Result<Json<ApiResponse<Vec<Banner>>>> {
    let banners = BannerRepository::new(state.pool()).list_all().await?;
    Ok(Json(ApiResponse::ok(banners)))
}

/// `POST /api/admin/banners`
#[instrument(skip(state, staff, body))]
pub async fn create(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    ValidatedJson(body): ValidatedJson<NewBanner>,
) -> Result<(StatusCode, Json<ApiResponse<Banner>>)> {
    staff.require(Permission::ManageCatalog)?;

    let banner = BannerRepository::new(state.pool()).create(&body).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(banner).with_message("Banner created")),
    ))
}

/// `PATCH /api/admin/banners/{id}`
#[instrument(skip(state, staff, body))]
pub async fn update(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<BannerId>,
    ValidatedJson(body): ValidatedJson<BannerChanges>,
) -> Result<Json<ApiResponse<Banner>>> {
    staff.require(Permission::ManageCatalog)?;

    let banner = BannerRepository::new(state.pool())
        .update(id, &body)
        .await
        .map_err(|e| AppError::or_not_found(e, NOT_FOUND))?;
    Ok(Json(ApiResponse::ok(banner).with_message("Banner updated")))
}

/// `DELETE /api/admin/banners/{id}`
#[instrument(skip(state, staff))]
pub async fn delete(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<BannerId>,
) -> Result<Json<ApiResponse<()>>> {
    staff.require(Permission::ManageCatalog)?;

    BannerRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(|e| AppError::or_not_found(e, NOT_FOUND))?;
    Ok(Json(ApiResponse::message("Banner deleted")))
}
