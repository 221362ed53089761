//! Home page banners.

use axum::{Json, extract::State};
use bazaar_core::api::ApiResponse;
use bazaar_core::db::BannerRepository;
use bazaar_core::db::banners::Banner;
use chrono::Utc;

use crate::error::Result;
use crate::state::AppState;

/// `GET /api/banners`
///
/// Active banners whose validity window includes the current time.
pub async fn list(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Banner>>>> {
    let banners = BannerRepository::new(state.pool())
        .list_live(Utc::now())
        .await?;
    Ok(Json(ApiResponse::ok(banners)))
}
