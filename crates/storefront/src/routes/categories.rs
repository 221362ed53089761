//! Category listing.

use axum::{Json, extract::State};
use bazaar_core::api::ApiResponse;
use bazaar_core::db::CategoryRepository;
use bazaar_core::db::categories::Category;

use crate::error::Result;
use crate::state::AppState;

/// `GET /api/categories`
pub async fn list(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Category>>>> {
    let categories = CategoryRepository::new(state.pool()).list_active().await?;
    Ok(Json(ApiResponse::ok(categories)))
}
