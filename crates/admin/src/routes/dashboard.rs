//! Dashboard route handler.

use axum::{Json, extract::State};
use bazaar_core::api::ApiResponse;
use bazaar_core::db::DashboardRepository;
use bazaar_core::db::dashboard::DashboardStats;
use tracing::instrument;

use crate::error::Result;
use crate::middleware::RequireStaff;
use crate::state::AppState;

/// `GET /api/admin/dashboard`
#[instrument(skip(state, _staff))]
pub async fn show(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
) -> Result<Json<ApiResponse<DashboardStats>>> {
    let stats = DashboardRepository::new(state.pool()).stats().await?;
    Ok(Json(ApiResponse::ok(stats)))
}
