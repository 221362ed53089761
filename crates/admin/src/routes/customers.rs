//! Customer account route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use bazaar_core::api::{ApiResponse, PageParams};
use bazaar_core::db::UserRepository;
use bazaar_core::db::users::User;
use bazaar_core::{AccountStatus, Permission, UserId};
use serde::Deserialize;
use tracing::instrument;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::extract::ValidatedJson;
use crate::middleware::RequireStaff;
use crate::state::AppState;

/// `?search=&page=&limit=`
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Body of `PATCH /api/admin/customers/{id}/status`.
#[derive(Debug, Deserialize, Validate)]
pub struct StatusRequest {
    pub status: AccountStatus,
}

/// `GET /api/admin/customers`
#[instrument(skip(state, staff))]
pub async fn list(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<User>>>> {
    staff.require(Permission::ManageCustomers)?;

    let page = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let (customers, total) = UserRepository::new(state.pool())
        .list_customers(page, search)
        .await?;
    Ok(Json(ApiResponse::paginated(customers, page.with_total(total))))
}

/// `PATCH /api/admin/customers/{id}/status`
///
/// Deactivated customers can no longer log in; tokens already issued stay
/// valid until they expire.
#[instrument(skip(state, staff))]
pub async fn set_status(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<UserId>,
    ValidatedJson(body): ValidatedJson<StatusRequest>,
) -> Result<Json<ApiResponse<User>>> {
    staff.require(Permission::ManageCustomers)?;

    let customer = UserRepository::new(state.pool())
        .set_customer_status(id, body.status)
        .await
        .map_err(|e| AppError::or_not_found(e, "Customer not found"))?;

    tracing::info!(
        customer_id = %id,
        staff_id = %staff.id,
        status = ?body.status,
        "customer status changed"
    );
    Ok(Json(
        ApiResponse::ok(customer).with_message("Customer status updated"),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_request_accepts_lowercase() {
        let body: StatusRequest = serde_json::from_str(r#"{"status":"inactive"}"#).unwrap();
        assert_eq!(body.status, AccountStatus::Inactive);
        assert!(serde_json::from_str::<StatusRequest>(r#"{"status":"banned"}"#).is_err());
    }
}
