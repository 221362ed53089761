//! Category management route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use bazaar_core::api::ApiResponse;
use bazaar_core::db::CategoryRepository;
use bazaar_core::db::categories::{Category, CategoryChanges, NewCategory};
use bazaar_core::{CategoryId, Permission};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::extract::ValidatedJson;
use crate::middleware::RequireStaff;
use crate::state::AppState;

const NOT_FOUND: &str = "Category not found";

/// `GET /api/admin/categories`
#[instrument(skip(state, _staff))]
pub async fn list(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
) -> Result<Json<ApiResponse<Vec<Category>>>> {
    let categories = CategoryRepository::new(state.pool()).list_all().await?;
    Ok(Json(ApiResponse::ok(categories)))
}

/// `POST /api/admin/categories`
#[instrument(skip(state, staff, body), fields(slug = %body.slug))]
pub async fn create(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    ValidatedJson(body): ValidatedJson<NewCategory>,
) -> Result<(StatusCode, Json<ApiResponse<Category>>)> {
    staff.require(Permission::ManageCatalog)?;

    let category = CategoryRepository::new(state.pool()).create(&body).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(category).with_message("Category created")),
    ))
}

/// `PATCH /api/admin/categories/{id}`
#[instrument(skip(state, staff, body))]
pub async fn update(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<CategoryId>,
    ValidatedJson(body): ValidatedJson<CategoryChanges>,
) -> Result<Json<ApiResponse<Category>>> {
    staff.require(Permission::ManageCatalog)?;

    if body.parent_id == Some(id) {
        return Err(AppError::validation("A category cannot be its own parent"));
    }

    let category = CategoryRepository::new(state.pool())
        .update(id, &body)
        .await
        .map_err(|e| AppError::or_not_found(e, NOT_FOUND))?;
    Ok(Json(ApiResponse::ok(category).with_message("Category updated")))
}

/// `DELETE /api/admin/categories/{id}`
///
/// Products in the category are kept and become uncategorised.
#[instrument(skip(state, staff))]
pub async fn delete(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<CategoryId>,
) -> Result<Json<ApiResponse<()>>> {
    staff.require(Permission::ManageCatalog)?;

    CategoryRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(|e| AppError::or_not_found(e, NOT_FOUND))?;
    tracing::info!(category_id = %id, staff_id = %staff.id, "category deleted");
    Ok(Json(ApiResponse::message("Category deleted")))
}
