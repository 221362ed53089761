//! Product management route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use bazaar_core::api::{ApiResponse, PageParams};
use bazaar_core::db::ProductRepository;
use bazaar_core::db::products::{NewProduct, Product, ProductChanges, ProductDetail, ProductFilter};
use bazaar_core::{Permission, ProductId};
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::extract::ValidatedJson;
use crate::middleware::RequireStaff;
use crate::state::AppState;

const NOT_FOUND: &str = "Product not found";

/// `?category=&featured=&search=&page=&limit=`
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// `GET /api/admin/products`
///
/// Unlike the storefront listing, inactive products are included.
#[instrument(skip(state, _staff))]
pub async fn list(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<Product>>>> {
    let page = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let filter = ProductFilter {
        category: query.category,
        featured: query.featured,
        search: query.search,
        include_inactive: true,
    };

    let (products, total) = ProductRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(ApiResponse::paginated(products, page.with_total(total))))
}

/// `GET /api/admin/products/{id}`
#[instrument(skip(state, _staff))]
pub async fn show(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    Path(id): Path<ProductId>,
) -> Result<Json<ApiResponse<ProductDetail>>> {
    let repo = ProductRepository::new(state.pool());
    let product = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.to_string()))?;
    let detail = repo.with_variants(product, true).await?;
    Ok(Json(ApiResponse::ok(detail)))
}

/// `POST /api/admin/products`
#[instrument(skip(state, staff, body), fields(name = %body.name))]
pub async fn create(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    ValidatedJson(body): ValidatedJson<NewProduct>,
) -> Result<(StatusCode, Json<ApiResponse<Product>>)> {
    staff.require(Permission::ManageCatalog)?;

    let product = ProductRepository::new(state.pool()).create(&body).await?;
    tracing::info!(product_id = %product.id, staff_id = %staff.id, "product created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(product).with_message("Product created")),
    ))
}

/// `PATCH /api/admin/products/{id}`
#[instrument(skip(state, staff, body))]
pub async fn update(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<ProductId>,
    ValidatedJson(body): ValidatedJson<ProductChanges>,
) -> Result<Json<ApiResponse<Product>>> {
    staff.require(Permission::ManageCatalog)?;

    let product = ProductRepository::new(state.pool())
        .update(id, &body)
        .await
        .map_err(|e| AppError::or_not_found(e, NOT_FOUND))?;
    Ok(Json(ApiResponse::ok(product).with_message("Product updated")))
}

/// `DELETE /api/admin/products/{id}`
///
/// Order items keep their own copy of the product name and price.
#[instrument(skip(state, staff))]
pub async fn delete(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<ProductId>,
) -> Result<Json<ApiResponse<()>>> {
    staff.require(Permission::ManageCatalog)?;

    ProductRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(|e| AppError::or_not_found(e, NOT_FOUND))?;
    tracing::info!(product_id = %id, staff_id = %staff.id, "product deleted");
    Ok(Json(ApiResponse::message("Product deleted")))
}
