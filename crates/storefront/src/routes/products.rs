//! Product catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use bazaar_core::ProductId;
use bazaar_core::api::{ApiResponse, PageParams};
use bazaar_core::db::ProductRepository;
use bazaar_core::db::products::{Product, ProductDetail, ProductFilter};
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Shortest accepted search query.
const MIN_SEARCH_LEN: usize = 2;

/// Most results returned by `/api/products/search`.
const SEARCH_LIMIT: i64 = 20;

/// `?category=&featured=&search=&page=&limit=`
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// `GET /api/products`
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
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
        include_inactive: false,
    };

    let (products, total) = ProductRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(ApiResponse::paginated(products, page.with_total(total))))
}

/// `GET /api/products/search?q=`
#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<Product>>>> {
    let q = query.q.as_deref().map(str::trim).unwrap_or_default();
    if q.chars().count() < MIN_SEARCH_LEN {
        return Err(AppError::validation(format!(
            "Search query must be at least {MIN_SEARCH_LEN} characters"
        )));
    }

    let products = ProductRepository::new(state.pool())
        .search(q, SEARCH_LIMIT)
        .await?;
    Ok(Json(ApiResponse::ok(products)))
}

/// `GET /api/products/{id}`
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ApiResponse<ProductDetail>>> {
    let repo = ProductRepository::new(state.pool());
    let product = repo
        .get(id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
    Ok(Json(ApiResponse::ok(repo.with_variants(product, false).await?)))
}

/// `GET /api/products/slug/{slug}`
#[instrument(skip(state))]
pub async fn show_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<ProductDetail>>> {
    let repo = ProductRepository::new(state.pool());
    let product = repo
        .get_active_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
    Ok(Json(ApiResponse::ok(repo.with_variants(product, false).await?)))
}
