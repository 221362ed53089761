//! Product and variant repository.
//!
//! Stock is only ever decremented through [`decrement_stock`], which guards
//! on the current quantity so concurrent checkouts cannot oversell.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use validator::{Validate, ValidationError};

use super::{RepositoryError, conflict_on_unique, validate};
use crate::api::PageParams;
use crate::types::{CategoryId, ProductId, VariantId};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub stock_quantity: i32,
    pub low_stock_threshold: i32,
    pub weight: Option<Decimal>,
    pub images: Vec<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub const fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.low_stock_threshold
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub name: String,
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub stock_quantity: i32,
    pub is_active: bool,
}

/// A product with its active variants.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub variants: Vec<ProductVariant>,
}

/// Catalog listing filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Category slug.
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub search: Option<String>,
    /// Include inactive products (back office only).
    #[serde(skip)]
    pub include_inactive: bool,
}

/// Body of a create-product request.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_new_product"))]
pub struct NewProduct {
    #[validate(length(min = 1, message = "Product name is required"))]
    pub name: String,
    /// Derived from `name` when absent.
    pub slug: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub category_id: Option<CategoryId>,
    #[validate(custom(function = "validate::positive_amount"))]
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock_quantity: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub low_stock_threshold: i32,
    pub weight: Option<Decimal>,
    #[serde(default)]
    #[validate(custom(function = "validate::image_list"))]
    pub images: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
}

impl NewProduct {
    /// The slug to store: the explicit one or one derived from the name.
    #[must_use]
    pub fn effective_slug(&self) -> String {
        self.slug
            .clone()
            .unwrap_or_else(|| validate::slugify(&self.name))
    }
}

/// Body of a partial product update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[validate(schema(function = "validate_product_changes"))]
pub struct ProductChanges {
    #[validate(length(min = 1, message = "Product name cannot be empty"))]
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub price: Option<Decimal>,
    pub compare_at_price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock_quantity: Option<i32>,
    #[validate(range(min = 0))]
    pub low_stock_threshold: Option<i32>,
    pub weight: Option<Decimal>,
    pub images: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
}

const fn default_true() -> bool {
    true
}

fn validate_new_product(p: &NewProduct) -> Result<(), ValidationError> {
    validate::optional_positive(p.compare_at_price)?;
    validate::optional_non_negative(p.cost_price)?;
    validate::optional_positive(p.weight)?;
    validate::slug(&p.effective_slug())
}

fn validate_product_changes(p: &ProductChanges) -> Result<(), ValidationError> {
    validate::optional_positive(p.price)?;
    validate::optional_positive(p.compare_at_price)?;
    validate::optional_non_negative(p.cost_price)?;
    validate::optional_positive(p.weight)?;
    if let Some(images) = &p.images {
        validate::image_list(images)?;
    }
    p.slug.as_deref().map_or(Ok(()), validate::slug)
}

const PRODUCT_SELECT: &str = r"
    SELECT p.id, p.name, p.slug, p.description, p.short_description, p.category_id,
           c.name AS category_name, p.price, p.compare_at_price, p.cost_price, p.sku,
           p.barcode, p.stock_quantity, p.low_stock_threshold, p.weight, p.images,
           p.is_active, p.is_featured, p.seo_title, p.seo_description,
           p.created_at, p.updated_at
    FROM products p
    LEFT JOIN categories c ON c.id = p.category_id
";

const PRODUCT_FILTER: &str = r"
    WHERE ($1 OR p.is_active)
      AND ($2::text IS NULL OR c.slug = $2)
      AND ($3::bool IS NULL OR p.is_featured = $3)
      AND ($4::text IS NULL OR p.name ILIKE $4 OR p.description ILIKE $4
           OR p.short_description ILIKE $4 OR p.sku ILIKE $4)
";

const VARIANT_COLUMNS: &str = "id, product_id, name, sku, price, stock_quantity, is_active";

pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: PageParams,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{s}%"));

        let products = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} {PRODUCT_FILTER} ORDER BY p.created_at DESC LIMIT $5 OFFSET $6"
        ))
        .bind(filter.include_inactive)
        .bind(filter.category.as_deref())
        .bind(filter.featured)
        .bind(pattern.as_deref())
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM products p LEFT JOIN categories c ON c.id = p.category_id {PRODUCT_FILTER}"
        ))
        .bind(filter.include_inactive)
        .bind(filter.category.as_deref())
        .bind(filter.featured)
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok((products, total))
    }

    /// Free-text search over active products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let filter = ProductFilter {
            search: Some(query.to_owned()),
            ..ProductFilter::default()
        };
        let page = PageParams {
            page: Some(1),
            limit: u32::try_from(limit).ok(),
        };
        let (products, _) = self.list(&filter, page).await?;
        Ok(products)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// An active product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} WHERE p.slug = $1 AND p.is_active"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Attach variants to a product. Inactive variants are included only
    /// when `include_inactive` is set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn with_variants(
        &self,
        product: Product,
        include_inactive: bool,
    ) -> Result<ProductDetail, RepositoryError> {
        let variants = sqlx::query_as::<_, ProductVariant>(&format!(
            r"
            SELECT {VARIANT_COLUMNS} FROM product_variants
            WHERE product_id = $1 AND ($2 OR is_active)
            ORDER BY id
            "
        ))
        .bind(product.id)
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;

        Ok(ProductDetail { product, variants })
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_variant(
        &self,
        id: VariantId,
    ) -> Result<Option<ProductVariant>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductVariant>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Products at or below their low-stock threshold.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(&self, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, Product>(&format!(
            r"
            {PRODUCT_SELECT}
            WHERE p.is_active AND p.stock_quantity <= p.low_stock_threshold
            ORDER BY p.stock_quantity, p.name
            LIMIT $1
            "
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug or SKU is taken.
    #[instrument(skip(self, new), fields(name = %new.name))]
    pub async fn create(&self, new: &NewProduct) -> Result<Product, RepositoryError> {
        let id: ProductId = sqlx::query_scalar(
            r"
            INSERT INTO products (
                name, slug, description, short_description, category_id, price,
                compare_at_price, cost_price, sku, barcode, stock_quantity,
                low_stock_threshold, weight, images, is_active, is_featured,
                seo_title, seo_description
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING id
            ",
        )
        .bind(&new.name)
        .bind(new.effective_slug())
        .bind(&new.description)
        .bind(&new.short_description)
        .bind(new.category_id)
        .bind(new.price)
        .bind(new.compare_at_price)
        .bind(new.cost_price)
        .bind(&new.sku)
        .bind(&new.barcode)
        .bind(new.stock_quantity)
        .bind(new.low_stock_threshold)
        .bind(new.weight)
        .bind(&new.images)
        .bind(new.is_active)
        .bind(new.is_featured)
        .bind(&new.seo_title)
        .bind(&new.seo_description)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("product slug or SKU already exists"))?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist,
    /// `RepositoryError::Conflict` if the new slug or SKU is taken.
    #[instrument(skip(self, changes))]
    pub async fn update(
        &self,
        id: ProductId,
        changes: &ProductChanges,
    ) -> Result<Product, RepositoryError> {
        let updated: Option<ProductId> = sqlx::query_scalar(
            r"
            UPDATE products SET
                name = COALESCE($2, name),
                slug = COALESCE($3, slug),
                description = COALESCE($4, description),
                short_description = COALESCE($5, short_description),
                category_id = COALESCE($6, category_id),
                price = COALESCE($7, price),
                compare_at_price = COALESCE($8, compare_at_price),
                cost_price = COALESCE($9, cost_price),
                sku = COALESCE($10, sku),
                barcode = COALESCE($11, barcode),
                stock_quantity = COALESCE($12, stock_quantity),
                low_stock_threshold = COALESCE($13, low_stock_threshold),
                weight = COALESCE($14, weight),
                images = COALESCE($15, images),
                is_active = COALESCE($16, is_active),
                is_featured = COALESCE($17, is_featured),
                seo_title = COALESCE($18, seo_title),
                seo_description = COALESCE($19, seo_description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            ",
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.slug)
        .bind(&changes.description)
        .bind(&changes.short_description)
        .bind(changes.category_id)
        .bind(changes.price)
        .bind(changes.compare_at_price)
        .bind(changes.cost_price)
        .bind(&changes.sku)
        .bind(&changes.barcode)
        .bind(changes.stock_quantity)
        .bind(changes.low_stock_threshold)
        .bind(changes.weight)
        .bind(&changes.images)
        .bind(changes.is_active)
        .bind(changes.is_featured)
        .bind(&changes.seo_title)
        .bind(&changes.seo_description)
        .fetch_optional(self.pool)
        .await
        .map_err(conflict_on_unique("product slug or SKU already exists"))?;

        let id = updated.ok_or(RepositoryError::NotFound)?;
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Take `quantity` units of a product (or one of its variants) out of stock.
///
/// Returns `false` without changing anything when there is not enough
/// stock. Intended to run inside the order-placement transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn decrement_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    variant_id: Option<VariantId>,
    quantity: i32,
) -> Result<bool, RepositoryError> {
    let result = match variant_id {
        Some(variant_id) => {
            sqlx::query(
                r"
                UPDATE product_variants
                SET stock_quantity = stock_quantity - $3, updated_at = NOW()
                WHERE id = $1 AND product_id = $2 AND stock_quantity >= $3
                ",
            )
            .bind(variant_id)
            .bind(product_id)
            .bind(quantity)
            .execute(&mut *conn)
            .await?
        }
        None => {
            sqlx::query(
                r"
                UPDATE products
                SET stock_quantity = stock_quantity - $2, updated_at = NOW()
                WHERE id = $1 AND stock_quantity >= $2
                ",
            )
            .bind(product_id)
            .bind(quantity)
            .execute(&mut *conn)
            .await?
        }
    };

    Ok(result.rows_affected() == 1)
}
