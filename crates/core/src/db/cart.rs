//! Server-side cart repository.
//!
//! Carts are keyed by user. Each (product, variant) pair appears at most
//! once; adding it again increases the quantity.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use validator::Validate;

use super::RepositoryError;
use crate::pricing::CartLine;
use crate::types::{CartItemId, ProductId, UserId, VariantId};

/// A cart line joined with live catalog data.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CartEntry {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
    pub product_name: String,
    pub product_slug: String,
    pub variant_name: Option<String>,
    pub sku: Option<String>,
    pub image_url: Option<String>,
    /// Variant price when set, else product price.
    pub unit_price: Decimal,
    /// Stock of the variant when set, else of the product.
    pub available: i32,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

impl CartEntry {
    /// The pricing view of this entry. Non-positive quantities (which the
    /// schema forbids) price as zero.
    #[must_use]
    pub fn line(&self) -> CartLine {
        CartLine {
            product_id: self.product_id,
            variant_id: self.variant_id,
            unit_price: self.unit_price,
            quantity: u32::try_from(self.quantity).unwrap_or(0),
        }
    }
}

/// Body of an add-to-cart request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddToCart {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    #[validate(range(min = 1, max = 999, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

/// Body of a quantity update.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateCartQuantity {
    #[validate(range(min = 1, max = 999, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

const ENTRY_SELECT: &str = r"
    SELECT ci.id, ci.product_id, ci.variant_id, ci.quantity,
           p.name AS product_name, p.slug AS product_slug,
           v.name AS variant_name, COALESCE(v.sku, p.sku) AS sku,
           p.images[1] AS image_url,
           COALESCE(v.price, p.price) AS unit_price,
           COALESCE(v.stock_quantity, p.stock_quantity) AS available,
           (p.is_active AND COALESCE(v.is_active, TRUE)) AS is_available,
           ci.created_at
    FROM cart_items ci
    JOIN products p ON p.id = ci.product_id
    LEFT JOIN product_variants v ON v.id = ci.variant_id
";

pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's cart, oldest line first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<CartEntry>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        entries_for_user(&mut conn, user_id, false).await
    }

    /// Add a line, or increase its quantity if already present.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product (or the variant
    /// for that product) does not exist or is inactive.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        quantity: i32,
    ) -> Result<CartItemId, RepositoryError> {
        let id: Option<CartItemId> = sqlx::query_scalar(
            r"
            INSERT INTO cart_items (user_id, product_id, variant_id, quantity)
            SELECT $1, p.id, v.id, $4
            FROM products p
            LEFT JOIN product_variants v ON v.id = $3 AND v.product_id = p.id AND v.is_active
            WHERE p.id = $2 AND p.is_active AND ($3::int IS NULL OR v.id IS NOT NULL)
            ON CONFLICT (user_id, product_id, variant_id)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(variant_id)
        .bind(quantity)
        .fetch_optional(self.pool)
        .await?;

        id.ok_or(RepositoryError::NotFound)
    }

    /// Set the quantity of one of the user's lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line does not belong to
    /// the user.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        id: CartItemId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE cart_items SET quantity = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(user_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove one of the user's lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line does not belong to
    /// the user.
    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: UserId, id: CartItemId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        clear(&mut conn, user_id).await
    }
}

/// Cart entries for a user. With `lock`, the cart rows are locked
/// `FOR UPDATE` until the surrounding transaction ends.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn entries_for_user(
    conn: &mut PgConnection,
    user_id: UserId,
    lock: bool,
) -> Result<Vec<CartEntry>, RepositoryError> {
    let lock_clause = if lock { "FOR UPDATE OF ci" } else { "" };
    let rows = sqlx::query_as::<_, CartEntry>(&format!(
        "{ENTRY_SELECT} WHERE ci.user_id = $1 ORDER BY ci.created_at, ci.id {lock_clause}"
    ))
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn clear(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
