//! Coupon repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use validator::{Validate, ValidationError};

use super::{RepositoryError, conflict_on_unique, validate};
use crate::api::PageParams;
use crate::coupon::{Coupon, normalize_code};
use crate::types::{CouponId, DiscountType};

/// Body of a create-coupon request.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_new_coupon"))]
pub struct NewCoupon {
    #[validate(length(min = 1, max = 64, message = "Coupon code is required"))]
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    #[validate(custom(function = "validate::positive_amount"))]
    pub discount_value: Decimal,
    pub min_purchase_amount: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    #[validate(range(min = 1, message = "Usage limit must be at least 1"))]
    pub usage_limit: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Body of a partial coupon update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[validate(schema(function = "validate_coupon_changes"))]
pub struct CouponChanges {
    pub description: Option<String>,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<Decimal>,
    pub min_purchase_amount: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    #[validate(range(min = 1, message = "Usage limit must be at least 1"))]
    pub usage_limit: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

const fn default_true() -> bool {
    true
}

fn check_window(
    from: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    match (from, until) {
        (Some(from), Some(until)) if until < from => {
            let mut err = ValidationError::new("valid_until");
            err.message = Some("valid_until must be after valid_from".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

fn check_percentage(kind: Option<DiscountType>, value: Option<Decimal>) -> Result<(), ValidationError> {
    if kind == Some(DiscountType::Percentage) && value.is_some_and(|v| v > Decimal::ONE_HUNDRED) {
        let mut err = ValidationError::new("discount_value");
        err.message = Some("percentage discount cannot exceed 100".into());
        return Err(err);
    }
    Ok(())
}

fn validate_new_coupon(c: &NewCoupon) -> Result<(), ValidationError> {
    validate::optional_non_negative(c.min_purchase_amount)?;
    validate::optional_positive(c.max_discount_amount)?;
    check_percentage(Some(c.discount_type), Some(c.discount_value))?;
    check_window(c.valid_from, c.valid_until)
}

fn validate_coupon_changes(c: &CouponChanges) -> Result<(), ValidationError> {
    validate::optional_positive(c.discount_value)?;
    validate::optional_non_negative(c.min_purchase_amount)?;
    validate::optional_positive(c.max_discount_amount)?;
    check_percentage(c.discount_type, c.discount_value)?;
    check_window(c.valid_from, c.valid_until)
}

const COUPON_COLUMNS: &str = "id, code, description, discount_type, discount_value, \
                              min_purchase_amount, max_discount_amount, usage_limit, usage_count, \
                              valid_from, valid_until, is_active, created_at, updated_at";

pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up an active coupon by user-entered code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn find_active_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        find_active_by_code(&mut conn, code).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, page: PageParams) -> Result<(Vec<Coupon>, i64), RepositoryError> {
        let coupons = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM coupons")
            .fetch_one(self.pool)
            .await?;

        Ok((coupons, total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CouponId) -> Result<Option<Coupon>, RepositoryError> {
        let row = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Create a coupon. The code is stored upper-case.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is taken.
    #[instrument(skip(self, new), fields(code = %new.code))]
    pub async fn create(&self, new: &NewCoupon) -> Result<Coupon, RepositoryError> {
        let row = sqlx::query_as::<_, Coupon>(&format!(
            r"
            INSERT INTO coupons (
                code, description, discount_type, discount_value, min_purchase_amount,
                max_discount_amount, usage_limit, valid_from, valid_until, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(normalize_code(&new.code))
        .bind(&new.description)
        .bind(new.discount_type)
        .bind(new.discount_value)
        .bind(new.min_purchase_amount)
        .bind(new.max_discount_amount)
        .bind(new.usage_limit)
        .bind(new.valid_from)
        .bind(new.valid_until)
        .bind(new.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("coupon code already exists"))?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist,
    /// `RepositoryError::Database` if a constraint (e.g. percentage over
    /// 100 after a type change) rejects the result.
    #[instrument(skip(self, changes))]
    pub async fn update(
        &self,
        id: CouponId,
        changes: &CouponChanges,
    ) -> Result<Coupon, RepositoryError> {
        sqlx::query_as::<_, Coupon>(&format!(
            r"
            UPDATE coupons SET
                description = COALESCE($2, description),
                discount_type = COALESCE($3, discount_type),
                discount_value = COALESCE($4, discount_value),
                min_purchase_amount = COALESCE($5, min_purchase_amount),
                max_discount_amount = COALESCE($6, max_discount_amount),
                usage_limit = COALESCE($7, usage_limit),
                valid_from = COALESCE($8, valid_from),
                valid_until = COALESCE($9, valid_until),
                is_active = COALESCE($10, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&changes.description)
        .bind(changes.discount_type)
        .bind(changes.discount_value)
        .bind(changes.min_purchase_amount)
        .bind(changes.max_discount_amount)
        .bind(changes.usage_limit)
        .bind(changes.valid_from)
        .bind(changes.valid_until)
        .bind(changes.is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: CouponId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Look up an active coupon by code on an existing connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_active_by_code(
    conn: &mut PgConnection,
    code: &str,
) -> Result<Option<Coupon>, RepositoryError> {
    let row = sqlx::query_as::<_, Coupon>(&format!(
        "SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1 AND is_active"
    ))
    .bind(normalize_code(code))
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

/// Count one use of a coupon, unless that would exceed its limit.
///
/// The check and increment are a single statement, so two checkouts racing
/// for the last use cannot both succeed. Returns `false` if the coupon is
/// exhausted or no longer active.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn redeem(conn: &mut PgConnection, id: CouponId) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE coupons
        SET usage_count = usage_count + 1, updated_at = NOW()
        WHERE id = $1
          AND is_active
          AND (usage_limit IS NULL OR usage_count < usage_limit)
        ",
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}
