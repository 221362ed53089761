//! Order repository.
//!
//! Orders are only created by [`OrderRepository::place_from_cart`], which
//! prices the cart, applies the coupon, reserves stock and writes the order
//! in one transaction. Status changes go through [`OrderRepository::apply`]
//! with a compare-and-set on the current status.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, instrument};
use validator::Validate;

use super::{RepositoryError, cart, coupons, products};
use crate::api::PageParams;
use crate::coupon::{self, CouponRejection};
use crate::order::{OrderUpdate, order_number};
use crate::pricing::{self, OrderTotals, PricingPolicy};
use crate::types::{
    AddressId, CurrencyCode, OrderId, OrderItemId, OrderStatus, PaymentStatus, ProductId, UserId,
    VariantId,
};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: Option<UserId>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_intent_id: Option<String>,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub shipping_amount: Decimal,
    pub total_amount: Decimal,
    pub currency: String,
    pub shipping_address_id: Option<AddressId>,
    pub billing_address_id: Option<AddressId>,
    pub coupon_code: Option<String>,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub sku: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

/// An order with its line items.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Body of a place-order request.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PlaceOrder {
    pub shipping_address_id: Option<AddressId>,
    pub billing_address_id: Option<AddressId>,
    #[validate(length(max = 64))]
    pub coupon_code: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Inputs to order placement that do not come from the request body.
#[derive(Debug, Clone, Copy)]
pub struct PlacementContext<'a> {
    pub user_id: UserId,
    pub policy: &'a PricingPolicy,
    pub currency: CurrencyCode,
    /// Total the client saw; placement fails if the server total differs.
    pub expected_total: Option<Decimal>,
    pub now: DateTime<Utc>,
}

/// Why an order could not be placed. Nothing is written in any case.
#[derive(Debug, thiserror::Error)]
pub enum PlaceOrderError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("{0} is no longer available")]
    Unavailable(String),
    #[error("insufficient stock for {0}")]
    InsufficientStock(String),
    #[error(transparent)]
    Coupon(#[from] CouponRejection),
    #[error("address not found")]
    AddressNotFound,
    #[error("cart total changed: expected {expected}, now {actual}")]
    TotalMismatch { expected: Decimal, actual: Decimal },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for PlaceOrderError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

const ORDER_COLUMNS: &str = "id, order_number, user_id, status, payment_status, payment_intent_id, \
                             subtotal, discount_amount, tax_amount, shipping_amount, total_amount, \
                             currency, shipping_address_id, billing_address_id, coupon_code, notes, \
                             tracking_number, shipped_at, delivered_at, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, variant_id, product_name, variant_name, sku, \
                            quantity, unit_price, total_price";

pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Turn the user's cart into an order.
    ///
    /// Within one transaction: lock and price the cart, evaluate and redeem
    /// the coupon, take stock for every line, insert the order and its
    /// items, and empty the cart. Any failure rolls all of it back.
    ///
    /// # Errors
    ///
    /// Returns a [`PlaceOrderError`] describing the first problem found.
    #[instrument(skip(self, request, ctx), fields(user_id = %ctx.user_id))]
    pub async fn place_from_cart(
        &self,
        request: &PlaceOrder,
        ctx: PlacementContext<'_>,
    ) -> Result<OrderDetail, PlaceOrderError> {
        let mut tx = self.pool.begin().await?;

        for address_id in [request.shipping_address_id, request.billing_address_id]
            .into_iter()
            .flatten()
        {
            let owned: Option<AddressId> =
                sqlx::query_scalar("SELECT id FROM addresses WHERE id = $1 AND user_id = $2")
                    .bind(address_id)
                    .bind(ctx.user_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if owned.is_none() {
                return Err(PlaceOrderError::AddressNotFound);
            }
        }

        let entries = cart::entries_for_user(&mut tx, ctx.user_id, true).await?;
        if entries.is_empty() {
            return Err(PlaceOrderError::EmptyCart);
        }
        if let Some(entry) = entries.iter().find(|e| !e.is_available) {
            return Err(PlaceOrderError::Unavailable(entry.product_name.clone()));
        }

        let lines: Vec<_> = entries.iter().map(cart::CartEntry::line).collect();
        let subtotal = pricing::subtotal(&lines);

        let coupon_code = request
            .coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        let applied = match coupon_code {
            Some(code) => {
                let found = coupons::find_active_by_code(&mut tx, code).await?;
                let quote = coupon::evaluate(found.as_ref(), subtotal, ctx.now)?;
                found.map(|c| (c.id, quote))
            }
            None => None,
        };
        let discount = applied
            .as_ref()
            .map_or(Decimal::ZERO, |(_, quote)| quote.discount);

        let totals = OrderTotals::compute(subtotal, discount, ctx.policy);
        if let Some(expected) = ctx.expected_total
            && expected != totals.total
        {
            return Err(PlaceOrderError::TotalMismatch {
                expected,
                actual: totals.total,
            });
        }

        for entry in &entries {
            let taken =
                products::decrement_stock(&mut tx, entry.product_id, entry.variant_id, entry.quantity)
                    .await?;
            if !taken {
                return Err(PlaceOrderError::InsufficientStock(entry.product_name.clone()));
            }
        }

        if let Some((coupon_id, _)) = &applied
            && !coupons::redeem(&mut tx, *coupon_id).await?
        {
            return Err(CouponRejection::UsageLimitReached.into());
        }

        let sequence: i64 = sqlx::query_scalar("SELECT nextval('order_number_seq')")
            .fetch_one(&mut *tx)
            .await?;

        let order = sqlx::query_as::<_, Order>(&format!(
            r"
            INSERT INTO orders (
                order_number, user_id, subtotal, discount_amount, tax_amount,
                shipping_amount, total_amount, currency, shipping_address_id,
                billing_address_id, coupon_code, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order_number(ctx.now, sequence))
        .bind(ctx.user_id)
        .bind(totals.subtotal)
        .bind(totals.discount)
        .bind(totals.tax)
        .bind(totals.shipping)
        .bind(totals.total)
        .bind(ctx.currency.as_str())
        .bind(request.shipping_address_id)
        .bind(request.billing_address_id)
        .bind(applied.as_ref().map(|(_, quote)| quote.code.as_str()))
        .bind(&request.notes)
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(entries.len());
        for (entry, line) in entries.iter().zip(&lines) {
            let item = sqlx::query_as::<_, OrderItem>(&format!(
                r"
                INSERT INTO order_items (
                    order_id, product_id, variant_id, product_name, variant_name, sku,
                    quantity, unit_price, total_price
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING {ITEM_COLUMNS}
                "
            ))
            .bind(order.id)
            .bind(entry.product_id)
            .bind(entry.variant_id)
            .bind(&entry.product_name)
            .bind(&entry.variant_name)
            .bind(&entry.sku)
            .bind(entry.quantity)
            .bind(line.unit_price)
            .bind(line.line_total())
            .fetch_one(&mut *tx)
            .await?;
            items.push(item);
        }

        cart::clear(&mut tx, ctx.user_id).await?;
        tx.commit().await?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total_amount,
            "Order placed"
        );

        Ok(OrderDetail { order, items })
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// An order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_detail(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError> {
        let Some(order) = self.get(id).await? else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(OrderDetail { order, items }))
    }

    /// Orders, newest first. `user_id` restricts to one customer, `status`
    /// to one lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        user_id: Option<UserId>,
        status: Option<OrderStatus>,
        page: PageParams,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE ($1::int IS NULL OR user_id = $1)
              AND ($2::order_status IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(user_id)
        .bind(status)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM orders
            WHERE ($1::int IS NULL OR user_id = $1)
              AND ($2::order_status IS NULL OR status = $2)
            ",
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        Ok((orders, total))
    }

    /// Record the payment intent created for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn set_payment_intent(
        &self,
        id: OrderId,
        payment_intent_id: &str,
    ) -> Result<Order, RepositoryError> {
        sqlx::query_as::<_, Order>(&format!(
            r"
            UPDATE orders SET payment_intent_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(payment_intent_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Persist a planned status change if the order is still in
    /// `update.expected_status`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist and
    /// `RepositoryError::Conflict` if its status changed since the update
    /// was planned.
    #[instrument(skip(self, update), fields(from = %update.expected_status, to = %update.status))]
    pub async fn apply(&self, id: OrderId, update: &OrderUpdate) -> Result<Order, RepositoryError> {
        let updated = sqlx::query_as::<_, Order>(&format!(
            r"
            UPDATE orders SET
                status = $2,
                payment_status = $3,
                tracking_number = COALESCE($4, tracking_number),
                shipped_at = COALESCE($5, shipped_at),
                delivered_at = COALESCE($6, delivered_at),
                updated_at = NOW()
            WHERE id = $1 AND status = $7
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.status)
        .bind(update.payment_status)
        .bind(&update.tracking_number)
        .bind(update.shipped_at)
        .bind(update.delivered_at)
        .bind(update.expected_status)
        .fetch_optional(self.pool)
        .await?;

        match updated {
            Some(order) => {
                info!(order_id = %id, status = %order.status, "Order status updated");
                Ok(order)
            }
            None if self.get(id).await?.is_some() => Err(RepositoryError::Conflict(
                "order status changed concurrently".to_owned(),
            )),
            None => Err(RepositoryError::NotFound),
        }
    }
}
