//! Back-office summary figures.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use super::RepositoryError;
use super::orders::Order;
use super::products::{Product, ProductRepository};
use crate::api::PageParams;
use crate::db::OrderRepository;

/// Headline counts for the dashboard.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DashboardCounts {
    pub total_orders: i64,
    pub pending_orders: i64,
    pub processing_orders: i64,
    /// Sum of `total_amount` over paid, non-refunded orders.
    pub total_revenue: Decimal,
    pub total_customers: i64,
    pub total_products: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    #[serde(flatten)]
    pub counts: DashboardCounts,
    pub low_stock_products: Vec<Product>,
    pub recent_orders: Vec<Order>,
}

pub struct DashboardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn stats(&self) -> Result<DashboardStats, RepositoryError> {
        let counts = sqlx::query_as::<_, DashboardCounts>(
            r"
            SELECT
                (SELECT COUNT(*) FROM orders) AS total_orders,
                (SELECT COUNT(*) FROM orders WHERE status = 'pending') AS pending_orders,
                (SELECT COUNT(*) FROM orders WHERE status = 'processing') AS processing_orders,
                (SELECT COALESCE(SUM(total_amount), 0) FROM orders WHERE payment_status = 'paid')
                    AS total_revenue,
                (SELECT COUNT(*) FROM users WHERE role = 'customer') AS total_customers,
                (SELECT COUNT(*) FROM products) AS total_products
            ",
        )
        .fetch_one(self.pool)
        .await?;

        let low_stock_products = ProductRepository::new(self.pool).low_stock(10).await?;

        let recent = PageParams {
            page: Some(1),
            limit: Some(5),
        };
        let (recent_orders, _) = OrderRepository::new(self.pool)
            .list(None, None, recent)
            .await?;

        Ok(DashboardStats {
            counts,
            low_stock_products,
            recent_orders,
        })
    }
}
