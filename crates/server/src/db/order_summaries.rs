//! Order-summary repository.

use sqlx::{PgConnection, PgPool};

use super::RepositoryError;
use crate::models::order_summary::{NewOrderSummary, OrderSummary, SummaryFilter};

const SUMMARY_COLUMNS: &str = r"
    id, source_id, kind, product_id, product_sku, product_name, quantity, cost_price,
    retail_price, sale_price, profit, total_profit, order_date, created_at
";

pub struct OrderSummaryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderSummaryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert several summaries in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any insert fails.
    pub async fn create_many(
        &self,
        records: &[NewOrderSummary],
    ) -> Result<Vec<OrderSummary>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(records.len());
        for record in records {
            created.push(insert(&mut *tx, record).await?);
        }
        tx.commit().await?;
        Ok(created)
    }

    /// Summaries matching the filter, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &SummaryFilter) -> Result<Vec<OrderSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderSummary>(&format!(
            r"
            SELECT {SUMMARY_COLUMNS} FROM order_summaries
            WHERE ($1::int4 IS NULL OR source_id = $1)
              AND ($2::int4 IS NULL OR product_id = $2)
              AND ($3::timestamptz IS NULL OR order_date >= $3)
              AND ($4::timestamptz IS NULL OR order_date <= $4)
            ORDER BY order_date DESC, id DESC
            "
        ))
        .bind(filter.source_id)
        .bind(filter.product_id)
        .bind(filter.start)
        .bind(filter.end)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

/// Insert one summary, computing profit from the prices.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert(
    conn: &mut PgConnection,
    record: &NewOrderSummary,
) -> Result<OrderSummary, RepositoryError> {
    let row = sqlx::query_as::<_, OrderSummary>(&format!(
        r"
        INSERT INTO order_summaries (
            source_id, kind, product_id, product_sku, product_name, quantity,
            cost_price, retail_price, sale_price, profit, total_profit
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {SUMMARY_COLUMNS}
        "
    ))
    .bind(record.source_id)
    .bind(record.kind)
    .bind(record.product_id)
    .bind(&record.product_sku)
    .bind(&record.product_name)
    .bind(record.quantity)
    .bind(record.cost_price)
    .bind(record.retail_price)
    .bind(record.sale_price)
    .bind(record.profit())
    .bind(record.total_profit())
    .fetch_one(&mut *conn)
    .await?;
    Ok(row)
}
