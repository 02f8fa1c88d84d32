//! Order repository.
//!
//! Status changes always append to `order_status_history` in the same
//! transaction as the update.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use best_wishes_core::{OrderId, OrderStatus, ProductId, UserId};

use super::line_items::{self, ItemTable};
use super::{Page, RepositoryError};
use crate::models::order::{
    NewLineItem, Order, OrderCustomer, OrderDetail, StaffOrderRow, StatusHistoryEntry,
};

const ORDER_COLUMNS: &str = r"
    o.id, o.user_id, o.total, o.status, o.ordered_at, o.updated_by, o.delivery_notes,
    o.tracking_number, o.delivery_staff_id, o.delivered_at, o.created_at, o.updated_at
";

const CUSTOMER_COLUMNS: &str = r"
    (u.first_name || ' ' || u.last_name) AS customer_name, u.email AS customer_email,
    u.phone AS customer_phone, u.address AS customer_address
";

/// Filters for the delivery order listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaffOrderFilter {
    pub status: Option<OrderStatus>,
    pub delivery_staff: Option<UserId>,
}

/// Counts over the orders a staff member has handled.
#[derive(Debug, Clone, Default, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffOrderCounts {
    pub total: i64,
    pub pending: i64,
    pub in_transit: i64,
    pub delivered: i64,
    pub cancelled: i64,
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    order_id: OrderId,
    #[sqlx(flatten)]
    entry: StatusHistoryEntry,
}

/// Delivery fields written alongside a status change.
#[derive(Debug, Clone, Default)]
pub struct DeliveryUpdate {
    pub notes: Option<String>,
    /// Recorded as the delivering staff member. `delivered_at` is stamped by
    /// the move to `Delivered` whether or not this is set.
    pub delivered_by: Option<UserId>,
}

pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create an order with its items and a first history entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        items: &[NewLineItem],
        total: rust_decimal::Decimal,
    ) -> Result<OrderDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let order = insert_order(&mut *tx, user_id, items, total, OrderStatus::Processing).await?;
        tx.commit().await?;
        self.detail(order.id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(order)
    }

    /// An order with items, history and customer contact.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn detail(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError> {
        let row = sqlx::query_as::<_, StaffOrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}, {CUSTOMER_COLUMNS}
            FROM orders o JOIN users u ON u.id = o.user_id
            WHERE o.id = $1
            "
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut details = self.attach(vec![row.order]).await?;
        Ok(details
            .pop()
            .map(|detail| detail.with_customer(row.customer)))
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn history(&self, user_id: UserId) -> Result<Vec<OrderDetail>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.user_id = $1 ORDER BY o.ordered_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        self.attach(orders).await
    }

    /// Every order with customer contact, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn all(&self) -> Result<Vec<OrderDetail>, RepositoryError> {
        let rows = sqlx::query_as::<_, StaffOrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}, {CUSTOMER_COLUMNS}
            FROM orders o JOIN users u ON u.id = o.user_id
            ORDER BY o.ordered_at DESC
            "
        ))
        .fetch_all(self.pool)
        .await?;
        self.attach_customers(rows).await
    }

    /// Set a status outside of the stock-commit path.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn set_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        updated_by: UserId,
        update: &DeliveryUpdate,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let order = apply_status(&mut *tx, id, status, updated_by, update).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Orders for the delivery dashboard with customer contact.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_staff(
        &self,
        filter: StaffOrderFilter,
        page: Page,
    ) -> Result<(Vec<StaffOrderRow>, i64), RepositoryError> {
        const FILTER: &str = r"
            WHERE ($1::order_status IS NULL OR o.status = $1)
              AND ($2::int4 IS NULL OR o.delivery_staff_id = $2)
        ";

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM orders o {FILTER}"))
                .bind(filter.status)
                .bind(filter.delivery_staff)
                .fetch_one(self.pool)
                .await?;

        let rows = sqlx::query_as::<_, StaffOrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}, {CUSTOMER_COLUMNS}
            FROM orders o JOIN users u ON u.id = o.user_id
            {FILTER}
            ORDER BY o.ordered_at DESC
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(filter.status)
        .bind(filter.delivery_staff)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows, total))
    }

    /// Match by order id, customer name, or customer email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search_for_staff(&self, q: &str) -> Result<Vec<StaffOrderRow>, RepositoryError> {
        let pattern = format!("%{}%", super::products::escape_like(q.trim()));
        let id: Option<i32> = q.trim().trim_start_matches('#').parse().ok();
        let rows = sqlx::query_as::<_, StaffOrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}, {CUSTOMER_COLUMNS}
            FROM orders o JOIN users u ON u.id = o.user_id
            WHERE o.id = $1
               OR (u.first_name || ' ' || u.last_name) ILIKE $2
               OR u.email ILIKE $2
            ORDER BY o.ordered_at DESC
            LIMIT 50
            "
        ))
        .bind(id)
        .bind(pattern)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Status counts over orders last updated by `staff`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn staff_counts(&self, staff: UserId) -> Result<StaffOrderCounts, RepositoryError> {
        let counts = sqlx::query_as::<_, StaffOrderCounts>(
            r"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status = 'Pending') AS pending,
                   COUNT(*) FILTER (WHERE status = 'Shipped') AS in_transit,
                   COUNT(*) FILTER (WHERE status = 'Delivered') AS delivered,
                   COUNT(*) FILTER (WHERE status = 'Cancelled') AS cancelled
            FROM orders
            WHERE updated_by = $1
            ",
        )
        .bind(staff)
        .fetch_one(self.pool)
        .await?;
        Ok(counts)
    }

    /// The five orders `staff` touched most recently.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn staff_recent(&self, staff: UserId) -> Result<Vec<StaffOrderRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, StaffOrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}, {CUSTOMER_COLUMNS}
            FROM orders o JOIN users u ON u.id = o.user_id
            WHERE o.updated_by = $1
            ORDER BY o.updated_at DESC
            LIMIT 5
            "
        ))
        .bind(staff)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// The caller's order if it may be reviewed, i.e. it has been confirmed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn reviewable(
        &self,
        id: OrderId,
        user_id: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders o
            WHERE o.id = $1 AND o.user_id = $2
              AND o.status IN ('Processing', 'Packing', 'Shipped', 'Delivered')
            "
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(order)
    }

    /// Whether the order has a line for this product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn contains_product(
        &self,
        id: OrderId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let found: bool = sqlx::query_scalar(
            r"SELECT EXISTS (SELECT 1 FROM order_items WHERE order_id = $1 AND product_id = $2)",
        )
        .bind(id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;
        Ok(found)
    }

    async fn attach(&self, orders: Vec<Order>) -> Result<Vec<OrderDetail>, RepositoryError> {
        let ids: Vec<i32> = orders.iter().map(|o| o.id.as_i32()).collect();
        let mut items = line_items::load(self.pool, ItemTable::Order, &ids).await?;
        let mut history = self.load_history(&ids).await?;
        Ok(orders
            .into_iter()
            .map(|order| {
                let id = order.id.as_i32();
                OrderDetail::new(
                    order,
                    items.remove(&id).unwrap_or_default(),
                    history.remove(&id).unwrap_or_default(),
                )
            })
            .collect())
    }

    async fn attach_customers(
        &self,
        rows: Vec<StaffOrderRow>,
    ) -> Result<Vec<OrderDetail>, RepositoryError> {
        let (orders, customers): (Vec<Order>, Vec<OrderCustomer>) =
            rows.into_iter().map(|r| (r.order, r.customer)).unzip();
        let details = self.attach(orders).await?;
        Ok(details
            .into_iter()
            .zip(customers)
            .map(|(detail, customer)| detail.with_customer(customer))
            .collect())
    }

    async fn load_history(
        &self,
        ids: &[i32],
    ) -> Result<HashMap<i32, Vec<StatusHistoryEntry>>, RepositoryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, HistoryRow>(
            r"
            SELECT order_id, status, updated_by, notes, updated_at
            FROM order_status_history
            WHERE order_id = ANY($1)
            ORDER BY updated_at, id
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        let mut grouped: HashMap<i32, Vec<StatusHistoryEntry>> = HashMap::new();
        for row in rows {
            grouped
                .entry(row.order_id.as_i32())
                .or_default()
                .push(row.entry);
        }
        Ok(grouped)
    }
}

/// Insert an order, its items, and the initial history entry.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if any insert fails.
pub async fn insert_order(
    conn: &mut PgConnection,
    user_id: UserId,
    items: &[NewLineItem],
    total: rust_decimal::Decimal,
    status: OrderStatus,
) -> Result<Order, RepositoryError> {
    let order = sqlx::query_as::<_, Order>(&format!(
        r"
        INSERT INTO orders AS o (user_id, total, status)
        VALUES ($1, $2, $3)
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(user_id)
    .bind(total)
    .bind(status)
    .fetch_one(&mut *conn)
    .await?;

    line_items::insert(&mut *conn, ItemTable::Order, order.id.as_i32(), items).await?;

    sqlx::query(
        r"INSERT INTO order_status_history (order_id, status, updated_by, notes) VALUES ($1, $2, $3, $4)",
    )
    .bind(order.id)
    .bind(status)
    .bind(user_id)
    .bind("Order placed")
    .execute(&mut *conn)
    .await?;

    Ok(order)
}

/// Lock an order row for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>, RepositoryError> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(order)
}

/// Write a status, its delivery fields, and a history entry.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order does not exist.
pub async fn apply_status(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
    updated_by: UserId,
    update: &DeliveryUpdate,
) -> Result<Order, RepositoryError> {
    let order = sqlx::query_as::<_, Order>(&format!(
        r"
        UPDATE orders AS o SET
            status = $2,
            updated_by = $3,
            delivery_notes = COALESCE($4, o.delivery_notes),
            delivery_staff_id = COALESCE($5, o.delivery_staff_id),
            delivered_at = CASE WHEN $2 = 'Delivered' THEN COALESCE(o.delivered_at, NOW()) ELSE o.delivered_at END,
            updated_at = NOW()
        WHERE o.id = $1
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(id)
    .bind(status)
    .bind(updated_by)
    .bind(&update.notes)
    .bind(update.delivered_by)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    sqlx::query(
        r"INSERT INTO order_status_history (order_id, status, updated_by, notes) VALUES ($1, $2, $3, $4)",
    )
    .bind(id)
    .bind(status)
    .bind(updated_by)
    .bind(&update.notes)
    .execute(&mut *conn)
    .await?;

    Ok(order)
}
