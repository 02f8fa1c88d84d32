//! Item rows shared by orders, surprise gifts, and collaborative purchases.
//!
//! The three item tables have identical columns and differ only in the name
//! of the parent key.

use std::collections::HashMap;

use sqlx::{PgConnection, PgExecutor};

use super::RepositoryError;
use crate::models::order::{LineItem, NewLineItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemTable {
    Order,
    SurpriseGift,
    Collaborative,
}

impl ItemTable {
    const fn table(self) -> &'static str {
        match self {
            Self::Order => "order_items",
            Self::SurpriseGift => "surprise_gift_items",
            Self::Collaborative => "collaborative_purchase_items",
        }
    }

    const fn parent_column(self) -> &'static str {
        match self {
            Self::Order => "order_id",
            Self::SurpriseGift => "gift_id",
            Self::Collaborative => "purchase_id",
        }
    }
}

#[derive(sqlx::FromRow)]
struct ParentedItem {
    parent_id: i32,
    #[sqlx(flatten)]
    item: LineItem,
}

/// Insert items under one parent row.
///
/// # Errors
///
/// Returns `RepositoryError::MissingReference` when an item names an unknown
/// product and `RepositoryError::Database` if an insert fails otherwise.
pub async fn insert(
    conn: &mut PgConnection,
    table: ItemTable,
    parent_id: i32,
    items: &[NewLineItem],
) -> Result<(), RepositoryError> {
    let sql = format!(
        "INSERT INTO {} ({}, product_id, name, price, quantity, image) VALUES ($1, $2, $3, $4, $5, $6)",
        table.table(),
        table.parent_column()
    );
    for item in items {
        sqlx::query(&sql)
            .bind(parent_id)
            .bind(item.product_id)
            .bind(&item.name)
            .bind(item.price)
            .bind(item.quantity)
            .bind(&item.image)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                RepositoryError::foreign_key(e, || format!("Product with ID {} not found", item.product_id))
            })?;
    }
    Ok(())
}

/// Load items for several parents, grouped by parent id.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn load(
    executor: impl PgExecutor<'_>,
    table: ItemTable,
    parent_ids: &[i32],
) -> Result<HashMap<i32, Vec<LineItem>>, RepositoryError> {
    if parent_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query_as::<_, ParentedItem>(&format!(
        r"
        SELECT {parent} AS parent_id, id, product_id, name, price, quantity, image
        FROM {table}
        WHERE {parent} = ANY($1)
        ORDER BY id
        ",
        parent = table.parent_column(),
        table = table.table(),
    ))
    .bind(parent_ids)
    .fetch_all(executor)
    .await?;

    let mut grouped: HashMap<i32, Vec<LineItem>> = HashMap::new();
    for row in rows {
        grouped.entry(row.parent_id).or_default().push(row.item);
    }
    Ok(grouped)
}

/// Load items for a single parent.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn load_one(
    executor: impl PgExecutor<'_>,
    table: ItemTable,
    parent_id: i32,
) -> Result<Vec<LineItem>, RepositoryError> {
    let mut grouped = load(executor, table, &[parent_id]).await?;
    Ok(grouped.remove(&parent_id).unwrap_or_default())
}
