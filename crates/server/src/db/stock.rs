//! Transactional stock changes.
//!
//! Products are locked in id order with `FOR UPDATE`, so concurrent commits
//! touching the same products serialize instead of deadlocking. Either every
//! line is decremented or nothing is.

use std::collections::BTreeMap;

use sqlx::{PgConnection, PgPool};
use thiserror::Error;

use best_wishes_core::{OrderSummaryKind, ProductId, StockStatus};

use super::RepositoryError;
use super::order_summaries;
use crate::models::order::LineItem;
use crate::models::order_summary::NewOrderSummary;
use crate::models::product::{InsufficientStockItem, Product, StockRequest, StockUpdate};

#[derive(Debug, Error)]
pub enum StockError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Product with ID {0} not found")]
    ProductNotFound(ProductId),

    #[error("Invalid quantity for product {0}")]
    InvalidQuantity(ProductId),

    #[error("insufficient stock for {} item(s)", .0.len())]
    Insufficient(Vec<InsufficientStockItem>),
}

impl From<sqlx::Error> for StockError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Merge requests for the same product and reject non-positive quantities.
///
/// # Errors
///
/// Returns `StockError::InvalidQuantity` for any quantity below 1, or when
/// the lines for one product add up past `i32::MAX`.
pub fn merge_requests(requests: &[StockRequest]) -> Result<BTreeMap<ProductId, i32>, StockError> {
    let mut merged: BTreeMap<ProductId, i32> = BTreeMap::new();
    for req in requests {
        if req.quantity <= 0 {
            return Err(StockError::InvalidQuantity(req.product_id));
        }
        let total = merged.entry(req.product_id).or_insert(0);
        *total = total
            .checked_add(req.quantity)
            .ok_or(StockError::InvalidQuantity(req.product_id))?;
    }
    Ok(merged)
}

/// Stock requests for purchased lines. Lines whose product was deleted are skipped.
#[must_use]
pub fn requests_for(items: &[LineItem]) -> Vec<StockRequest> {
    items
        .iter()
        .filter_map(|item| {
            item.product_id.map(|product_id| StockRequest {
                product_id,
                quantity: item.quantity,
            })
        })
        .collect()
}

/// Lines that cannot be fulfilled from the given products.
#[must_use]
pub fn shortages(
    wanted: &BTreeMap<ProductId, i32>,
    products: &BTreeMap<ProductId, Product>,
) -> Vec<InsufficientStockItem> {
    wanted
        .iter()
        .filter_map(|(id, &quantity)| {
            let product = products.get(id)?;
            (product.stock < quantity).then(|| InsufficientStockItem {
                product_id: *id,
                product_name: product.name.clone(),
                requested_quantity: quantity,
                available_stock: product.stock,
            })
        })
        .collect()
}

async fn lock_products(
    conn: &mut PgConnection,
    wanted: &BTreeMap<ProductId, i32>,
) -> Result<BTreeMap<ProductId, Product>, StockError> {
    let ids: Vec<i32> = wanted.keys().map(ProductId::as_i32).collect();
    let rows = sqlx::query_as::<_, Product>(
        r"
        SELECT id, name, sku, short_description, detailed_description, main_category,
               filters, tags, images, cost_price, retail_price, sale_price, stock,
               stock_status, tax_class, shipping_class, status, featured,
               is_customizable, customization_type, customization_price, seo_title,
               seo_description, rating, created_at, updated_at
        FROM products
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        ",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let products: BTreeMap<ProductId, Product> = rows.into_iter().map(|p| (p.id, p)).collect();
    if let Some(missing) = wanted.keys().find(|id| !products.contains_key(id)) {
        return Err(StockError::ProductNotFound(*missing));
    }
    Ok(products)
}

/// Lock, check, and decrement stock for every requested product.
///
/// Returns the updated lines together with the locked products so callers
/// can write accounting rows from the same snapshot.
///
/// # Errors
///
/// Returns `StockError::Insufficient` listing every short line when any
/// product lacks stock. Nothing is written in that case.
pub async fn decrement(
    conn: &mut PgConnection,
    requests: &[StockRequest],
) -> Result<(Vec<StockUpdate>, BTreeMap<ProductId, Product>), StockError> {
    let wanted = merge_requests(requests)?;
    let products = lock_products(conn, &wanted).await?;

    let short = shortages(&wanted, &products);
    if !short.is_empty() {
        return Err(StockError::Insufficient(short));
    }

    let mut updates = Vec::with_capacity(wanted.len());
    for (id, &quantity) in &wanted {
        let Some(product) = products.get(id) else {
            return Err(StockError::ProductNotFound(*id));
        };
        let new_stock = product.stock - quantity;
        sqlx::query(
            r"UPDATE products SET stock = $2, stock_status = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(new_stock)
        .bind(StockStatus::for_quantity(new_stock))
        .execute(&mut *conn)
        .await?;

        updates.push(StockUpdate {
            product_id: *id,
            product_name: product.name.clone(),
            old_stock: product.stock,
            new_stock,
            reduced_quantity: quantity,
        });
    }
    Ok((updates, products))
}

/// Commit stock for a packed order, gift, or collaborative purchase and
/// write one profit summary per product.
///
/// # Errors
///
/// See [`decrement`].
pub async fn commit(
    conn: &mut PgConnection,
    source_id: i32,
    kind: OrderSummaryKind,
    requests: &[StockRequest],
) -> Result<Vec<StockUpdate>, StockError> {
    let (updates, products) = decrement(conn, requests).await?;
    for update in &updates {
        let Some(product) = products.get(&update.product_id) else {
            continue;
        };
        let summary = NewOrderSummary {
            source_id,
            kind,
            product_id: product.id,
            product_sku: product.sku.clone(),
            product_name: product.name.clone(),
            quantity: update.reduced_quantity,
            cost_price: product.cost_price,
            retail_price: product.retail_price,
            sale_price: product.price(),
        };
        order_summaries::insert(&mut *conn, &summary).await?;
    }
    Ok(updates)
}

/// Decrement stock on request, outside any order flow.
///
/// # Errors
///
/// See [`decrement`].
pub async fn reduce(pool: &PgPool, requests: &[StockRequest]) -> Result<Vec<StockUpdate>, StockError> {
    let mut tx = pool.begin().await?;
    let (updates, _) = decrement(&mut *tx, requests).await?;
    tx.commit().await?;
    Ok(updates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::fixtures;

    fn req(id: i32, quantity: i32) -> StockRequest {
        StockRequest {
            product_id: ProductId::new(id),
            quantity,
        }
    }

    #[test]
    fn test_merge_requests_sums_duplicates() {
        let merged = merge_requests(&[req(2, 1), req(1, 3), req(2, 4)])
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(merged.get(&ProductId::new(2)), Some(&5));
        assert_eq!(merged.keys().next(), Some(&ProductId::new(1)));
    }

    #[test]
    fn test_merge_requests_rejects_zero() {
        assert!(matches!(
            merge_requests(&[req(1, 0)]),
            Err(StockError::InvalidQuantity(id)) if id == ProductId::new(1)
        ));
    }

    #[test]
    fn test_merge_requests_rejects_overflowing_total() {
        assert!(matches!(
            merge_requests(&[req(1, i32::MAX), req(1, 1)]),
            Err(StockError::InvalidQuantity(id)) if id == ProductId::new(1)
        ));
        assert!(merge_requests(&[req(1, i32::MAX), req(2, 1)]).is_ok());
    }

    #[test]
    fn test_shortages_lists_every_short_line() {
        let mut products = BTreeMap::new();
        let mut mug = fixtures::product(1, "Mug", "10", None);
        mug.stock = 2;
        let card = fixtures::product(2, "Card", "4", None);
        products.insert(mug.id, mug);
        products.insert(card.id, card);

        let wanted = merge_requests(&[req(1, 3), req(2, 1)]).unwrap_or_default();
        let short = shortages(&wanted, &products);
        assert_eq!(short.len(), 1);
        assert_eq!(short[0].product_name, "Mug");
        assert_eq!(short[0].requested_quantity, 3);
        assert_eq!(short[0].available_stock, 2);
    }

    #[test]
    fn test_requests_skip_deleted_products() {
        let items = vec![
            LineItem {
                id: 1,
                product_id: Some(ProductId::new(4)),
                name: "Frame".to_string(),
                price: rust_decimal::Decimal::from(9),
                quantity: 2,
                image: None,
            },
            LineItem {
                id: 2,
                product_id: None,
                name: "Retired".to_string(),
                price: rust_decimal::Decimal::from(1),
                quantity: 1,
                image: None,
            },
        ];
        let requests = requests_for(&items);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].quantity, 2);
    }
}
