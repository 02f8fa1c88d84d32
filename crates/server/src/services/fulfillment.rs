//! Status changes for orders and surprise gifts.
//!
//! A change runs in one transaction with the parent row locked. Entering
//! `Packing` commits stock and writes the profit summaries before the status
//! itself is written, so a shortage leaves the order untouched.

use sqlx::PgPool;
use thiserror::Error;

use best_wishes_core::{OrderId, OrderStatus, OrderSummaryKind, SurpriseGiftId, SurpriseGiftStatus, UserId};

use crate::db::RepositoryError;
use crate::db::line_items::{self, ItemTable};
use crate::db::orders::{self, DeliveryUpdate};
use crate::db::stock::{self, StockError};
use crate::db::surprise_gifts::{self, GiftStatusUpdate};
use crate::models::order::Order;
use crate::models::product::StockUpdate;
use crate::models::surprise_gift::SurpriseGift;

#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Stock(#[from] StockError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Cannot change status from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl From<sqlx::Error> for FulfillmentError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

fn invalid(from: impl ToString, to: impl ToString) -> FulfillmentError {
    FulfillmentError::InvalidTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
}

/// Result of a status change: the new row and any stock that was committed.
#[derive(Debug)]
pub struct StatusChange<T> {
    pub previous: String,
    pub row: T,
    pub stock: Vec<StockUpdate>,
}

/// Move an order to `next`.
///
/// # Errors
///
/// Returns `FulfillmentError::InvalidTransition` when the order may not move
/// to `next`, and `FulfillmentError::Stock` listing shortages when packing.
pub async fn set_order_status(
    pool: &PgPool,
    id: OrderId,
    next: OrderStatus,
    actor: UserId,
    update: &DeliveryUpdate,
) -> Result<StatusChange<Order>, FulfillmentError> {
    let mut tx = pool.begin().await?;
    let current = orders::lock(&mut *tx, id)
        .await?
        .ok_or(FulfillmentError::NotFound("Order"))?;
    if !current.status.can_transition_to(next) {
        return Err(invalid(current.status, next));
    }

    let mut committed = Vec::new();
    if next.commits_stock() && current.status != next {
        let items = line_items::load_one(&mut *tx, ItemTable::Order, id.as_i32()).await?;
        committed = stock::commit(
            &mut *tx,
            id.as_i32(),
            OrderSummaryKind::Order,
            &stock::requests_for(&items),
        )
        .await?;
    }

    let order = orders::apply_status(&mut *tx, id, next, actor, update).await?;
    tx.commit().await?;

    tracing::info!(
        order_id = %id,
        from = %current.status,
        to = %next,
        lines_committed = committed.len(),
        "Order status changed"
    );
    Ok(StatusChange {
        previous: current.status.to_string(),
        row: order,
        stock: committed,
    })
}

/// Move a surprise gift to `next`.
///
/// # Errors
///
/// Same as [`set_order_status`].
pub async fn set_gift_status(
    pool: &PgPool,
    id: SurpriseGiftId,
    next: SurpriseGiftStatus,
    update: &GiftStatusUpdate,
) -> Result<StatusChange<SurpriseGift>, FulfillmentError> {
    let mut tx = pool.begin().await?;
    let current = surprise_gifts::lock(&mut *tx, id)
        .await?
        .ok_or(FulfillmentError::NotFound("Surprise gift"))?;
    if !current.status.can_transition_to(next) {
        return Err(invalid(current.status, next));
    }

    let mut committed = Vec::new();
    if next.commits_stock() && current.status != next {
        let items = surprise_gifts::items(&mut *tx, id).await?;
        committed = stock::commit(
            &mut *tx,
            id.as_i32(),
            OrderSummaryKind::SurpriseGift,
            &stock::requests_for(&items),
        )
        .await?;
    }

    let gift = surprise_gifts::apply_status(&mut *tx, id, next, update).await?;
    tx.commit().await?;

    tracing::info!(
        gift_id = %id,
        from = %current.status,
        to = %next,
        lines_committed = committed.len(),
        "Surprise gift status changed"
    );
    Ok(StatusChange {
        previous: current.status.to_string(),
        row: gift,
        stock: committed,
    })
}
