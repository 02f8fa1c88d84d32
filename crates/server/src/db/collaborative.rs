//! Collaborative-purchase repository.
//!
//! Payment, decline, and cancel flows lock the purchase row first, so
//! concurrent participants are processed one at a time.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor, PgPool};

use best_wishes_core::{
    CollaborativePurchaseId, CollaborativeStatus, OrderId, ParticipantId, UserId,
};

use super::RepositoryError;
use super::line_items::{self, ItemTable};
use crate::models::collaborative::{
    CollaborativeDetail, CollaborativePurchase, Participant, PurchaseWithCreator,
};
use crate::models::order::NewLineItem;

const PURCHASE_COLUMNS: &str = r"
    c.id, c.created_by, c.total_amount, c.share_amount, c.status, c.deadline,
    c.completed_at, c.cancelled_at, c.order_id, c.scheduled_at, c.created_at, c.updated_at
";

const PARTICIPANT_COLUMNS: &str = r"
    id, purchase_id, email, payment_status, payment_link, paid_at, payment_intent_id, refund_id
";

/// Everything needed to open a purchase.
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub created_by: UserId,
    pub items: Vec<NewLineItem>,
    pub total_amount: Decimal,
    pub share_amount: Decimal,
    pub deadline: DateTime<Utc>,
    /// `(email, payment_link)` pairs.
    pub participants: Vec<(String, String)>,
}

pub struct CollaborativeRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CollaborativeRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a payment link collides.
    pub async fn create(&self, new: &NewPurchase) -> Result<CollaborativeDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let id: CollaborativePurchaseId = sqlx::query_scalar(
            r"
            INSERT INTO collaborative_purchases (created_by, total_amount, share_amount, deadline)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(new.created_by)
        .bind(new.total_amount)
        .bind(new.share_amount)
        .bind(new.deadline)
        .fetch_one(&mut *tx)
        .await?;

        line_items::insert(&mut *tx, ItemTable::Collaborative, id.as_i32(), &new.items).await?;

        for (email, link) in &new.participants {
            sqlx::query(
                r"
                INSERT INTO collaborative_participants (purchase_id, email, payment_link)
                VALUES ($1, $2, $3)
                ",
            )
            .bind(id)
            .bind(email)
            .bind(link)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::unique(e, "duplicate participant"))?;
        }

        let detail = load_detail(&mut *tx, id).await?.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(detail)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(
        &self,
        id: CollaborativePurchaseId,
    ) -> Result<Option<CollaborativeDetail>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_detail(&mut conn, id).await
    }

    /// Find the participant holding a payment link.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn participant_by_link(
        &self,
        link: &str,
    ) -> Result<Option<Participant>, RepositoryError> {
        let participant = sqlx::query_as::<_, Participant>(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM collaborative_participants WHERE payment_link = $1"
        ))
        .bind(link)
        .fetch_optional(self.pool)
        .await?;
        Ok(participant)
    }

    /// Purchases the user created or was invited to, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn for_user(
        &self,
        user_id: UserId,
        email: &str,
    ) -> Result<Vec<CollaborativeDetail>, RepositoryError> {
        let rows = sqlx::query_as::<_, PurchaseWithCreator>(&format!(
            r"
            SELECT {PURCHASE_COLUMNS},
                   (u.first_name || ' ' || u.last_name) AS creator_name, u.email AS creator_email
            FROM collaborative_purchases c JOIN users u ON u.id = c.created_by
            WHERE c.created_by = $1
               OR EXISTS (SELECT 1 FROM collaborative_participants p
                          WHERE p.purchase_id = c.id AND p.email = $2)
            ORDER BY c.created_at DESC
            "
        ))
        .bind(user_id)
        .bind(email)
        .fetch_all(self.pool)
        .await?;
        self.attach(rows).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn all(&self) -> Result<Vec<CollaborativeDetail>, RepositoryError> {
        let rows = sqlx::query_as::<_, PurchaseWithCreator>(&format!(
            r"
            SELECT {PURCHASE_COLUMNS},
                   (u.first_name || ' ' || u.last_name) AS creator_name, u.email AS creator_email
            FROM collaborative_purchases c JOIN users u ON u.id = c.created_by
            ORDER BY c.created_at DESC
            "
        ))
        .fetch_all(self.pool)
        .await?;
        self.attach(rows).await
    }

    /// Delivered purchases completed within a date range.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn delivered_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CollaborativeDetail>, RepositoryError> {
        let rows = sqlx::query_as::<_, PurchaseWithCreator>(&format!(
            r"
            SELECT {PURCHASE_COLUMNS},
                   (u.first_name || ' ' || u.last_name) AS creator_name, u.email AS creator_email
            FROM collaborative_purchases c JOIN users u ON u.id = c.created_by
            WHERE c.status = 'delivered'
              AND COALESCE(c.completed_at, c.updated_at) BETWEEN $1 AND $2
            ORDER BY COALESCE(c.completed_at, c.updated_at) DESC
            "
        ))
        .bind(from)
        .bind(to)
        .fetch_all(self.pool)
        .await?;
        self.attach(rows).await
    }

    async fn attach(
        &self,
        rows: Vec<PurchaseWithCreator>,
    ) -> Result<Vec<CollaborativeDetail>, RepositoryError> {
        let ids: Vec<i32> = rows.iter().map(|r| r.purchase.id.as_i32()).collect();
        let mut items = line_items::load(self.pool, ItemTable::Collaborative, &ids).await?;
        let mut participants = load_participants(self.pool, &ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let id = row.purchase.id.as_i32();
                CollaborativeDetail {
                    purchase: row.purchase,
                    items: items.remove(&id).unwrap_or_default(),
                    participants: participants.remove(&id).unwrap_or_default(),
                    creator_name: row.creator_name,
                    creator_email: row.creator_email,
                }
            })
            .collect())
    }
}

async fn load_participants(
    executor: impl PgExecutor<'_>,
    ids: &[i32],
) -> Result<HashMap<i32, Vec<Participant>>, RepositoryError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query_as::<_, Participant>(&format!(
        "SELECT {PARTICIPANT_COLUMNS} FROM collaborative_participants WHERE purchase_id = ANY($1) ORDER BY id"
    ))
    .bind(ids)
    .fetch_all(executor)
    .await?;

    let mut grouped: HashMap<i32, Vec<Participant>> = HashMap::new();
    for row in rows {
        grouped.entry(row.purchase_id.as_i32()).or_default().push(row);
    }
    Ok(grouped)
}

/// Load a purchase with items, participants, and creator on one connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn load_detail(
    conn: &mut PgConnection,
    id: CollaborativePurchaseId,
) -> Result<Option<CollaborativeDetail>, RepositoryError> {
    let row = sqlx::query_as::<_, PurchaseWithCreator>(&format!(
        r"
        SELECT {PURCHASE_COLUMNS},
               (u.first_name || ' ' || u.last_name) AS creator_name, u.email AS creator_email
        FROM collaborative_purchases c JOIN users u ON u.id = c.created_by
        WHERE c.id = $1
        "
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let items = line_items::load_one(&mut *conn, ItemTable::Collaborative, id.as_i32()).await?;
    let participants = load_participants(&mut *conn, &[id.as_i32()])
        .await?
        .remove(&id.as_i32())
        .unwrap_or_default();

    Ok(Some(CollaborativeDetail {
        purchase: row.purchase,
        items,
        participants,
        creator_name: row.creator_name,
        creator_email: row.creator_email,
    }))
}

/// Lock a purchase row for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(
    conn: &mut PgConnection,
    id: CollaborativePurchaseId,
) -> Result<Option<CollaborativePurchase>, RepositoryError> {
    let purchase = sqlx::query_as::<_, CollaborativePurchase>(&format!(
        "SELECT {PURCHASE_COLUMNS} FROM collaborative_purchases c WHERE c.id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(purchase)
}

/// Set a purchase status, stamping completion or cancellation times.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the purchase does not exist.
pub async fn set_status(
    conn: &mut PgConnection,
    id: CollaborativePurchaseId,
    status: CollaborativeStatus,
    order_id: Option<OrderId>,
) -> Result<CollaborativePurchase, RepositoryError> {
    sqlx::query_as::<_, CollaborativePurchase>(&format!(
        r"
        UPDATE collaborative_purchases AS c SET
            status = $2,
            completed_at = CASE WHEN $2 IN ('completed', 'delivered') THEN NOW() ELSE c.completed_at END,
            cancelled_at = CASE WHEN $2 IN ('cancelled', 'refunded') THEN NOW() ELSE c.cancelled_at END,
            order_id = COALESCE($3, c.order_id),
            updated_at = NOW()
        WHERE c.id = $1
        RETURNING {PURCHASE_COLUMNS}
        "
    ))
    .bind(id)
    .bind(status)
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)
}

/// Record when delivery of the purchase is planned.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the purchase does not exist.
pub async fn set_scheduled_at(
    conn: &mut PgConnection,
    id: CollaborativePurchaseId,
    at: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE collaborative_purchases SET scheduled_at = $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(at)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Mark one participant paid.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn mark_paid(
    conn: &mut PgConnection,
    participant: ParticipantId,
    payment_intent_id: Option<&str>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE collaborative_participants
        SET payment_status = 'paid', paid_at = NOW(), payment_intent_id = $2
        WHERE id = $1
        ",
    )
    .bind(participant)
    .bind(payment_intent_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Mark one participant declined.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn mark_declined(
    conn: &mut PgConnection,
    participant: ParticipantId,
) -> Result<(), RepositoryError> {
    sqlx::query(r"UPDATE collaborative_participants SET payment_status = 'declined' WHERE id = $1")
        .bind(participant)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Record a refund against a paid participant.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn mark_refunded(
    conn: &mut PgConnection,
    participant: ParticipantId,
    refund_id: &str,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"UPDATE collaborative_participants SET payment_status = 'refunded', refund_id = $2 WHERE id = $1",
    )
    .bind(participant)
    .bind(refund_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
