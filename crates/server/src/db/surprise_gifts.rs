//! Surprise-gift repository.

use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use best_wishes_core::{SurpriseGiftId, SurpriseGiftStatus, UserId};

use super::line_items::{self, ItemTable};
use super::{Page, RepositoryError};
use crate::models::order::NewLineItem;
use crate::models::surprise_gift::{NewSurpriseGift, SurpriseGift, SurpriseGiftDetail};

const GIFT_COLUMNS: &str = r"
    id, user_id, recipient_name, recipient_phone, shipping_address, costume, suggestions,
    total, status, payment_status, payment_id, scheduled_at, packed_at, delivery_staff_id,
    delivered_at, created_at, updated_at
";

/// Status counts for the delivery dashboard.
#[derive(Debug, Clone, Default, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftDeliveryCounts {
    pub delivered_by_me: i64,
    pub out_for_delivery: i64,
    pub packing: i64,
    pub awaiting_delivery: i64,
}

/// Side effects written together with a gift status.
#[derive(Debug, Clone, Default)]
pub struct GiftStatusUpdate {
    pub payment_id: Option<String>,
    pub delivered_by: Option<UserId>,
}

pub struct SurpriseGiftRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SurpriseGiftRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        gift: &NewSurpriseGift,
        items: &[NewLineItem],
    ) -> Result<SurpriseGiftDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, SurpriseGift>(&format!(
            r"
            INSERT INTO surprise_gifts (
                user_id, recipient_name, recipient_phone, shipping_address, costume,
                suggestions, total, scheduled_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {GIFT_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(&gift.recipient_name)
        .bind(&gift.recipient_phone)
        .bind(&gift.shipping_address)
        .bind(gift.costume)
        .bind(&gift.suggestions)
        .bind(gift.total)
        .bind(gift.scheduled_at)
        .fetch_one(&mut *tx)
        .await?;
        line_items::insert(&mut *tx, ItemTable::SurpriseGift, row.id.as_i32(), items).await?;
        let items = line_items::load_one(&mut *tx, ItemTable::SurpriseGift, row.id.as_i32()).await?;
        tx.commit().await?;
        Ok(SurpriseGiftDetail { gift: row, items })
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: SurpriseGiftId) -> Result<Option<SurpriseGiftDetail>, RepositoryError> {
        let row = sqlx::query_as::<_, SurpriseGift>(&format!(
            "SELECT {GIFT_COLUMNS} FROM surprise_gifts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        match row {
            Some(gift) => Ok(self.attach(vec![gift]).await?.pop()),
            None => Ok(None),
        }
    }

    /// A user's gifts, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn for_user(&self, user_id: UserId) -> Result<Vec<SurpriseGiftDetail>, RepositoryError> {
        let rows = sqlx::query_as::<_, SurpriseGift>(&format!(
            "SELECT {GIFT_COLUMNS} FROM surprise_gifts WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        self.attach(rows).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn all(&self) -> Result<Vec<SurpriseGiftDetail>, RepositoryError> {
        let rows = sqlx::query_as::<_, SurpriseGift>(&format!(
            "SELECT {GIFT_COLUMNS} FROM surprise_gifts ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        self.attach(rows).await
    }

    /// Gifts for the delivery dashboard, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_staff(
        &self,
        status: Option<SurpriseGiftStatus>,
        page: Page,
    ) -> Result<(Vec<SurpriseGiftDetail>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            r"SELECT COUNT(*) FROM surprise_gifts WHERE ($1::surprise_gift_status IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, SurpriseGift>(&format!(
            r"
            SELECT {GIFT_COLUMNS} FROM surprise_gifts
            WHERE ($1::surprise_gift_status IS NULL OR status = $1)
            ORDER BY scheduled_at NULLS LAST, created_at DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(status)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((self.attach(rows).await?, total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delivery_counts(&self, staff: UserId) -> Result<GiftDeliveryCounts, RepositoryError> {
        let counts = sqlx::query_as::<_, GiftDeliveryCounts>(
            r"
            SELECT COUNT(*) FILTER (WHERE status = 'Delivered' AND delivery_staff_id = $1) AS delivered_by_me,
                   COUNT(*) FILTER (WHERE status = 'OutForDelivery') AS out_for_delivery,
                   COUNT(*) FILTER (WHERE status = 'Packing') AS packing,
                   COUNT(*) FILTER (WHERE status IN ('Paid', 'Packing', 'OutForDelivery')) AS awaiting_delivery
            FROM surprise_gifts
            ",
        )
        .bind(staff)
        .fetch_one(self.pool)
        .await?;
        Ok(counts)
    }

    async fn attach(&self, gifts: Vec<SurpriseGift>) -> Result<Vec<SurpriseGiftDetail>, RepositoryError> {
        let ids: Vec<i32> = gifts.iter().map(|g| g.id.as_i32()).collect();
        let mut items = line_items::load(self.pool, ItemTable::SurpriseGift, &ids).await?;
        Ok(gifts
            .into_iter()
            .map(|gift| SurpriseGiftDetail {
                items: items.remove(&gift.id.as_i32()).unwrap_or_default(),
                gift,
            })
            .collect())
    }
}

/// Lock a gift row for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(
    conn: &mut PgConnection,
    id: SurpriseGiftId,
) -> Result<Option<SurpriseGift>, RepositoryError> {
    let gift = sqlx::query_as::<_, SurpriseGift>(&format!(
        "SELECT {GIFT_COLUMNS} FROM surprise_gifts WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(gift)
}

/// Write a status and the fields that go with it.
///
/// Paid marks the payment paid, Packing stamps `packed_at`, and Delivered
/// stamps `delivered_at` once.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the gift does not exist.
pub async fn apply_status(
    conn: &mut PgConnection,
    id: SurpriseGiftId,
    status: SurpriseGiftStatus,
    update: &GiftStatusUpdate,
) -> Result<SurpriseGift, RepositoryError> {
    sqlx::query_as::<_, SurpriseGift>(&format!(
        r"
        UPDATE surprise_gifts SET
            status = $2,
            payment_status = CASE WHEN $2 = 'Paid' THEN 'paid'::payment_status ELSE payment_status END,
            payment_id = COALESCE($3, payment_id),
            packed_at = CASE WHEN $2 = 'Packing' THEN NOW() ELSE packed_at END,
            delivery_staff_id = COALESCE($4, delivery_staff_id),
            delivered_at = CASE WHEN $2 = 'Delivered' THEN COALESCE(delivered_at, NOW()) ELSE delivered_at END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {GIFT_COLUMNS}
        "
    ))
    .bind(id)
    .bind(status)
    .bind(&update.payment_id)
    .bind(update.delivered_by)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)
}

/// Load one gift's items inside a transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn items(
    conn: &mut PgConnection,
    id: SurpriseGiftId,
) -> Result<Vec<crate::models::order::LineItem>, RepositoryError> {
    line_items::load_one(&mut *conn, ItemTable::SurpriseGift, id.as_i32()).await
}
