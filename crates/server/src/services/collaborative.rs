//! Collaborative purchases: several people split one order.
//!
//! Every state change locks the purchase row first. The last payment turns
//! the purchase into a regular order inside the same transaction.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rand::{Rng, RngCore, distr::Alphanumeric};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;

use best_wishes_core::{
    CollaborativePurchaseId, CollaborativeStatus, OrderId, OrderStatus, OrderSummaryKind,
    ParticipantId, ParticipantPaymentStatus, ProductId, SHIPPING_FEE, UserId, round_money,
    split_share,
};

use crate::db::RepositoryError;
use crate::db::collaborative::{self as repo, CollaborativeRepository, NewPurchase};
use crate::db::orders;
use crate::db::products::ProductRepository;
use crate::db::stock::{self, StockError};
use crate::models::collaborative::{CollaborativeDetail, Participant};
use crate::models::order::{LineItem, NewLineItem};
use crate::models::product::{StockRequest, StockUpdate};

/// Days participants have to pay.
pub const DEADLINE_DAYS: i64 = 3;

/// Most invited participants per purchase.
pub const MAX_PARTICIPANTS: usize = 3;

#[derive(Debug, Error)]
pub enum CollaborativeError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Stock(#[from] StockError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Invalid(String),
}

impl From<sqlx::Error> for CollaborativeError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// 32 random bytes, hex encoded.
#[must_use]
pub fn generate_payment_link() -> String {
    let mut bytes = [0_u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// `refund_<unix-ms>_<8 alphanumerics>`.
#[must_use]
pub fn generate_refund_id(now: DateTime<Utc>) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("refund_{}_{suffix}", now.timestamp_millis())
}

/// Normalize invited emails: 1 to 3 distinct, lowercased addresses that are
/// not the creator's own.
///
/// # Errors
///
/// Returns a user-facing message describing the first problem found.
pub fn validate_participants(emails: &[String], creator_email: &str) -> Result<Vec<String>, String> {
    if emails.is_empty() || emails.len() > MAX_PARTICIPANTS {
        return Err(format!("Between 1 and {MAX_PARTICIPANTS} participants are required"));
    }
    let creator = creator_email.trim().to_lowercase();
    let mut out: Vec<String> = Vec::with_capacity(emails.len());
    for raw in emails {
        let email = raw.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(format!("Invalid participant email: {raw}"));
        }
        if email == creator {
            return Err("You cannot invite yourself as a participant".to_string());
        }
        if out.contains(&email) {
            return Err("Participant emails must be unique".to_string());
        }
        out.push(email);
    }
    Ok(out)
}

/// Line items of a purchase as lines of a new order. Lines whose product
/// was deleted are dropped.
#[must_use]
pub fn order_lines(items: &[LineItem]) -> Vec<NewLineItem> {
    items
        .iter()
        .filter_map(|item| {
            item.product_id.map(|product_id| NewLineItem {
                product_id,
                name: item.name.clone(),
                price: item.price,
                quantity: item.quantity,
                image: item.image.clone(),
            })
        })
        .collect()
}

/// Per-product totals for a new purchase.
///
/// # Errors
///
/// Returns `CollaborativeError::Invalid` for an empty list, a quantity below 1,
/// or totals that overflow.
pub fn wanted_quantities(requests: &[StockRequest]) -> Result<BTreeMap<ProductId, i32>, CollaborativeError> {
    if requests.is_empty() {
        return Err(CollaborativeError::Invalid("At least one product is required".to_string()));
    }
    stock::merge_requests(requests).map_err(|e| CollaborativeError::Invalid(e.to_string()))
}

/// Result of a participant paying.
#[derive(Debug)]
pub struct PaymentOutcome {
    pub detail: CollaborativeDetail,
    pub participant: Participant,
    /// Set when this payment was the last one and the order was created.
    pub order_id: Option<OrderId>,
}

pub struct CollaborativeService<'a> {
    pool: &'a PgPool,
}

impl<'a> CollaborativeService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Price the requested products and open the purchase.
    ///
    /// # Errors
    ///
    /// Returns `CollaborativeError::NotFound` for an unknown product and
    /// `CollaborativeError::Invalid` for a bad quantity.
    pub async fn create(
        &self,
        creator: UserId,
        requests: &[StockRequest],
        participants: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<CollaborativeDetail, CollaborativeError> {
        let wanted = wanted_quantities(requests)?;

        let ids: Vec<ProductId> = wanted.keys().copied().collect();
        let products = ProductRepository::new(self.pool).get_many(&ids).await?;
        let mut items = Vec::with_capacity(wanted.len());
        let mut subtotal = Decimal::ZERO;
        for (id, quantity) in wanted {
            let product = products
                .iter()
                .find(|p| p.id == id)
                .ok_or_else(|| CollaborativeError::NotFound(format!("Product with ID {id} not found")))?;
            let price = product.price();
            subtotal += price * Decimal::from(quantity);
            items.push(NewLineItem {
                product_id: id,
                name: product.name.clone(),
                price,
                quantity,
                image: product.thumbnail(),
            });
        }

        let total_amount = round_money(subtotal + SHIPPING_FEE);
        let new = NewPurchase {
            created_by: creator,
            share_amount: split_share(total_amount, participants.len()),
            total_amount,
            items,
            deadline: now + Duration::days(DEADLINE_DAYS),
            participants: participants
                .into_iter()
                .map(|email| (email, generate_payment_link()))
                .collect(),
        };
        Ok(CollaborativeRepository::new(self.pool).create(&new).await?)
    }

    /// Record a participant's payment. The last payment creates the order.
    ///
    /// # Errors
    ///
    /// Returns `CollaborativeError::Invalid` when the share is already paid,
    /// the purchase is no longer active, or the deadline has passed. An
    /// expired purchase is marked expired before the error is returned.
    pub async fn pay(
        &self,
        link: &str,
        payment_intent_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PaymentOutcome, CollaborativeError> {
        let (purchase_id, participant_id) = self.resolve_link(link).await?;

        let mut tx = self.pool.begin().await?;
        let purchase = repo::lock(&mut *tx, purchase_id)
            .await?
            .ok_or_else(|| CollaborativeError::NotFound("Collaborative purchase not found".to_string()))?;
        let detail = repo::load_detail(&mut *tx, purchase_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        let participant = find_participant(&detail, participant_id)?;

        if participant.payment_status == ParticipantPaymentStatus::Paid {
            return Err(CollaborativeError::Invalid("Payment already completed".to_string()));
        }
        if !purchase.status.is_active() {
            return Err(CollaborativeError::Invalid(
                "This collaborative purchase is no longer active".to_string(),
            ));
        }
        if purchase.is_past_deadline(now) {
            repo::set_status(&mut *tx, purchase_id, CollaborativeStatus::Expired, None).await?;
            tx.commit().await?;
            return Err(CollaborativeError::Invalid(
                "This collaborative purchase has expired".to_string(),
            ));
        }

        repo::mark_paid(&mut *tx, participant_id, payment_intent_id).await?;
        let mut detail = repo::load_detail(&mut *tx, purchase_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let mut order_id = None;
        if detail.all_paid() && detail.purchase.status == CollaborativeStatus::Pending {
            let lines = order_lines(&detail.items);
            let order = orders::insert_order(
                &mut *tx,
                detail.purchase.created_by,
                &lines,
                detail.purchase.total_amount,
                OrderStatus::Processing,
            )
            .await?;
            detail.purchase =
                repo::set_status(&mut *tx, purchase_id, CollaborativeStatus::Completed, Some(order.id))
                    .await?;
            order_id = Some(order.id);
        }
        tx.commit().await?;

        let participant = find_participant(&detail, participant_id)?;
        tracing::info!(
            purchase_id = %purchase_id,
            participant = %participant.email,
            completed = order_id.is_some(),
            "Collaborative share paid"
        );
        Ok(PaymentOutcome {
            detail,
            participant,
            order_id,
        })
    }

    /// A participant declines, which cancels the whole purchase. Shares
    /// already paid by others are refunded.
    ///
    /// # Errors
    ///
    /// Returns `CollaborativeError::Invalid` if the purchase is no longer active
    /// or the participant has already paid.
    pub async fn decline(
        &self,
        link: &str,
        now: DateTime<Utc>,
    ) -> Result<CollaborativeDetail, CollaborativeError> {
        let (purchase_id, participant_id) = self.resolve_link(link).await?;

        let mut tx = self.pool.begin().await?;
        let purchase = repo::lock(&mut *tx, purchase_id)
            .await?
            .ok_or_else(|| CollaborativeError::NotFound("Collaborative purchase not found".to_string()))?;
        if !purchase.status.is_active() {
            return Err(CollaborativeError::Invalid(
                "This collaborative purchase is no longer active".to_string(),
            ));
        }
        let detail = repo::load_detail(&mut *tx, purchase_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        if find_participant(&detail, participant_id)?.payment_status == ParticipantPaymentStatus::Paid {
            return Err(CollaborativeError::Invalid(
                "You have already paid your share and cannot decline".to_string(),
            ));
        }

        repo::mark_declined(&mut *tx, participant_id).await?;
        let refunded = close_with_refunds(&mut *tx, &detail, now).await?;
        let detail = repo::load_detail(&mut *tx, purchase_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;

        tracing::info!(purchase_id = %purchase_id, refunded, "Collaborative purchase declined");
        Ok(detail)
    }

    /// The creator cancels. Paid shares are refunded.
    ///
    /// # Errors
    ///
    /// Returns `CollaborativeError::Forbidden` for anyone but the creator and
    /// `CollaborativeError::Invalid` if the purchase is no longer active.
    pub async fn cancel(
        &self,
        id: CollaborativePurchaseId,
        caller: UserId,
        now: DateTime<Utc>,
    ) -> Result<CollaborativeDetail, CollaborativeError> {
        let mut tx = self.pool.begin().await?;
        let purchase = repo::lock(&mut *tx, id)
            .await?
            .ok_or_else(|| CollaborativeError::NotFound("Collaborative purchase not found".to_string()))?;
        if purchase.created_by != caller {
            return Err(CollaborativeError::Forbidden(
                "Only the creator can cancel this purchase".to_string(),
            ));
        }
        if !purchase.status.is_active() {
            return Err(CollaborativeError::Invalid(
                "This collaborative purchase is no longer active".to_string(),
            ));
        }

        let detail = repo::load_detail(&mut *tx, id).await?.ok_or(RepositoryError::NotFound)?;
        let refunded = close_with_refunds(&mut *tx, &detail, now).await?;
        let detail = repo::load_detail(&mut *tx, id).await?.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;

        tracing::info!(purchase_id = %id, refunded, "Collaborative purchase cancelled");
        Ok(detail)
    }

    /// Commit stock for a fully paid purchase and move it to packing.
    ///
    /// # Errors
    ///
    /// Returns `CollaborativeError::Invalid` unless every share is paid and
    /// the purchase is active, and `CollaborativeError::Stock` on shortages.
    pub async fn start_packing(
        &self,
        id: CollaborativePurchaseId,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<(CollaborativeDetail, Vec<StockUpdate>), CollaborativeError> {
        let mut tx = self.pool.begin().await?;
        let purchase = repo::lock(&mut *tx, id)
            .await?
            .ok_or_else(|| CollaborativeError::NotFound("Collaborative purchase not found".to_string()))?;
        let detail = repo::load_detail(&mut *tx, id).await?.ok_or(RepositoryError::NotFound)?;
        if !purchase.status.is_active() || !detail.all_paid() {
            return Err(CollaborativeError::Invalid(
                "All participants must pay before packing can start".to_string(),
            ));
        }

        let requests = stock::requests_for(&detail.items);
        let updates = stock::commit(&mut *tx, id.as_i32(), OrderSummaryKind::Collaborative, &requests).await?;
        repo::set_status(&mut *tx, id, CollaborativeStatus::Packing, None).await?;
        if let Some(at) = scheduled_at {
            repo::set_scheduled_at(&mut *tx, id, at).await?;
        }
        let detail = repo::load_detail(&mut *tx, id).await?.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok((detail, updates))
    }

    /// Apply a staff dashboard status other than packing.
    ///
    /// Cancelling refunds paid shares. `scheduled_at` records the planned
    /// delivery time when given.
    ///
    /// # Errors
    ///
    /// Returns `CollaborativeError::NotFound` if the purchase does not exist
    /// and `CollaborativeError::Invalid` for a move the pipeline forbids.
    pub async fn set_status(
        &self,
        id: CollaborativePurchaseId,
        status: CollaborativeStatus,
        scheduled_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<CollaborativeDetail, CollaborativeError> {
        let mut tx = self.pool.begin().await?;
        let purchase = repo::lock(&mut *tx, id)
            .await?
            .ok_or_else(|| CollaborativeError::NotFound("Collaborative purchase not found".to_string()))?;
        if !purchase.status.admin_can_move_to(status) {
            return Err(CollaborativeError::Invalid(format!(
                "Cannot change status from {} to {status}",
                purchase.status
            )));
        }

        if status == CollaborativeStatus::Cancelled {
            let detail = repo::load_detail(&mut *tx, id).await?.ok_or(RepositoryError::NotFound)?;
            close_with_refunds(&mut *tx, &detail, now).await?;
        } else {
            repo::set_status(&mut *tx, id, status, None).await?;
        }
        if let Some(at) = scheduled_at {
            repo::set_scheduled_at(&mut *tx, id, at).await?;
        }
        let detail = repo::load_detail(&mut *tx, id).await?.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(detail)
    }

    async fn resolve_link(
        &self,
        link: &str,
    ) -> Result<(CollaborativePurchaseId, ParticipantId), CollaborativeError> {
        let participant = CollaborativeRepository::new(self.pool)
            .participant_by_link(link)
            .await?
            .ok_or_else(|| CollaborativeError::NotFound("Invalid payment link".to_string()))?;
        Ok((participant.purchase_id, participant.id))
    }
}

/// Refund every paid share and close the purchase. Ends in `Refunded` when
/// anything was refunded, `Cancelled` otherwise. Returns the refund count.
async fn close_with_refunds(
    conn: &mut PgConnection,
    detail: &CollaborativeDetail,
    now: DateTime<Utc>,
) -> Result<usize, RepositoryError> {
    let mut refunded = 0_usize;
    for participant in &detail.participants {
        if participant.payment_status == ParticipantPaymentStatus::Paid {
            repo::mark_refunded(&mut *conn, participant.id, &generate_refund_id(now)).await?;
            refunded += 1;
        }
    }
    let status = if refunded > 0 {
        CollaborativeStatus::Refunded
    } else {
        CollaborativeStatus::Cancelled
    };
    repo::set_status(&mut *conn, detail.purchase.id, status, None).await?;
    Ok(refunded)
}

fn find_participant(
    detail: &CollaborativeDetail,
    id: ParticipantId,
) -> Result<Participant, CollaborativeError> {
    detail
        .participants
        .iter()
        .find(|p| p.id == id)
        .cloned()
        .ok_or_else(|| CollaborativeError::NotFound("Participant not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_link_is_64_hex_chars() {
        let link = generate_payment_link();
        assert_eq!(link.len(), 64);
        assert!(link.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(link, generate_payment_link());
    }

    #[test]
    fn test_refund_id_format() {
        let now = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap_or_default();
        let id = generate_refund_id(now);
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "refund");
        assert_eq!(parts[1], "1700000000123");
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_participants_are_normalized() {
        let emails = vec![" Ana@Example.com ".to_string(), "bo@example.com".to_string()];
        let out = validate_participants(&emails, "me@example.com").unwrap_or_default();
        assert_eq!(out, vec!["ana@example.com", "bo@example.com"]);
    }

    #[test]
    fn test_participant_rules() {
        let me = "me@example.com";
        assert!(validate_participants(&[], me).is_err());
        let four: Vec<String> = (0..4).map(|i| format!("p{i}@example.com")).collect();
        assert!(validate_participants(&four, me).is_err());
        assert!(validate_participants(&["nobody".to_string()], me).is_err());
        assert!(validate_participants(&["ME@example.com".to_string()], me).is_err());
        let dup = vec!["a@example.com".to_string(), "A@example.com".to_string()];
        assert!(validate_participants(&dup, me).is_err());
    }

    #[test]
    fn test_wanted_quantities_guards_input() {
        let line = |id, quantity| StockRequest {
            product_id: ProductId::new(id),
            quantity,
        };
        let merged = wanted_quantities(&[line(3, 2), line(3, 5)]).unwrap_or_default();
        assert_eq!(merged.get(&ProductId::new(3)), Some(&7));

        assert!(matches!(wanted_quantities(&[]), Err(CollaborativeError::Invalid(_))));
        assert!(matches!(wanted_quantities(&[line(3, 0)]), Err(CollaborativeError::Invalid(_))));
        assert!(matches!(
            wanted_quantities(&[line(3, i32::MAX), line(3, 1)]),
            Err(CollaborativeError::Invalid(_))
        ));
    }

    #[test]
    fn test_order_lines_skip_deleted_products() {
        let items = vec![
            LineItem {
                id: 1,
                product_id: Some(ProductId::new(2)),
                name: "Mug".to_string(),
                price: Decimal::from(12),
                quantity: 2,
                image: None,
            },
            LineItem {
                id: 2,
                product_id: None,
                name: "Gone".to_string(),
                price: Decimal::from(3),
                quantity: 1,
                image: None,
            },
        ];
        let lines = order_lines(&items);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_id, ProductId::new(2));
        assert_eq!(lines[0].quantity, 2);
    }
}
