//! Collaborative purchases: one order paid for in equal shares.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use best_wishes_core::{
    CollaborativePurchaseId, CollaborativeStatus, OrderId, ParticipantId,
    ParticipantPaymentStatus, UserId,
};

use super::order::LineItem;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborativePurchase {
    pub id: CollaborativePurchaseId,
    pub created_by: UserId,
    pub total_amount: Decimal,
    pub share_amount: Decimal,
    pub status: CollaborativeStatus,
    pub deadline: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub order_id: Option<OrderId>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CollaborativePurchase {
    /// Whether the payment window has closed.
    #[must_use]
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }

    /// Milliseconds left before the deadline, never negative.
    #[must_use]
    pub fn time_remaining_ms(&self, now: DateTime<Utc>) -> i64 {
        (self.deadline - now).num_milliseconds().max(0)
    }
}

/// An invited payer.
///
/// The payment link is a bearer credential, so it is only ever sent by email.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    pub purchase_id: CollaborativePurchaseId,
    pub email: String,
    pub payment_status: ParticipantPaymentStatus,
    #[serde(skip)]
    pub payment_link: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_intent_id: Option<String>,
    pub refund_id: Option<String>,
}

/// A purchase with its items and participants.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborativeDetail {
    #[serde(flatten)]
    pub purchase: CollaborativePurchase,
    pub items: Vec<LineItem>,
    pub participants: Vec<Participant>,
    pub creator_name: String,
    pub creator_email: String,
}

impl CollaborativeDetail {
    /// Whether every invited participant has paid.
    #[must_use]
    pub fn all_paid(&self) -> bool {
        self.participants
            .iter()
            .all(|p| p.payment_status == ParticipantPaymentStatus::Paid)
    }

    /// Comma-separated product names, for emails.
    #[must_use]
    pub fn product_summary(&self) -> String {
        self.items
            .iter()
            .map(|i| i.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Packing-slip reference: the last eight digits of the padded order id.
    #[must_use]
    pub fn print_reference(&self) -> String {
        let padded = self
            .purchase
            .order_id
            .map_or_else(|| self.purchase.id.print_reference(), |id| format!("{:08}", id.as_i32()));
        let start = padded.len().saturating_sub(8);
        padded.get(start..).unwrap_or_default().to_string()
    }
}

/// Creator identity joined onto a purchase row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PurchaseWithCreator {
    #[sqlx(flatten)]
    pub purchase: CollaborativePurchase,
    pub creator_name: String,
    pub creator_email: String,
}
