//! Surprise gifts: orders delivered to a third-party recipient.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use best_wishes_core::{Costume, PaymentStatus, SurpriseGiftId, SurpriseGiftStatus, UserId};

use super::order::LineItem;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurpriseGift {
    pub id: SurpriseGiftId,
    pub user_id: UserId,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub shipping_address: String,
    pub costume: Costume,
    pub suggestions: Option<String>,
    pub total: Decimal,
    pub status: SurpriseGiftStatus,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub packed_at: Option<DateTime<Utc>>,
    pub delivery_staff_id: Option<UserId>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurpriseGiftDetail {
    #[serde(flatten)]
    pub gift: SurpriseGift,
    pub items: Vec<LineItem>,
}

/// Fields for a new surprise gift.
#[derive(Debug, Clone)]
pub struct NewSurpriseGift {
    pub recipient_name: String,
    pub recipient_phone: String,
    pub shipping_address: String,
    pub costume: Costume,
    pub suggestions: Option<String>,
    pub total: Decimal,
    pub scheduled_at: Option<DateTime<Utc>>,
}
