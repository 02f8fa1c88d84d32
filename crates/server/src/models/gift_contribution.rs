//! Gift contributions: a lighter-weight group gift tracked by paid flags.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use best_wishes_core::{GiftContributionId, GiftContributionStatus, ProductId, UserId};

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftContribution {
    pub id: GiftContributionId,
    pub created_by: UserId,
    pub product_id: ProductId,
    pub amount: Decimal,
    pub status: GiftContributionStatus,
    pub deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionParticipant {
    pub email: String,
    pub has_paid: bool,
    pub declined: bool,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftContributionDetail {
    #[serde(flatten)]
    pub contribution: GiftContribution,
    pub product_name: String,
    pub participants: Vec<ContributionParticipant>,
}

impl GiftContributionDetail {
    #[must_use]
    pub fn all_paid(&self) -> bool {
        !self.participants.is_empty() && self.participants.iter().all(|p| p.has_paid)
    }
}
