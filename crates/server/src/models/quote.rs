use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use best_wishes_core::{QuoteCategory, QuoteId, QuoteType};

/// A curated line of text offered for mugs and cards.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: QuoteId,
    pub text: String,
    pub category: QuoteCategory,
    #[serde(rename = "type")]
    pub quote_type: QuoteType,
    pub tags: Vec<String>,
    pub is_active: bool,
    pub usage_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Seed input for a quote.
#[derive(Debug, Clone, Deserialize)]
pub struct NewQuote {
    pub text: String,
    pub category: QuoteCategory,
    #[serde(default, rename = "type")]
    pub quote_type: QuoteType,
    #[serde(default)]
    pub tags: Vec<String>,
}
