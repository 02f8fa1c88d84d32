//! Profit records written when stock is committed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use best_wishes_core::{OrderSummaryId, OrderSummaryKind, ProductId, round_money};

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: OrderSummaryId,
    pub source_id: i32,
    #[serde(rename = "status")]
    pub kind: OrderSummaryKind,
    pub product_id: Option<ProductId>,
    pub product_sku: String,
    pub product_name: String,
    pub quantity: i32,
    pub cost_price: Decimal,
    pub retail_price: Decimal,
    pub sale_price: Decimal,
    pub profit: Decimal,
    pub total_profit: Decimal,
    pub order_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A summary row to insert.
#[derive(Debug, Clone)]
pub struct NewOrderSummary {
    pub source_id: i32,
    pub kind: OrderSummaryKind,
    pub product_id: ProductId,
    pub product_sku: String,
    pub product_name: String,
    pub quantity: i32,
    pub cost_price: Decimal,
    pub retail_price: Decimal,
    pub sale_price: Decimal,
}

impl NewOrderSummary {
    /// Per-unit profit.
    #[must_use]
    pub fn profit(&self) -> Decimal {
        round_money(self.sale_price - self.cost_price)
    }

    #[must_use]
    pub fn total_profit(&self) -> Decimal {
        round_money(self.profit() * Decimal::from(self.quantity))
    }
}

/// Optional filters shared by the listing and analytics endpoints.
#[derive(Debug, Clone, Default)]
pub struct SummaryFilter {
    pub source_id: Option<i32>,
    pub product_id: Option<ProductId>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Aggregates over a filtered set of summaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryAnalytics {
    pub total_orders: i64,
    pub total_quantity: i64,
    pub total_revenue: Decimal,
    pub total_cost: Decimal,
    pub total_profit: Decimal,
    pub avg_profit_per_order: Decimal,
}

impl SummaryAnalytics {
    #[must_use]
    pub fn from_rows(rows: &[OrderSummary]) -> Self {
        let mut out = Self {
            total_orders: i64::try_from(rows.len()).unwrap_or(i64::MAX),
            ..Self::default()
        };
        for row in rows {
            let qty = Decimal::from(row.quantity);
            out.total_quantity += i64::from(row.quantity);
            out.total_revenue += row.sale_price * qty;
            out.total_cost += row.cost_price * qty;
            out.total_profit += row.total_profit;
        }
        if out.total_orders > 0 {
            out.avg_profit_per_order = round_money(out.total_profit / Decimal::from(out.total_orders));
        }
        out
    }
}
