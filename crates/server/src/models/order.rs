//! Orders, their line items, and status history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use best_wishes_core::{OrderId, OrderStatus, ProductId, UserId};

/// A purchased line. Shared by orders, surprise gifts, and collaborative
/// purchases, which all store items with the same columns.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: i32,
    pub product_id: Option<ProductId>,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub image: Option<String>,
}

/// A line to insert.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLineItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub image: Option<String>,
}

impl NewLineItem {
    /// Reject empty lists and non-positive quantities or prices.
    ///
    /// # Errors
    ///
    /// Returns a message suitable for a 400 response.
    pub fn validate_all(items: &[Self]) -> Result<(), String> {
        if items.is_empty() {
            return Err("Order must contain at least one item".to_string());
        }
        for item in items {
            if item.quantity < 1 {
                return Err(format!("Invalid quantity for {}", item.name));
            }
            if item.price < Decimal::ZERO {
                return Err(format!("Invalid price for {}", item.name));
            }
        }
        Ok(())
    }
}

/// An order row.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total: Decimal,
    pub status: OrderStatus,
    pub ordered_at: DateTime<Utc>,
    pub updated_by: Option<UserId>,
    pub delivery_notes: Option<String>,
    pub tracking_number: Option<String>,
    pub delivery_staff_id: Option<UserId>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One entry in an order's status history.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    pub updated_by: Option<UserId>,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Customer contact details joined onto an order for staff views.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCustomer {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
}

/// Order row plus customer contact, as listed for delivery staff.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffOrderRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub order: Order,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub customer: OrderCustomer,
}

/// An order with its items and history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub reference: String,
    pub items: Vec<LineItem>,
    pub status_history: Vec<StatusHistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<OrderCustomer>,
}

impl OrderDetail {
    #[must_use]
    pub fn new(order: Order, items: Vec<LineItem>, status_history: Vec<StatusHistoryEntry>) -> Self {
        Self {
            reference: order.id.reference(),
            order,
            items,
            status_history,
            customer: None,
        }
    }

    #[must_use]
    pub fn with_customer(mut self, customer: OrderCustomer) -> Self {
        self.customer = Some(customer);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i32, price: i64) -> NewLineItem {
        NewLineItem {
            product_id: ProductId::new(1),
            name: "Teddy".to_string(),
            price: Decimal::from(price),
            quantity,
            image: None,
        }
    }

    #[test]
    fn test_validate_rejects_empty_order() {
        assert!(NewLineItem::validate_all(&[]).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_quantity() {
        let err = NewLineItem::validate_all(&[line(0, 5)]);
        assert_eq!(err, Err("Invalid quantity for Teddy".to_string()));
    }

    #[test]
    fn test_validate_rejects_negative_price() {
        assert!(NewLineItem::validate_all(&[line(1, -1)]).is_err());
    }

    #[test]
    fn test_validate_accepts_well_formed_items() {
        assert!(NewLineItem::validate_all(&[line(1, 5), line(3, 0)]).is_ok());
    }
}
