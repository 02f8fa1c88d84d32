//! Surprise gift routes (`/api/surprise`).

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use best_wishes_core::{Costume, SurpriseGiftId, SurpriseGiftStatus};

use crate::db::surprise_gifts::{GiftStatusUpdate, SurpriseGiftRepository};
use crate::error::{AppError, Result};
use crate::middleware::{AdminOnly, RequireAuth, RequireRole};
use crate::models::order::NewLineItem;
use crate::models::surprise_gift::NewSurpriseGift;
use crate::routes::extract::{ApiJson, ApiPath, parse_status, required};
use crate::services::fulfillment;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/my", get(mine))
        .route("/all", get(all))
        .route("/{id}/status", put(update_status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGiftRequest {
    pub recipient_name: Option<String>,
    pub recipient_phone: Option<String>,
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub costume: Costume,
    pub suggestions: Option<String>,
    #[serde(default)]
    pub items: Vec<NewLineItem>,
    pub total: Option<Decimal>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl CreateGiftRequest {
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for missing recipient fields, an empty
    /// item list, or a negative total.
    pub fn validate(self) -> Result<(NewSurpriseGift, Vec<NewLineItem>)> {
        let (Some(name), Some(phone), Some(address)) = (
            required(self.recipient_name.as_deref()),
            required(self.recipient_phone.as_deref()),
            required(self.shipping_address.as_deref()),
        ) else {
            return Err(AppError::BadRequest(
                "Recipient name, phone and shipping address are required".to_string(),
            ));
        };
        NewLineItem::validate_all(&self.items).map_err(AppError::BadRequest)?;
        let total = self
            .total
            .filter(|t| !t.is_sign_negative())
            .ok_or_else(|| AppError::BadRequest("Invalid total amount".to_string()))?;

        let gift = NewSurpriseGift {
            recipient_name: name.to_string(),
            recipient_phone: phone.to_string(),
            shipping_address: address.to_string(),
            costume: self.costume,
            suggestions: self.suggestions.filter(|s| !s.trim().is_empty()),
            total,
            scheduled_at: self.scheduled_at,
        };
        Ok((gift, self.items))
    }
}

#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<CreateGiftRequest>,
) -> Result<impl IntoResponse> {
    let (gift, items) = body.validate()?;
    let detail = SurpriseGiftRepository::new(state.pool())
        .create(user.id, &gift, &items)
        .await?;
    tracing::info!(gift_id = %detail.gift.id, user_id = %user.id, "Surprise gift created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Surprise gift created successfully",
            "surpriseGift": detail,
        })),
    ))
}

pub async fn mine(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<serde_json::Value>> {
    let gifts = SurpriseGiftRepository::new(state.pool()).for_user(user.id).await?;
    Ok(Json(json!({ "success": true, "surpriseGifts": gifts })))
}

pub async fn all(
    State(state): State<AppState>,
    RequireRole(_admin, _): RequireRole<AdminOnly>,
) -> Result<Json<serde_json::Value>> {
    let gifts = SurpriseGiftRepository::new(state.pool()).all().await?;
    Ok(Json(json!({ "success": true, "surpriseGifts": gifts })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminGiftStatusRequest {
    pub status: String,
    pub payment_id: Option<String>,
}

/// Admin status change. Entering `Packing` commits stock, entering `Paid`
/// marks the payment paid.
#[instrument(skip_all, fields(gift_id = %id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireRole(admin, _): RequireRole<AdminOnly>,
    ApiPath(id): ApiPath<SurpriseGiftId>,
    ApiJson(body): ApiJson<AdminGiftStatusRequest>,
) -> Result<Json<serde_json::Value>> {
    let next: SurpriseGiftStatus = parse_status(&body.status)?;
    let change = fulfillment::set_gift_status(
        state.pool(),
        id,
        next,
        &GiftStatusUpdate {
            payment_id: body.payment_id.filter(|p| !p.trim().is_empty()),
            delivered_by: None,
        },
    )
    .await?;
    tracing::info!(
        target: "audit",
        gift_id = %id,
        user_id = %admin.id,
        from = %change.previous,
        to = %next,
        "Surprise gift status updated"
    );

    if let Err(e) = state
        .notifications()
        .item_status(
            change.row.user_id,
            ("SurpriseGift", id.as_i32()),
            "surprise gift",
            next.as_str(),
        )
        .await
    {
        tracing::warn!(error = %e, gift_id = %id, "Failed to create status notification");
    }

    Ok(Json(json!({
        "success": true,
        "message": format!("Surprise gift status updated to {next}"),
        "surpriseGift": change.row,
        "stockUpdates": change.stock,
    })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn body(value: serde_json::Value) -> CreateGiftRequest {
        serde_json::from_value(value).unwrap()
    }

    fn valid() -> serde_json::Value {
        json!({
            "recipientName": "Nimal",
            "recipientPhone": "0771234567",
            "shippingAddress": "12 Lake Road",
            "items": [{ "productId": 1, "name": "Teddy", "price": "25", "quantity": 1 }],
            "total": "35",
        })
    }

    #[test]
    fn test_costume_defaults_to_none() {
        let (gift, items) = body(valid()).validate().unwrap();
        assert_eq!(gift.costume, Costume::None);
        assert_eq!(items.len(), 1);
        assert_eq!(gift.total, Decimal::from(35));
    }

    #[test]
    fn test_blank_recipient_rejected() {
        let mut value = valid();
        value["recipientPhone"] = json!("  ");
        assert!(matches!(body(value).validate(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_empty_items_rejected() {
        let mut value = valid();
        value["items"] = json!([]);
        assert!(body(value).validate().is_err());
    }

    #[test]
    fn test_negative_total_rejected() {
        let mut value = valid();
        value["total"] = json!("-1");
        assert!(body(value).validate().is_err());
    }
}
