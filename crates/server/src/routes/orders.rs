//! Order routes (`/api/orders`).

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use best_wishes_core::{OrderId, OrderStatus};

use crate::db::orders::{DeliveryUpdate, OrderRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{AdminOnly, AdminOrInventory, RequireAuth, RequireRole};
use crate::models::order::NewLineItem;
use crate::routes::extract::{ApiJson, ApiPath, parse_status};
use crate::services::fulfillment;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/history", get(history))
        .route("/all", get(all))
        .route("/{id}/status", put(update_status))
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<NewLineItem>,
    pub total: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
    pub notes: Option<String>,
}

#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<CreateOrderRequest>,
) -> Result<impl IntoResponse> {
    NewLineItem::validate_all(&body.items).map_err(AppError::BadRequest)?;
    let total = body
        .total
        .filter(|t| !t.is_sign_negative())
        .ok_or_else(|| AppError::BadRequest("Invalid order total".to_string()))?;

    let order = OrderRepository::new(state.pool())
        .create(user.id, &body.items, total)
        .await?;
    add_breadcrumb("order", "Order placed", Some(&[("order_id", order.reference.as_str())]));

    if let Err(e) = state
        .notifications()
        .order_status(user.id, order.order.id, OrderStatus::Processing)
        .await
    {
        tracing::warn!(error = %e, order_id = %order.order.id, "Failed to create order notification");
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Order placed successfully",
            "order": order,
        })),
    ))
}

/// The caller's orders, newest first.
pub async fn history(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<serde_json::Value>> {
    let orders = OrderRepository::new(state.pool()).history(user.id).await?;
    Ok(Json(json!({ "success": true, "orders": orders })))
}

pub async fn all(
    State(state): State<AppState>,
    RequireRole(_user, _): RequireRole<AdminOnly>,
) -> Result<Json<serde_json::Value>> {
    let orders = OrderRepository::new(state.pool()).all().await?;
    Ok(Json(json!({ "success": true, "orders": orders })))
}

/// Move an order along its pipeline. Entering `Packing` commits stock.
#[instrument(skip_all, fields(order_id = %id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<AdminOrInventory>,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> Result<Json<serde_json::Value>> {
    let next: OrderStatus = parse_status(&body.status)?;
    let change = fulfillment::set_order_status(
        state.pool(),
        id,
        next,
        user.id,
        &DeliveryUpdate {
            notes: body.notes,
            delivered_by: None,
        },
    )
    .await?;

    tracing::info!(
        target: "audit",
        order_id = %id,
        user_id = %user.id,
        from = %change.previous,
        to = %next,
        "Order status updated"
    );

    if let Err(e) = state
        .notifications()
        .order_status(change.row.user_id, id, next)
        .await
    {
        tracing::warn!(error = %e, order_id = %id, "Failed to create status notification");
    }

    Ok(Json(json!({
        "success": true,
        "message": format!("Order status updated to {next}"),
        "order": change.row,
        "stockUpdates": change.stock,
    })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_defaults_items() {
        let body: CreateOrderRequest = serde_json::from_value(json!({ "total": "12.50" })).unwrap();
        assert!(body.items.is_empty());
        assert_eq!(body.total, Some(Decimal::new(1250, 2)));
    }
}
