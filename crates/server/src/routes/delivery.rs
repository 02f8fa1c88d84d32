//! Delivery dashboard routes (`/api/delivery`).
//!
//! Delivery staff move orders and surprise gifts out the door. Stock is
//! committed by admins when packing starts, so staff cannot enter `Packing`
//! from here.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, put},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use best_wishes_core::{OrderId, OrderStatus, SurpriseGiftId, SurpriseGiftStatus, UserId};

use crate::db::orders::{DeliveryUpdate, OrderRepository, StaffOrderFilter};
use crate::db::surprise_gifts::{GiftStatusUpdate, SurpriseGiftRepository};
use crate::db::users::UserRepository;
use crate::db::Page;
use crate::error::{AppError, Result};
use crate::middleware::{DeliveryStaff, RequireRole};
use crate::models::user::ProfileUpdate;
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery, parse_status};
use crate::services::fulfillment;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 10;
const ALL: &str = "all";

type Staffer = RequireRole<DeliveryStaff>;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/search", get(search_orders))
        .route("/orders/{id}", get(order_detail))
        .route("/orders/{id}/status", put(update_order_status))
        .route("/profile", get(profile).put(update_profile))
        .route("/stats", get(stats))
        .route("/surprise-gifts", get(list_gifts))
        .route("/surprise-gifts/stats", get(gift_stats))
        .route("/surprise-gifts/{id}/status", put(update_gift_status))
}

/// Pagination block used by the delivery dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardPagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_orders: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl DashboardPagination {
    #[must_use]
    pub const fn new(page: Page, total: i64) -> Self {
        let total_pages = page.total_pages(total);
        Self {
            current_page: page.page,
            total_pages,
            total_orders: total,
            has_next: page.page < total_pages,
            has_prev: page.page > 1,
        }
    }
}

/// Parse an optional status filter where `all` (or nothing) means no filter.
fn status_filter<S: std::str::FromStr>(raw: Option<&str>, default: Option<S>) -> Result<Option<S>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(ALL) => Ok(None),
        Some(label) => parse_status(label).map(Some),
    }
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListParams {
    pub status: Option<String>,
    pub delivery_staff: Option<UserId>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_orders(
    State(state): State<AppState>,
    RequireRole(_staff, _): Staffer,
    ApiQuery(params): ApiQuery<OrderListParams>,
) -> Result<Json<serde_json::Value>> {
    let page = Page::new(params.page, params.limit, DEFAULT_PAGE_SIZE);
    let filter = StaffOrderFilter {
        status: status_filter::<OrderStatus>(params.status.as_deref(), None)?,
        delivery_staff: params.delivery_staff,
    };
    let (orders, total) = OrderRepository::new(state.pool())
        .list_for_staff(filter, page)
        .await?;

    Ok(Json(json!({
        "success": true,
        "orders": orders,
        "pagination": DashboardPagination::new(page, total),
    })))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

pub async fn search_orders(
    State(state): State<AppState>,
    RequireRole(_staff, _): Staffer,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> Result<Json<serde_json::Value>> {
    if params.q.trim().is_empty() {
        return Err(AppError::BadRequest("Search query is required".to_string()));
    }
    let orders = OrderRepository::new(state.pool())
        .search_for_staff(&params.q)
        .await?;
    Ok(Json(json!({ "success": true, "orders": orders })))
}

pub async fn order_detail(
    State(state): State<AppState>,
    RequireRole(_staff, _): Staffer,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<serde_json::Value>> {
    let order = OrderRepository::new(state.pool())
        .detail(id)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    Ok(Json(json!({ "success": true, "order": order })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStatusRequest {
    pub status: String,
    pub notes: Option<String>,
    pub delivery_staff_id: Option<UserId>,
}

#[instrument(skip_all, fields(order_id = %id))]
pub async fn update_order_status(
    State(state): State<AppState>,
    RequireRole(staff, _): Staffer,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(body): ApiJson<DeliveryStatusRequest>,
) -> Result<Json<serde_json::Value>> {
    let next: OrderStatus = parse_status(&body.status)?;
    if next.commits_stock() {
        return Err(AppError::BadRequest(
            "Packing must be started by an administrator".to_string(),
        ));
    }

    let delivered_by =
        (next == OrderStatus::Delivered).then(|| body.delivery_staff_id.unwrap_or(staff.id));
    let change = fulfillment::set_order_status(
        state.pool(),
        id,
        next,
        staff.id,
        &DeliveryUpdate {
            notes: body.notes,
            delivered_by,
        },
    )
    .await?;
    tracing::info!(order_id = %id, staff_id = %staff.id, to = %next, "Delivery status updated");

    if next == OrderStatus::Delivered
        && let Err(e) = state
            .notifications()
            .order_status(change.row.user_id, id, next)
            .await
    {
        tracing::warn!(error = %e, order_id = %id, "Failed to create delivery notification");
    }

    Ok(Json(json!({
        "success": true,
        "message": format!("Order status updated to {next}"),
        "order": change.row,
    })))
}

// =============================================================================
// Profile and stats
// =============================================================================

pub async fn profile(RequireRole(staff, _): Staffer) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "user": staff }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub profile_image: Option<String>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    RequireRole(staff, _): Staffer,
    ApiJson(body): ApiJson<StaffProfileRequest>,
) -> Result<Json<serde_json::Value>> {
    let user = UserRepository::new(state.pool())
        .update_profile(
            staff.id,
            &ProfileUpdate {
                first_name: body.first_name,
                last_name: body.last_name,
                phone: body.phone,
                address: body.address,
                zip_code: None,
                profile_image: body.profile_image,
            },
        )
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Profile updated successfully",
        "user": user,
    })))
}

pub async fn stats(
    State(state): State<AppState>,
    RequireRole(staff, _): Staffer,
) -> Result<Json<serde_json::Value>> {
    let orders = OrderRepository::new(state.pool());
    let counts = orders.staff_counts(staff.id).await?;
    let recent = orders.staff_recent(staff.id).await?;
    Ok(Json(json!({
        "success": true,
        "stats": counts,
        "recentOrders": recent,
    })))
}

// =============================================================================
// Surprise gifts
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct GiftListParams {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_gifts(
    State(state): State<AppState>,
    RequireRole(_staff, _): Staffer,
    ApiQuery(params): ApiQuery<GiftListParams>,
) -> Result<Json<serde_json::Value>> {
    let page = Page::new(params.page, params.limit, DEFAULT_PAGE_SIZE);
    let status = status_filter(params.status.as_deref(), Some(SurpriseGiftStatus::OutForDelivery))?;
    let (gifts, total) = SurpriseGiftRepository::new(state.pool())
        .list_for_staff(status, page)
        .await?;

    Ok(Json(json!({
        "success": true,
        "surpriseGifts": gifts,
        "pagination": DashboardPagination::new(page, total),
    })))
}

#[derive(Debug, Deserialize)]
pub struct GiftStatusRequest {
    pub status: String,
}

#[instrument(skip_all, fields(gift_id = %id))]
pub async fn update_gift_status(
    State(state): State<AppState>,
    RequireRole(staff, _): Staffer,
    ApiPath(id): ApiPath<SurpriseGiftId>,
    ApiJson(body): ApiJson<GiftStatusRequest>,
) -> Result<Json<serde_json::Value>> {
    let next: SurpriseGiftStatus = parse_status(&body.status)?;
    if next.commits_stock() {
        return Err(AppError::BadRequest(
            "Packing must be started by an administrator".to_string(),
        ));
    }

    let delivered = next == SurpriseGiftStatus::Delivered;
    let change = fulfillment::set_gift_status(
        state.pool(),
        id,
        next,
        &GiftStatusUpdate {
            payment_id: None,
            delivered_by: delivered.then_some(staff.id),
        },
    )
    .await?;
    tracing::info!(gift_id = %id, staff_id = %staff.id, to = %next, "Surprise gift status updated");

    if delivered
        && let Err(e) = state
            .notifications()
            .item_status(
                change.row.user_id,
                ("SurpriseGift", id.as_i32()),
                "surprise gift",
                next.as_str(),
            )
            .await
    {
        tracing::warn!(error = %e, gift_id = %id, "Failed to create delivery notification");
    }

    Ok(Json(json!({
        "success": true,
        "message": format!("Surprise gift status updated to {next}"),
        "surpriseGift": change.row,
    })))
}

pub async fn gift_stats(
    State(state): State<AppState>,
    RequireRole(staff, _): Staffer,
) -> Result<Json<serde_json::Value>> {
    let counts = SurpriseGiftRepository::new(state.pool())
        .delivery_counts(staff.id)
        .await?;
    Ok(Json(json!({ "success": true, "stats": counts })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_flags() {
        let first = DashboardPagination::new(Page::new(Some(1), Some(10), 10), 25);
        assert_eq!(first.total_pages, 3);
        assert!(first.has_next);
        assert!(!first.has_prev);

        let last = DashboardPagination::new(Page::new(Some(3), Some(10), 10), 25);
        assert!(!last.has_next);
        assert!(last.has_prev);

        let empty = DashboardPagination::new(Page::new(None, None, 10), 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
    }

    #[test]
    fn test_status_filter() {
        assert_eq!(status_filter::<OrderStatus>(Some("all"), None).unwrap(), None);
        assert_eq!(
            status_filter::<OrderStatus>(Some("Shipped"), None).unwrap(),
            Some(OrderStatus::Shipped)
        );
        assert_eq!(
            status_filter(None, Some(SurpriseGiftStatus::OutForDelivery)).unwrap(),
            Some(SurpriseGiftStatus::OutForDelivery)
        );
        assert!(status_filter::<OrderStatus>(Some("Lost"), None).is_err());
    }

    #[test]
    fn test_pagination_serializes_camel_case() {
        let json = serde_json::to_value(DashboardPagination::new(Page::new(Some(2), Some(5), 10), 11)).unwrap();
        assert_eq!(json["currentPage"], 2);
        assert_eq!(json["totalOrders"], 11);
        assert_eq!(json["hasPrev"], true);
    }
}
