//! Collaborative purchase routes (`/api/collaborative-purchases`).
//!
//! Participants act through the emailed payment link, so the payment and
//! decline endpoints need no session.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use best_wishes_core::{
    CollaborativePurchaseId, CollaborativeStatus, NotificationType, ProductId, Role, UserId,
};

use crate::db::collaborative::CollaborativeRepository;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{AdminOnly, RequireAuth, RequireRole};
use crate::models::collaborative::CollaborativeDetail;
use crate::models::notification::NewNotification;
use crate::models::product::StockRequest;
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery};
use crate::services::collaborative::{CollaborativeService, validate_participants};
use crate::state::AppState;

/// Default window of the delivered listing.
const DELIVERED_LOOKBACK_DAYS: i64 = 14;

pub fn router() -> Router<AppState> {
    let admin = Router::new()
        .route("/", get(admin_all))
        .route("/delivered", get(delivered))
        .route("/{id}/start-packing", post(start_packing))
        .route("/{id}/status", put(admin_status));

    Router::new()
        .route("/", post(create).get(mine))
        .route("/payment/{link}", get(payment_details).post(pay))
        .route("/decline/{link}", post(decline))
        .route("/{id}", get(get_one))
        .route("/{id}/cancel", post(cancel))
        .nest("/admin", admin)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePurchaseRequest {
    pub product_id: Option<ProductId>,
    pub quantity: Option<i32>,
    #[serde(default)]
    pub products: Vec<StockRequest>,
    #[serde(default)]
    pub participants: Vec<String>,
}

impl CreatePurchaseRequest {
    /// The requested lines: `products` wins over the single-product form.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` when neither form is given.
    pub fn lines(&self) -> Result<Vec<StockRequest>> {
        if !self.products.is_empty() {
            return Ok(self.products.clone());
        }
        match self.product_id {
            Some(product_id) => Ok(vec![StockRequest {
                product_id,
                quantity: self.quantity.unwrap_or(1),
            }]),
            None => Err(AppError::BadRequest(
                "Product ID or products list is required".to_string(),
            )),
        }
    }
}

#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<CreatePurchaseRequest>,
) -> Result<impl IntoResponse> {
    let lines = body.lines()?;
    let participants =
        validate_participants(&body.participants, user.email.as_str()).map_err(AppError::BadRequest)?;

    let detail = CollaborativeService::new(state.pool())
        .create(user.id, &lines, participants, Utc::now())
        .await?;
    tracing::info!(
        purchase_id = %detail.purchase.id,
        user_id = %user.id,
        participants = detail.participants.len(),
        "Collaborative purchase created"
    );
    add_breadcrumb("collaborative", "Group purchase created", None);

    send_invitations(&state, &detail).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Collaborative purchase created and invitations sent",
            "collaborativePurchase": detail,
        })),
    ))
}

async fn send_invitations(state: &AppState, detail: &CollaborativeDetail) {
    let products = detail.product_summary();
    let frontend = &state.config().frontend_url;
    for participant in &detail.participants {
        let link = payment_url(frontend, &participant.payment_link);
        if let Err(e) = state
            .email()
            .send_collaborative_invite(
                &participant.email,
                &detail.creator_name,
                &products,
                detail.purchase.share_amount,
                detail.purchase.deadline,
                &link,
            )
            .await
        {
            tracing::warn!(error = %e, participant = %participant.email, "Failed to send invitation");
        }
    }

    let lines = vec![
        format!("Your group purchase of {products} has been created."),
        format!(
            "Each share is {} and invitations went to {}.",
            detail.purchase.share_amount,
            participant_list(detail)
        ),
        format!(
            "Everyone must pay before {}.",
            detail.purchase.deadline.format("%B %-d, %Y %H:%M UTC")
        ),
    ];
    if let Err(e) = state
        .email()
        .send_notice(
            &detail.creator_email,
            "Your group purchase is ready",
            "Group purchase created",
            &lines,
            None,
        )
        .await
    {
        tracing::warn!(error = %e, purchase_id = %detail.purchase.id, "Failed to send creator confirmation");
    }
}

fn payment_url(frontend: &str, link: &str) -> String {
    format!("{}/collaborative-payment/{link}", frontend.trim_end_matches('/'))
}

fn participant_list(detail: &CollaborativeDetail) -> String {
    detail
        .participants
        .iter()
        .map(|p| p.email.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whether `user` may read the purchase.
fn can_view(detail: &CollaborativeDetail, user_id: UserId, email: &str, role: Role) -> bool {
    role == Role::Admin
        || detail.purchase.created_by == user_id
        || detail.participants.iter().any(|p| p.email.eq_ignore_ascii_case(email))
}

pub async fn mine(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<serde_json::Value>> {
    let purchases = CollaborativeRepository::new(state.pool())
        .for_user(user.id, user.email.as_str())
        .await?;
    Ok(Json(json!({ "success": true, "collaborativePurchases": purchases })))
}

pub async fn get_one(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<CollaborativePurchaseId>,
) -> Result<Json<serde_json::Value>> {
    let detail = CollaborativeRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("Collaborative purchase"))?;
    if !can_view(&detail, user.id, user.email.as_str(), user.role) {
        return Err(AppError::Forbidden(
            "You do not have access to this collaborative purchase".to_string(),
        ));
    }
    Ok(Json(json!({ "success": true, "collaborativePurchase": detail })))
}

/// What a participant sees when opening their link.
pub async fn payment_details(
    State(state): State<AppState>,
    ApiPath(link): ApiPath<String>,
) -> Result<Json<serde_json::Value>> {
    let repo = CollaborativeRepository::new(state.pool());
    let participant = repo
        .participant_by_link(&link)
        .await?
        .ok_or_else(|| AppError::NotFound("Invalid payment link".to_string()))?;
    let detail = repo
        .get(participant.purchase_id)
        .await?
        .ok_or_else(|| AppError::not_found("Collaborative purchase"))?;
    let time_remaining = detail.purchase.time_remaining_ms(Utc::now());

    Ok(Json(json!({
        "success": true,
        "collaborativePurchase": detail,
        "participant": participant,
        "timeRemaining": time_remaining,
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRequest {
    pub payment_intent_id: Option<String>,
}

impl PayRequest {
    /// The body is optional, so an empty payload means no intent id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a non-empty body that is not JSON.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(raw).map_err(|e| AppError::BadRequest(e.to_string()))
    }
}

#[instrument(skip_all)]
pub async fn pay(
    State(state): State<AppState>,
    ApiPath(link): ApiPath<String>,
    raw: Bytes,
) -> Result<Json<serde_json::Value>> {
    let body = PayRequest::parse(&raw)?;
    let intent = body.payment_intent_id.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let outcome = CollaborativeService::new(state.pool())
        .pay(&link, intent, Utc::now())
        .await?;

    if let Some(order_id) = outcome.order_id {
        let detail = &outcome.detail;
        let products = detail.product_summary();
        let lines = vec![
            format!("Every participant has paid for {products}."),
            format!("Order #{} has been placed.", order_id.reference()),
        ];
        let recipients = std::iter::once(detail.creator_email.as_str())
            .chain(detail.participants.iter().map(|p| p.email.as_str()));
        for to in recipients {
            if let Err(e) = state
                .email()
                .send_notice(to, "Group purchase complete", "All shares paid", &lines, None)
                .await
            {
                tracing::warn!(error = %e, to, "Failed to send completion email");
            }
        }

        let notification = NewNotification::new(
            detail.purchase.created_by,
            "Group Purchase Completed",
            format!(
                "All participants paid for {products}. Order #{} is being processed.",
                order_id.reference()
            ),
        )
        .kind(NotificationType::Order)
        .related("CollaborativePurchase", detail.purchase.id.as_i32())
        .action_url("/user/orders");
        if let Err(e) = state.notifications().notify(notification).await {
            tracing::warn!(error = %e, purchase_id = %detail.purchase.id, "Failed to notify creator");
        }
    }

    let message = if outcome.order_id.is_some() {
        "Payment completed. All participants have paid and the order has been placed"
    } else {
        "Payment completed successfully"
    };
    Ok(Json(json!({
        "success": true,
        "message": message,
        "collaborativePurchase": outcome.detail,
        "participant": outcome.participant,
        "orderId": outcome.order_id,
    })))
}

#[instrument(skip_all)]
pub async fn decline(
    State(state): State<AppState>,
    ApiPath(link): ApiPath<String>,
) -> Result<Json<serde_json::Value>> {
    let detail = CollaborativeService::new(state.pool())
        .decline(&link, Utc::now())
        .await?;

    notify_cancelled(&state, &detail, "A participant declined to join").await;

    Ok(Json(json!({
        "success": true,
        "message": "You have declined the collaborative purchase",
        "collaborativePurchase": detail,
    })))
}

#[instrument(skip_all, fields(purchase_id = %id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<CollaborativePurchaseId>,
) -> Result<Json<serde_json::Value>> {
    let detail = CollaborativeService::new(state.pool())
        .cancel(id, user.id, Utc::now())
        .await?;

    let reason = if detail.purchase.status == CollaborativeStatus::Refunded {
        "The organizer cancelled it and paid shares will be refunded"
    } else {
        "The organizer cancelled it"
    };
    notify_cancelled(&state, &detail, reason).await;

    Ok(Json(json!({
        "success": true,
        "message": "Collaborative purchase cancelled",
        "collaborativePurchase": detail,
    })))
}

async fn notify_cancelled(state: &AppState, detail: &CollaborativeDetail, reason: &str) {
    let lines = vec![
        format!("The group purchase of {} has been cancelled.", detail.product_summary()),
        format!("{reason}."),
    ];
    let recipients = std::iter::once(detail.creator_email.as_str())
        .chain(detail.participants.iter().map(|p| p.email.as_str()));
    for to in recipients {
        if let Err(e) = state
            .email()
            .send_notice(to, "Group purchase cancelled", "Group purchase cancelled", &lines, None)
            .await
        {
            tracing::warn!(error = %e, to, "Failed to send cancellation email");
        }
    }
}

pub async fn admin_all(
    State(state): State<AppState>,
    RequireRole(_admin, _): RequireRole<AdminOnly>,
) -> Result<Json<serde_json::Value>> {
    let purchases = CollaborativeRepository::new(state.pool()).all().await?;
    Ok(Json(json!({ "success": true, "collaborativePurchases": purchases })))
}

#[instrument(skip_all, fields(purchase_id = %id))]
pub async fn start_packing(
    State(state): State<AppState>,
    RequireRole(admin, _): RequireRole<AdminOnly>,
    ApiPath(id): ApiPath<CollaborativePurchaseId>,
) -> Result<Json<serde_json::Value>> {
    begin_packing(&state, admin.id, id, None).await
}

/// Commit stock, move to packing, and tell the creator.
async fn begin_packing(
    state: &AppState,
    admin: UserId,
    id: CollaborativePurchaseId,
    scheduled_at: Option<DateTime<Utc>>,
) -> Result<Json<serde_json::Value>> {
    let (detail, updates) = CollaborativeService::new(state.pool())
        .start_packing(id, scheduled_at)
        .await?;
    tracing::info!(
        target: "audit",
        purchase_id = %id,
        user_id = %admin,
        products = updates.len(),
        "Collaborative packing started"
    );
    notify_status(state, &detail, CollaborativeStatus::Packing).await;

    Ok(Json(json!({
        "success": true,
        "message": "Packing started and stock updated",
        "collaborativePurchase": detail,
        "stockUpdates": updates,
    })))
}

async fn notify_status(state: &AppState, detail: &CollaborativeDetail, status: CollaborativeStatus) {
    let id = detail.purchase.id;
    if let Err(e) = state
        .notifications()
        .item_status(
            detail.purchase.created_by,
            ("CollaborativePurchase", id.as_i32()),
            "group purchase",
            status.as_str(),
        )
        .await
    {
        tracing::warn!(error = %e, purchase_id = %id, "Failed to create status notification");
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatusRequest {
    pub status: String,
    /// Planned delivery time.
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Staff dashboard status change. "Packing" goes through the stock commit.
#[instrument(skip_all, fields(purchase_id = %id))]
pub async fn admin_status(
    State(state): State<AppState>,
    RequireRole(admin, _): RequireRole<AdminOnly>,
    ApiPath(id): ApiPath<CollaborativePurchaseId>,
    ApiJson(body): ApiJson<AdminStatusRequest>,
) -> Result<Json<serde_json::Value>> {
    let status = CollaborativeStatus::from_admin_label(body.status.trim())
        .ok_or_else(|| AppError::BadRequest("Invalid status value".to_string()))?;
    if status == CollaborativeStatus::Packing {
        return begin_packing(&state, admin.id, id, body.scheduled_at).await;
    }

    let detail = CollaborativeService::new(state.pool())
        .set_status(id, status, body.scheduled_at, Utc::now())
        .await?;
    tracing::info!(
        target: "audit",
        purchase_id = %id,
        user_id = %admin.id,
        to = %detail.purchase.status,
        "Collaborative purchase status updated"
    );

    if status == CollaborativeStatus::Cancelled {
        notify_cancelled(&state, &detail, "The store cancelled it").await;
    } else {
        notify_status(&state, &detail, status).await;
    }

    Ok(Json(json!({
        "success": true,
        "message": format!("Status updated to {}", detail.purchase.status),
        "collaborativePurchase": detail,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeliveredQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DeliveredQuery {
    /// Inclusive range covering whole days. Defaults to the last two weeks.
    #[must_use]
    pub fn range(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let from = self.from.map_or_else(
            || now - Duration::days(DELIVERED_LOOKBACK_DAYS),
            |d| d.and_time(NaiveTime::MIN).and_utc(),
        );
        let to = self.to.map_or(now, |d| {
            d.and_time(NaiveTime::MIN).and_utc() + Duration::days(1) - Duration::milliseconds(1)
        });
        (from, to)
    }
}

/// Delivered purchases with their packing-slip references.
pub async fn delivered(
    State(state): State<AppState>,
    RequireRole(_admin, _): RequireRole<AdminOnly>,
    ApiQuery(query): ApiQuery<DeliveredQuery>,
) -> Result<Json<serde_json::Value>> {
    let (from, to) = query.range(Utc::now());
    if from > to {
        return Err(AppError::BadRequest("Start date must be before end date".to_string()));
    }
    let purchases = CollaborativeRepository::new(state.pool())
        .delivered_between(from, to)
        .await?;
    let rows: Vec<serde_json::Value> = purchases
        .iter()
        .map(|detail| {
            json!({
                "reference": detail.print_reference(),
                "purchase": detail,
            })
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "count": rows.len(),
        "from": from,
        "to": to,
        "purchases": rows,
    })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use best_wishes_core::{ParticipantId, ParticipantPaymentStatus};
    use rust_decimal::Decimal;

    use crate::models::collaborative::{CollaborativePurchase, Participant};

    fn request(value: serde_json::Value) -> CreatePurchaseRequest {
        serde_json::from_value(value).unwrap()
    }

    fn detail() -> CollaborativeDetail {
        let now = Utc::now();
        CollaborativeDetail {
            purchase: CollaborativePurchase {
                id: CollaborativePurchaseId::new(3),
                created_by: UserId::new(1),
                total_amount: Decimal::from(90),
                share_amount: Decimal::from(30),
                status: CollaborativeStatus::Pending,
                deadline: now + Duration::days(3),
                completed_at: None,
                cancelled_at: None,
                order_id: None,
                scheduled_at: None,
                created_at: now,
                updated_at: now,
            },
            items: Vec::new(),
            participants: vec![Participant {
                id: ParticipantId::new(9),
                purchase_id: CollaborativePurchaseId::new(3),
                email: "friend@example.com".to_string(),
                payment_status: ParticipantPaymentStatus::Pending,
                payment_link: "cd".repeat(32),
                paid_at: None,
                payment_intent_id: None,
                refund_id: None,
            }],
            creator_name: "Ana Perera".to_string(),
            creator_email: "ana@example.com".to_string(),
        }
    }

    #[test]
    fn test_single_product_form() {
        let body = request(json!({ "productId": 4, "quantity": 2, "participants": ["a@b.c"] }));
        let lines = body.lines().unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_id, ProductId::new(4));
        assert_eq!(lines[0].quantity, 2);
    }

    #[test]
    fn test_products_list_wins() {
        let body = request(json!({
            "productId": 4,
            "products": [{ "productId": 5, "quantity": 1 }, { "productId": 6, "quantity": 3 }],
        }));
        let lines = body.lines().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].product_id, ProductId::new(6));
    }

    #[test]
    fn test_missing_products_rejected() {
        let body = request(json!({ "participants": ["a@b.c"] }));
        assert!(matches!(body.lines(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_pay_body_is_optional() {
        assert!(PayRequest::parse(b"").unwrap().payment_intent_id.is_none());
        let body = PayRequest::parse(br#"{"paymentIntentId":"pi_123"}"#).unwrap();
        assert_eq!(body.payment_intent_id.as_deref(), Some("pi_123"));
        assert!(PayRequest::parse(b"not json").is_err());
    }

    #[test]
    fn test_payment_url() {
        assert_eq!(
            payment_url("http://localhost:3000/", "abc"),
            "http://localhost:3000/collaborative-payment/abc"
        );
    }

    #[test]
    fn test_visibility() {
        let d = detail();
        assert!(can_view(&d, UserId::new(1), "ana@example.com", Role::User));
        assert!(can_view(&d, UserId::new(7), "Friend@Example.com", Role::User));
        assert!(can_view(&d, UserId::new(8), "boss@example.com", Role::Admin));
        assert!(!can_view(&d, UserId::new(8), "stranger@example.com", Role::DeliveryStaff));
    }

    #[test]
    fn test_delivered_range_defaults_to_two_weeks() {
        let now = Utc::now();
        let (from, to) = DeliveredQuery::default().range(now);
        assert_eq!(to, now);
        assert_eq!(to - from, Duration::days(DELIVERED_LOOKBACK_DAYS));
    }

    #[test]
    fn test_delivered_range_covers_whole_days() {
        let query = DeliveredQuery {
            from: NaiveDate::from_ymd_opt(2024, 5, 1),
            to: NaiveDate::from_ymd_opt(2024, 5, 1),
        };
        let (from, to) = query.range(Utc::now());
        assert_eq!(from.to_rfc3339(), "2024-05-01T00:00:00+00:00");
        assert!(to > from && to - from < Duration::days(1));
    }

    #[test]
    fn test_admin_status_carries_schedule() {
        let body: AdminStatusRequest = serde_json::from_value(json!({
            "status": "OutForDelivery",
            "scheduledAt": "2024-06-01T09:30:00Z",
        }))
        .unwrap();
        assert_eq!(
            body.scheduled_at.map(|at| at.to_rfc3339()).as_deref(),
            Some("2024-06-01T09:30:00+00:00")
        );

        let body: AdminStatusRequest = serde_json::from_value(json!({ "status": "Delivered" })).unwrap();
        assert!(body.scheduled_at.is_none());
    }
}
