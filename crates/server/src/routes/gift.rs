//! Gift contribution routes (`/api/gift`).

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use best_wishes_core::{GiftContributionId, GiftContributionStatus, ProductId};

use crate::db::RepositoryError;
use crate::db::gift_contributions::{self as repo, GiftContributionRepository};
use crate::db::products::ProductRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::gift_contribution::GiftContributionDetail;
use crate::routes::extract::{ApiJson, ApiPath};
use crate::services::collaborative::{DEADLINE_DAYS, validate_participants};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create).get(mine))
        .route("/{id}", get(get_one))
        .route("/{id}/pay", post(pay))
        .route("/{id}/decline", post(decline))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContributionRequest {
    pub product_id: Option<ProductId>,
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub participants: Vec<String>,
}

#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<CreateContributionRequest>,
) -> Result<impl IntoResponse> {
    let product_id = body
        .product_id
        .ok_or_else(|| AppError::BadRequest("Product ID is required".to_string()))?;
    let amount = body
        .amount
        .filter(|a| a.is_sign_positive() && !a.is_zero())
        .ok_or_else(|| AppError::BadRequest("Amount must be greater than zero".to_string()))?;
    let emails =
        validate_participants(&body.participants, user.email.as_str()).map_err(AppError::BadRequest)?;

    let product = ProductRepository::new(state.pool())
        .get(product_id)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    let deadline = Utc::now() + Duration::days(DEADLINE_DAYS);
    let detail = GiftContributionRepository::new(state.pool())
        .create(user.id, product_id, amount, deadline, &emails)
        .await
        .map_err(AppError::conflict_as_bad_request)?;
    tracing::info!(contribution_id = %detail.contribution.id, user_id = %user.id, "Gift contribution created");

    let link = format!(
        "{}/gift/{}",
        state.config().frontend_url.trim_end_matches('/'),
        detail.contribution.id
    );
    let lines = vec![
        format!("{} invited you to chip in for {}.", user.full_name(), product.name),
        format!("The contribution is {amount}."),
        format!("Please respond before {}.", deadline.format("%B %-d, %Y %H:%M UTC")),
    ];
    for email in &emails {
        if let Err(e) = state
            .email()
            .send_notice(email, "You're invited to a group gift", "Join the gift", &lines, Some(&link))
            .await
        {
            tracing::warn!(error = %e, to = %email, "Failed to send contribution invitation");
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Gift contribution created",
            "contribution": detail,
        })),
    ))
}

pub async fn get_one(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<GiftContributionId>,
) -> Result<Json<serde_json::Value>> {
    let detail = GiftContributionRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("Gift contribution"))?;
    Ok(Json(json!({ "success": true, "contribution": detail })))
}

pub async fn mine(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<serde_json::Value>> {
    let contributions = GiftContributionRepository::new(state.pool())
        .for_user(user.id, user.email.as_str())
        .await?;
    Ok(Json(json!({ "success": true, "contributions": contributions })))
}

#[instrument(skip_all, fields(contribution_id = %id))]
pub async fn pay(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<GiftContributionId>,
) -> Result<Json<serde_json::Value>> {
    let detail = respond(&state, id, user.email.as_str(), true).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Contribution recorded",
        "contribution": detail,
    })))
}

#[instrument(skip_all, fields(contribution_id = %id))]
pub async fn decline(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<GiftContributionId>,
) -> Result<Json<serde_json::Value>> {
    let detail = respond(&state, id, user.email.as_str(), false).await?;
    Ok(Json(json!({
        "success": true,
        "message": "You have declined this gift contribution",
        "contribution": detail,
    })))
}

/// Why a contribution no longer accepts responses, if it doesn't.
fn closed_reason(status: GiftContributionStatus, past_deadline: bool) -> Option<&'static str> {
    if status != GiftContributionStatus::Pending {
        Some("This gift contribution is no longer active")
    } else if past_deadline {
        Some("This gift contribution has expired")
    } else {
        None
    }
}

/// Pay or decline under a row lock. Paying the last share completes the
/// contribution and declining cancels it.
async fn respond(
    state: &AppState,
    id: GiftContributionId,
    email: &str,
    paid: bool,
) -> Result<GiftContributionDetail> {
    let mut tx = state.pool().begin().await.map_err(RepositoryError::from)?;
    let contribution = repo::lock(&mut *tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Gift contribution"))?;

    let past_deadline = Utc::now() > contribution.deadline;
    if let Some(reason) = closed_reason(contribution.status, past_deadline) {
        if contribution.status == GiftContributionStatus::Pending {
            repo::set_status(&mut *tx, id, GiftContributionStatus::Expired).await?;
            tx.commit().await.map_err(RepositoryError::from)?;
        }
        return Err(AppError::BadRequest(reason.to_string()));
    }

    if !repo::respond(&mut *tx, id, email, paid).await? {
        return Err(AppError::Forbidden(
            "You are not a participant in this gift contribution".to_string(),
        ));
    }

    let mut detail = repo::load_detail(&mut *tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Gift contribution"))?;
    let next = if !paid {
        Some(GiftContributionStatus::Cancelled)
    } else if detail.all_paid() {
        Some(GiftContributionStatus::Completed)
    } else {
        None
    };
    if let Some(status) = next {
        repo::set_status(&mut *tx, id, status).await?;
        detail.contribution.status = status;
    }
    tx.commit().await.map_err(RepositoryError::from)?;

    tracing::info!(contribution_id = %id, paid, status = %detail.contribution.status, "Gift contribution response");
    Ok(detail)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_reason() {
        assert_eq!(closed_reason(GiftContributionStatus::Pending, false), None);
        assert_eq!(
            closed_reason(GiftContributionStatus::Pending, true),
            Some("This gift contribution has expired")
        );
        assert_eq!(
            closed_reason(GiftContributionStatus::Completed, false),
            Some("This gift contribution is no longer active")
        );
    }

    #[test]
    fn test_create_request_shape() {
        let body: CreateContributionRequest = serde_json::from_value(json!({
            "productId": 3,
            "amount": "15.00",
            "participants": ["a@example.com"],
        }))
        .unwrap();
        assert_eq!(body.product_id, Some(ProductId::new(3)));
        assert_eq!(body.amount, Some(Decimal::new(1500, 2)));
        assert_eq!(body.participants.len(), 1);
    }
}
