//! Occasion calendar routes (`/api/events`).

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, put},
};
use chrono::{DateTime, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use best_wishes_core::EventId;

use crate::db::events::EventRepository;
use crate::error::{AppError, Result};
use crate::middleware::{AdminOnly, RequireRole};
use crate::models::event::{EventEdit, NewEvent};
use crate::routes::extract::{ApiJson, ApiPath, required};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/upcoming", get(upcoming))
        .route("/{id}", put(update).delete(remove))
        .route("/{id}/flags", patch(set_flags))
}

#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    RequireRole(admin, _): RequireRole<AdminOnly>,
    ApiJson(mut event): ApiJson<NewEvent>,
) -> Result<impl IntoResponse> {
    event.name = required(Some(&event.name))
        .ok_or_else(|| AppError::BadRequest("Event name is required".to_string()))?
        .to_string();
    let event = EventRepository::new(state.pool()).create(&event).await?;
    tracing::info!(target: "audit", event_id = %event.id, user_id = %admin.id, "Event created");
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "event": event }))))
}

pub async fn list(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let events = EventRepository::new(state.pool()).list().await?;
    Ok(Json(json!({ "success": true, "events": events })))
}

/// Start of the current UTC day; events dated today still count as upcoming.
fn start_of_today(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

pub async fn upcoming(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let events = EventRepository::new(state.pool())
        .upcoming(start_of_today(Utc::now()))
        .await?;
    Ok(Json(json!({ "success": true, "events": events })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub image: Option<String>,
    pub is_active: Option<bool>,
    pub featured: Option<bool>,
}

impl UpdateEventRequest {
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` when the body tries to change the flags,
    /// which have their own endpoint.
    pub fn into_edit(self) -> Result<EventEdit> {
        if self.is_active.is_some() || self.featured.is_some() {
            return Err(AppError::Forbidden(
                "Use the flags endpoint to change isActive or featured".to_string(),
            ));
        }
        Ok(EventEdit {
            name: self.name.filter(|n| !n.trim().is_empty()),
            description: self.description,
            date: self.date,
            image: self.image,
        })
    }
}

pub async fn update(
    State(state): State<AppState>,
    RequireRole(_admin, _): RequireRole<AdminOnly>,
    ApiPath(id): ApiPath<EventId>,
    ApiJson(body): ApiJson<UpdateEventRequest>,
) -> Result<Json<serde_json::Value>> {
    let edit = body.into_edit()?;
    let event = EventRepository::new(state.pool())
        .update(id, &edit)
        .await
        .map_err(AppError::missing("Event"))?;
    Ok(Json(json!({ "success": true, "event": event })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagsRequest {
    pub is_active: Option<bool>,
    pub featured: Option<bool>,
}

pub async fn set_flags(
    State(state): State<AppState>,
    RequireRole(admin, _): RequireRole<AdminOnly>,
    ApiPath(id): ApiPath<EventId>,
    ApiJson(body): ApiJson<FlagsRequest>,
) -> Result<Json<serde_json::Value>> {
    let event = EventRepository::new(state.pool())
        .set_flags(id, body.is_active, body.featured)
        .await
        .map_err(AppError::missing("Event"))?;
    tracing::info!(
        target: "audit",
        event_id = %id,
        user_id = %admin.id,
        is_active = event.is_active,
        featured = event.featured,
        "Event flags updated"
    );
    Ok(Json(json!({ "success": true, "event": event })))
}

pub async fn remove(
    State(state): State<AppState>,
    RequireRole(admin, _): RequireRole<AdminOnly>,
    ApiPath(id): ApiPath<EventId>,
) -> Result<Json<serde_json::Value>> {
    EventRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(AppError::missing("Event"))?;
    tracing::info!(target: "audit", event_id = %id, user_id = %admin.id, "Event deleted");
    Ok(Json(json!({ "success": true, "message": "Event deleted successfully" })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_update_rejects_flags() {
        let body: UpdateEventRequest = serde_json::from_value(json!({ "featured": true })).unwrap();
        assert!(matches!(body.into_edit(), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_update_ignores_blank_name() {
        let body: UpdateEventRequest =
            serde_json::from_value(json!({ "name": " ", "image": "x.png" })).unwrap();
        let edit = body.into_edit().unwrap();
        assert_eq!(edit.name, None);
        assert_eq!(edit.image.as_deref(), Some("x.png"));
    }

    #[test]
    fn test_start_of_today() {
        let now = DateTime::parse_from_rfc3339("2024-12-24T18:30:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(start_of_today(now).to_rfc3339(), "2024-12-24T00:00:00+00:00");
    }
}
