//! Event reminder routes (`/api/reminder`).

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use best_wishes_core::{Occasion, ReminderId};

use crate::db::products::ProductRepository;
use crate::db::reminders::ReminderRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::product::Product;
use crate::models::reminder::{NewReminder, ReminderEdit, is_valid_time};
use crate::routes::extract::{ApiJson, ApiPath, required};
use crate::services::email::ReminderMail;
use crate::services::recommendations::{self, DEFAULT_LIMIT, Recommendation};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create).get(list))
        .route("/{id}", put(update).delete(remove))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReminderRequest {
    pub remindermsg: Option<String>,
    pub date: Option<NaiveDate>,
    pub event: Option<String>,
    pub time: Option<String>,
    pub occasion: Option<Occasion>,
}

impl ReminderRequest {
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for missing fields or a bad time.
    pub fn validate(self) -> Result<NewReminder> {
        let (Some(message), Some(date), Some(event), Some(time)) = (
            required(self.remindermsg.as_deref()),
            self.date,
            required(self.event.as_deref()),
            required(self.time.as_deref()),
        ) else {
            return Err(AppError::BadRequest(
                "Reminder message, date, event and time are required".to_string(),
            ));
        };
        if !is_valid_time(time) {
            return Err(AppError::BadRequest("Time must be in HH:MM format".to_string()));
        }
        Ok(NewReminder {
            reminder_msg: message.to_string(),
            date,
            event: event.to_string(),
            occasion: self.occasion.unwrap_or_default(),
            time: time.to_string(),
        })
    }

    /// Only the provided fields change.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a bad time.
    pub fn into_edit(self) -> Result<ReminderEdit> {
        let time = self.time.map(|t| t.trim().to_string());
        if time.as_deref().is_some_and(|t| !is_valid_time(t)) {
            return Err(AppError::BadRequest("Time must be in HH:MM format".to_string()));
        }
        Ok(ReminderEdit {
            reminder_msg: self.remindermsg.filter(|m| !m.trim().is_empty()),
            date: self.date,
            event: self.event.filter(|e| !e.trim().is_empty()),
            occasion: self.occasion,
            time,
        })
    }
}

#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<ReminderRequest>,
) -> Result<impl IntoResponse> {
    let new = body.validate()?;
    let reminder = ReminderRepository::new(state.pool()).create(user.id, &new).await?;
    tracing::info!(reminder_id = %reminder.id, user_id = %user.id, date = %reminder.date, "Reminder set");

    let catalog = ProductRepository::new(state.pool()).active().await?;
    let picks: Vec<Product> = recommendations::rank(&catalog, reminder.occasion, DEFAULT_LIMIT)
        .into_iter()
        .cloned()
        .collect();

    if let Err(e) = state
        .email()
        .send_reminder(
            user.email.as_str(),
            ReminderMail {
                name: &user.first_name,
                event: &reminder.event,
                message: &reminder.reminder_msg,
                date: reminder.date,
                time: &reminder.time,
                occasion: reminder.occasion.display_name(),
            },
            &picks,
            true,
        )
        .await
    {
        tracing::warn!(error = %e, reminder_id = %reminder.id, "Failed to send reminder confirmation");
    }

    let frontend = &state.config().frontend_url;
    let recommendations: Vec<Recommendation> = picks
        .iter()
        .map(|p| Recommendation::from_product(p, frontend))
        .collect();

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Reminder Set Successfully",
            "reminder": reminder,
            "recommendations": recommendations,
        })),
    ))
}

pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<serde_json::Value>> {
    let reminders = ReminderRepository::new(state.pool()).list(user.id).await?;
    Ok(Json(json!({ "success": true, "reminders": reminders })))
}

pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<ReminderId>,
    ApiJson(body): ApiJson<ReminderRequest>,
) -> Result<Json<serde_json::Value>> {
    let edit = body.into_edit()?;
    let reminder = ReminderRepository::new(state.pool())
        .update(id, user.id, &edit)
        .await
        .map_err(AppError::missing("Reminder"))?;
    Ok(Json(json!({
        "success": true,
        "message": "Reminder updated successfully",
        "reminder": reminder,
    })))
}

pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<ReminderId>,
) -> Result<Json<serde_json::Value>> {
    ReminderRepository::new(state.pool())
        .delete(id, user.id)
        .await
        .map_err(AppError::missing("Reminder"))?;
    Ok(Json(json!({ "success": true, "message": "Reminder deleted successfully" })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn body(value: serde_json::Value) -> ReminderRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_occasion_defaults_to_general() {
        let new = body(json!({
            "remindermsg": "Buy flowers",
            "date": "2025-03-14",
            "event": "Mum's birthday",
            "time": "09:30",
        }))
        .validate()
        .unwrap();
        assert_eq!(new.occasion, Occasion::default());
        assert_eq!(new.time, "09:30");
    }

    #[test]
    fn test_missing_fields_rejected() {
        let result = body(json!({ "remindermsg": "x", "time": "09:30" })).validate();
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_bad_time_rejected() {
        let result = body(json!({
            "remindermsg": "x",
            "date": "2025-03-14",
            "event": "y",
            "time": "9:30",
        }))
        .validate();
        assert!(result.is_err());
        assert!(body(json!({ "time": "25:00" })).into_edit().is_err());
    }

    #[test]
    fn test_edit_keeps_only_provided_fields() {
        let edit = body(json!({ "event": "Anniversary dinner" })).into_edit().unwrap();
        assert_eq!(edit.event.as_deref(), Some("Anniversary dinner"));
        assert!(edit.date.is_none() && edit.time.is_none() && edit.reminder_msg.is_none());
    }
}
