//! Staff account management (`/api/admin/users`, admin only).

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use best_wishes_core::{Email, Role, UserId};

use crate::db::users::UserRepository;
use crate::error::{AppError, Result};
use crate::middleware::{AdminOnly, RequireRole, admin_create_rate_limiter};
use crate::models::user::{NewUser, UserWithStats};
use crate::routes::extract::{ApiJson, ApiPath, required};
use crate::services::auth::{hash_password, validate_staff_password};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    let create_limited = Router::new()
        .route("/", post(create_staff))
        .layer(admin_create_rate_limiter());

    Router::new()
        .route("/", get(list).delete(remove))
        .route("/check-email/{email}", get(check_email))
        .route("/activate", post(activate))
        .route("/deactivate", post(deactivate))
        .merge(create_limited)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStaffRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
}

/// Checked staff account fields, with the password still in plain text.
#[derive(Debug)]
pub struct StaffDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub password: String,
    pub role: Role,
    pub phone: Option<String>,
}

impl CreateStaffRequest {
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for missing fields, a non-staff role,
    /// a malformed email or a weak password.
    pub fn validate(self) -> Result<StaffDraft> {
        let (Some(first_name), Some(last_name), Some(email), Some(password), Some(role)) = (
            required(self.first_name.as_deref()),
            required(self.last_name.as_deref()),
            required(self.email.as_deref()),
            self.password.as_deref().filter(|p| !p.is_empty()),
            required(self.role.as_deref()),
        ) else {
            return Err(AppError::BadRequest(
                "First name, last name, email, password and role are required".to_string(),
            ));
        };

        let role: Role = role
            .parse::<Role>()
            .ok()
            .filter(|r| r.is_staff())
            .ok_or_else(|| {
                AppError::BadRequest("Role must be admin, inventoryManager or deliveryStaff".to_string())
            })?;
        let email = Email::parse(email)
            .map_err(|_| AppError::BadRequest("Please provide a valid email address".to_string()))?;
        validate_staff_password(password)?;

        Ok(StaffDraft {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email,
            password: password.to_string(),
            role,
            phone: self.phone.filter(|p| !p.trim().is_empty()),
        })
    }
}

#[instrument(skip_all)]
pub async fn create_staff(
    State(state): State<AppState>,
    RequireRole(admin, _): RequireRole<AdminOnly>,
    ApiJson(body): ApiJson<CreateStaffRequest>,
) -> Result<impl IntoResponse> {
    let draft = body.validate()?;
    let users = UserRepository::new(state.pool());
    if users.email_exists(&draft.email).await? {
        return Err(AppError::Conflict("A user with this email already exists".to_string()));
    }

    let user = users
        .create(&NewUser {
            first_name: draft.first_name,
            last_name: draft.last_name,
            email: draft.email,
            password_hash: hash_password(&draft.password)?,
            phone: draft.phone,
            address: None,
            zip_code: None,
            role: draft.role,
        })
        .await?;

    tracing::info!(
        target: "audit",
        user_id = %user.id,
        role = %user.role,
        created_by = %admin.id,
        "Staff account created"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User created successfully",
            "user": user,
        })),
    ))
}

pub async fn check_email(
    State(state): State<AppState>,
    RequireRole(_admin, _): RequireRole<AdminOnly>,
    ApiPath(email): ApiPath<String>,
) -> Result<Json<serde_json::Value>> {
    let email = Email::parse(&email)
        .map_err(|_| AppError::BadRequest("Please provide a valid email address".to_string()))?;
    let taken = UserRepository::new(state.pool()).email_exists(&email).await?;
    Ok(Json(json!({ "success": true, "available": !taken })))
}

pub async fn list(
    State(state): State<AppState>,
    RequireRole(_admin, _): RequireRole<AdminOnly>,
) -> Result<Json<serde_json::Value>> {
    let now = Utc::now();
    let users: Vec<UserWithStats> = UserRepository::new(state.pool())
        .list_with_stats()
        .await?
        .into_iter()
        .map(|row| UserWithStats::from_row(row, now))
        .collect();
    Ok(Json(json!({ "success": true, "users": users })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdsRequest {
    #[serde(default)]
    pub user_ids: Vec<UserId>,
}

impl UserIdsRequest {
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` when no ids were sent.
    pub fn ids(&self) -> Result<&[UserId]> {
        if self.user_ids.is_empty() {
            return Err(AppError::BadRequest("User IDs are required".to_string()));
        }
        Ok(&self.user_ids)
    }

    /// The requested ids minus the caller's own account.
    #[must_use]
    pub fn without(&self, caller: UserId) -> Vec<UserId> {
        self.user_ids.iter().copied().filter(|id| *id != caller).collect()
    }
}

async fn set_blocked(state: &AppState, admin: UserId, body: &UserIdsRequest, blocked: bool) -> Result<u64> {
    let ids = body.ids()?;
    let changed = UserRepository::new(state.pool()).set_blocked(ids, blocked).await?;
    tracing::info!(target: "audit", user_id = %admin, count = changed, blocked, "Users blocked state changed");
    Ok(changed)
}

pub async fn activate(
    State(state): State<AppState>,
    RequireRole(admin, _): RequireRole<AdminOnly>,
    ApiJson(body): ApiJson<UserIdsRequest>,
) -> Result<Json<serde_json::Value>> {
    let changed = set_blocked(&state, admin.id, &body, false).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("{changed} user(s) activated successfully"),
    })))
}

pub async fn deactivate(
    State(state): State<AppState>,
    RequireRole(admin, _): RequireRole<AdminOnly>,
    ApiJson(body): ApiJson<UserIdsRequest>,
) -> Result<Json<serde_json::Value>> {
    let changed = set_blocked(&state, admin.id, &body, true).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("{changed} user(s) deactivated successfully"),
    })))
}

#[instrument(skip_all)]
pub async fn remove(
    State(state): State<AppState>,
    RequireRole(admin, _): RequireRole<AdminOnly>,
    ApiJson(body): ApiJson<UserIdsRequest>,
) -> Result<Json<serde_json::Value>> {
    body.ids()?;
    let ids = body.without(admin.id);
    if ids.is_empty() {
        return Err(AppError::BadRequest("Cannot delete current user".to_string()));
    }
    let deleted = UserRepository::new(state.pool()).delete_many(&ids).await?;
    tracing::info!(target: "audit", user_id = %admin.id, count = deleted, "Users deleted");
    Ok(Json(json!({
        "success": true,
        "message": format!("{deleted} user(s) deleted successfully"),
    })))
}
