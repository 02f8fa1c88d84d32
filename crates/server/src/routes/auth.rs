//! Account route handlers.
//!
//! Registration, login and logout set or clear the session cookie. OTP and
//! password reset codes are generated here, emailed, and checked against
//! their stored hashes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use tracing::instrument;

use best_wishes_core::Email;

use crate::db::auth_codes::CodePurpose;
use crate::db::users::UserRepository;
use crate::error::{AppError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::auth_rate_limiter;
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::user::{ProfileUpdate, User};
use crate::routes::extract::{ApiJson, required};
use crate::services::auth::{AuthService, CODE_TTL_MINUTES, Registration};
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub zip_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub phone: Option<String>,
    pub address: Option<String>,
    pub profile_image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub email: Option<String>,
    #[serde(alias = "otp")]
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorRequest {
    pub email: Option<String>,
    #[serde(alias = "enabled")]
    pub two_factor_enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
    pub code: Option<String>,
    #[serde(alias = "newPassword")]
    pub password: Option<String>,
}

// =============================================================================
// Router
// =============================================================================

/// Account routes, mounted directly under `/api`.
pub fn router() -> Router<AppState> {
    let limited = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/otp", post(send_otp))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/logout", post(logout))
        .route("/myprofile", get(my_profile))
        .route("/getUserProfile", get(my_profile))
        .route("/changepassword", put(change_password))
        .route("/updateprofile", put(update_profile))
        .route("/verify-otp", post(verify_otp))
        .route("/twoFactor", put(two_factor))
        .route("/verify-reset-code", post(verify_reset_code))
        .merge(limited)
}

// =============================================================================
// Handlers
// =============================================================================

fn user_body(message: &str, user: &User) -> serde_json::Value {
    json!({ "success": true, "message": message, "user": user })
}

fn parse_email(value: Option<&str>) -> Result<Email> {
    let raw = required(value).ok_or_else(|| AppError::BadRequest("Email is required".to_string()))?;
    Ok(Email::parse(raw).map_err(crate::services::auth::AuthError::from)?)
}

async fn start_session(session: &Session, user: &User) -> Result<()> {
    set_current_user(session, &user.to_current_user())
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    set_sentry_user(user.id, &user.email);
    Ok(())
}

/// Create a customer account and log it in.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let (Some(first_name), Some(last_name), Some(email), Some(password)) = (
        required(body.first_name.as_deref()),
        required(body.last_name.as_deref()),
        required(body.email.as_deref()),
        body.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::BadRequest("Please fill all required fields".to_string()));
    };

    let user = AuthService::new(state.pool())
        .register(Registration {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            phone: body.phone,
            address: body.address,
            zip_code: body.zip_code,
        })
        .await?;

    start_session(&session, &user).await?;
    tracing::info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(user_body("User registered successfully", &user)),
    ))
}

/// Log in with email and password.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<serde_json::Value>> {
    let (Some(email), Some(password)) = (
        required(body.email.as_deref()),
        body.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::BadRequest("Please provide email and password".to_string()));
    };

    let user = AuthService::new(state.pool()).login(email, password).await?;
    start_session(&session, &user).await?;
    add_breadcrumb("auth", "User logged in", None);

    Ok(Json(user_body("Login successful", &user)))
}

/// Clear the session.
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<Json<serde_json::Value>> {
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    clear_sentry_user();
    Ok(Json(json!({ "success": true, "message": "Logged out successfully" })))
}

/// The caller's profile.
pub async fn my_profile(RequireAuth(user): RequireAuth) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "user": user }))
}

#[instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>> {
    let (Some(old_password), Some(password)) = (body.old_password.as_deref(), body.password.as_deref())
    else {
        return Err(AppError::BadRequest(
            "Old password and new password are required".to_string(),
        ));
    };

    AuthService::new(state.pool())
        .change_password(user.id, old_password, password)
        .await?;
    tracing::info!(user_id = %user.id, "Password changed");

    Ok(Json(json!({ "success": true, "message": "Password updated successfully" })))
}

/// Update phone, address and profile image. Absent fields are kept.
#[instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<UpdateProfileRequest>,
) -> Result<Json<serde_json::Value>> {
    let updated = UserRepository::new(state.pool())
        .update_profile(
            user.id,
            &ProfileUpdate {
                phone: body.phone,
                address: body.address,
                profile_image: body.profile_image,
                ..ProfileUpdate::default()
            },
        )
        .await?;

    Ok(Json(user_body("Profile updated successfully", &updated)))
}

/// Email a fresh 6-digit login code.
#[instrument(skip_all)]
pub async fn send_otp(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<EmailRequest>,
) -> Result<Json<serde_json::Value>> {
    let email = parse_email(body.email.as_deref())?;
    let code = AuthService::new(state.pool())
        .issue_code(&email, CodePurpose::Otp)
        .await?;

    state
        .email()
        .send_otp(email.as_str(), &code, CODE_TTL_MINUTES)
        .await
        .map_err(|e| AppError::Internal(format!("failed to send OTP: {e}")))?;

    Ok(Json(json!({ "success": true, "message": "OTP sent successfully" })))
}

#[instrument(skip_all)]
pub async fn verify_otp(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CodeRequest>,
) -> Result<Json<serde_json::Value>> {
    let email = parse_email(body.email.as_deref())?;
    let code = required(body.code.as_deref())
        .ok_or_else(|| AppError::BadRequest("Email and OTP are required".to_string()))?;

    AuthService::new(state.pool()).verify_otp(&email, code).await?;
    Ok(Json(json!({ "success": true, "message": "OTP verified successfully" })))
}

/// Toggle two-factor login for an email address.
#[instrument(skip_all)]
pub async fn two_factor(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<TwoFactorRequest>,
) -> Result<Json<serde_json::Value>> {
    let email = parse_email(body.email.as_deref())?;
    let user = UserRepository::new(state.pool())
        .set_two_factor(&email, body.two_factor_enabled)
        .await
        .map_err(AppError::missing("User"))?;

    let message = if user.two_factor_enabled {
        "Two-factor authentication enabled"
    } else {
        "Two-factor authentication disabled"
    };
    Ok(Json(user_body(message, &user)))
}

/// Start a password reset. The answer never reveals whether the email exists.
#[instrument(skip_all)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<EmailRequest>,
) -> Result<Json<serde_json::Value>> {
    let email = parse_email(body.email.as_deref())?;

    if UserRepository::new(state.pool()).email_exists(&email).await? {
        let code = AuthService::new(state.pool())
            .issue_code(&email, CodePurpose::PasswordReset)
            .await?;
        if let Err(e) = state
            .email()
            .send_reset_code(email.as_str(), &code, CODE_TTL_MINUTES)
            .await
        {
            tracing::warn!(error = %e, "Failed to send reset code");
        }
    }

    Ok(Json(json!({
        "success": true,
        "message": "If an account exists for this email, a reset code has been sent",
    })))
}

#[instrument(skip_all)]
pub async fn verify_reset_code(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CodeRequest>,
) -> Result<Json<serde_json::Value>> {
    let email = parse_email(body.email.as_deref())?;
    let code = required(body.code.as_deref())
        .ok_or_else(|| AppError::BadRequest("Email and code are required".to_string()))?;

    AuthService::new(state.pool())
        .verify_reset_code(&email, code)
        .await?;
    Ok(Json(json!({ "success": true, "message": "Code verified" })))
}

#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>> {
    let email = parse_email(body.email.as_deref())?;
    let (Some(code), Some(password)) = (required(body.code.as_deref()), body.password.as_deref())
    else {
        return Err(AppError::BadRequest(
            "Email, code and new password are required".to_string(),
        ));
    };

    AuthService::new(state.pool())
        .reset_password(&email, code, password)
        .await?;
    tracing::info!(target: "audit", email = %email, "Password reset");

    Ok(Json(json!({ "success": true, "message": "Password reset successfully" })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_reads_camel_case() {
        let body: RegisterRequest = serde_json::from_value(json!({
            "firstName": "Ana",
            "lastName": "Perera",
            "email": "ana@example.com",
            "password": "secret1",
            "zipCode": "10100",
        }))
        .unwrap();
        assert_eq!(body.first_name.as_deref(), Some("Ana"));
        assert_eq!(body.zip_code.as_deref(), Some("10100"));
        assert!(body.phone.is_none());
    }

    #[test]
    fn test_code_request_accepts_otp_alias() {
        let body: CodeRequest =
            serde_json::from_value(json!({ "email": "a@b.co", "otp": "123456" })).unwrap();
        assert_eq!(body.code.as_deref(), Some("123456"));
    }

    #[test]
    fn test_parse_email_requires_value() {
        assert!(matches!(parse_email(None), Err(AppError::BadRequest(_))));
        assert!(matches!(parse_email(Some("nope")), Err(AppError::Auth(_))));
        assert!(parse_email(Some("ana@example.com")).is_ok());
    }
}
