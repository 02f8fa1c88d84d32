//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Errors render as
//! `{"success": false, "message": ...}` and server-side failures are captured
//! to Sentry before the response is written.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use best_wishes_core::{Email, UserId};

use crate::db::RepositoryError;
use crate::db::stock::StockError;
use crate::models::product::InsufficientStockItem;
use crate::services::auth::AuthError;
use crate::services::chatbot::ChatError;
use crate::services::collaborative::CollaborativeError;
use crate::services::fulfillment::FulfillmentError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("{0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// The request conflicts with existing data.
    #[error("{0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Too many requests, please try again later")]
    RateLimited,

    /// Committing stock failed for one or more lines.
    #[error("Insufficient stock for some items")]
    InsufficientStock(Vec<InsufficientStockItem>),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StockError> for AppError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::Repository(e) => Self::Database(e),
            StockError::ProductNotFound(id) => Self::NotFound(format!("Product with ID {id} not found")),
            StockError::InvalidQuantity(_) => Self::BadRequest(err.to_string()),
            StockError::Insufficient(items) => Self::InsufficientStock(items),
        }
    }
}

impl From<CollaborativeError> for AppError {
    fn from(err: CollaborativeError) -> Self {
        match err {
            CollaborativeError::Repository(e) => Self::Database(e),
            CollaborativeError::Stock(e) => e.into(),
            CollaborativeError::NotFound(msg) => Self::NotFound(msg),
            CollaborativeError::Forbidden(msg) => Self::Forbidden(msg),
            CollaborativeError::Invalid(msg) => Self::BadRequest(msg),
        }
    }
}

impl From<FulfillmentError> for AppError {
    fn from(err: FulfillmentError) -> Self {
        match err {
            FulfillmentError::Repository(e) => Self::Database(e),
            FulfillmentError::Stock(e) => e.into(),
            FulfillmentError::NotFound(what) => Self::not_found(what),
            invalid @ FulfillmentError::InvalidTransition { .. } => Self::BadRequest(invalid.to_string()),
        }
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Repository(e) => Self::Database(e),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl AppError {
    /// Shorthand for the common "X not found" response.
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    /// Map a repository `NotFound` to "`what` not found".
    pub fn missing(what: &'static str) -> impl FnOnce(RepositoryError) -> Self {
        move |err| match err {
            RepositoryError::NotFound => Self::not_found(what),
            other => Self::Database(other),
        }
    }

    /// Report a unique-constraint conflict as a 400 validation failure.
    pub fn conflict_as_bad_request(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) => Self::BadRequest(msg),
            other => Self::Database(other),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound | RepositoryError::MissingReference(_)) => {
                StatusCode::NOT_FOUND
            }
            Self::Database(RepositoryError::Conflict(_)) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::IncorrectPassword => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::AccountBlocked => StatusCode::FORBIDDEN,
                AuthError::InvalidEmail(_)
                | AuthError::UserAlreadyExists
                | AuthError::WeakPassword(_)
                | AuthError::InvalidOtp
                | AuthError::InvalidResetCode => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) | Self::InsufficientStock(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    // Internal details never reach the client.
    fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Resource not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg) | RepositoryError::MissingReference(msg)) => {
                msg.clone()
            }
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidEmail(_) => "Please provide a valid email address".to_string(),
                AuthError::InvalidCredentials => "Invalid email or password".to_string(),
                AuthError::UserNotFound => "User not found".to_string(),
                AuthError::UserAlreadyExists => "User already exists with this email!".to_string(),
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::IncorrectPassword => "Old password is incorrect".to_string(),
                AuthError::InvalidOtp => "Invalid or expired OTP".to_string(),
                AuthError::InvalidResetCode => "Invalid or expired reset code".to_string(),
                AuthError::AccountBlocked => {
                    "Your account has been blocked. Please contact support.".to_string()
                }
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Internal server error".to_string()
                }
            },
            _ => self.to_string(),
        }
    }

    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Internal(_)
                | Self::Database(RepositoryError::Database(_) | RepositoryError::DataCorruption(_))
                | Self::Auth(AuthError::Repository(_) | AuthError::PasswordHash)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();
        let message = self.public_message();
        let body = match self {
            Self::InsufficientStock(items) => json!({
                "success": false,
                "message": message,
                "insufficientStockItems": items,
            }),
            _ => json!({ "success": false, "message": message }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Tag later Sentry reports on this task with the signed-in account.
pub fn set_sentry_user(id: UserId, email: &Email) {
    let user = sentry::User {
        id: Some(id.to_string()),
        email: Some(email.to_string()),
        ..Default::default()
    };
    sentry::configure_scope(|scope| scope.set_user(Some(user)));
}

pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| scope.set_user(None));
}

/// Record a step of a customer flow; shown on any later Sentry report.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let data = data
        .unwrap_or_default()
        .iter()
        .map(|(k, v)| ((*k).to_string(), serde_json::Value::from(*v)))
        .collect();
    sentry::add_breadcrumb(sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        data,
        ..Default::default()
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use best_wishes_core::ProductId;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_json(err: AppError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        serde_json::from_slice(&bytes).unwrap_or_default()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::not_found("Order");
        assert_eq!(err.to_string(), "Order not found");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(get_status(AppError::not_found("test")), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(get_status(AppError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_repository_errors_map_to_http() {
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Conflict("dup".to_string()))),
            StatusCode::CONFLICT
        );
    }

    #[tokio::test]
    async fn test_unknown_product_reference_is_not_found() {
        let err = AppError::Database(RepositoryError::MissingReference(
            "Product with ID 404 not found".to_string(),
        ));
        assert!(!err.is_server_error());
        assert_eq!(get_status(err), StatusCode::NOT_FOUND);

        let body = body_json(AppError::Database(RepositoryError::MissingReference(
            "Product with ID 404 not found".to_string(),
        )))
        .await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Product with ID 404 not found");
    }

    #[test]
    fn test_auth_error_status_codes() {
        assert_eq!(
            get_status(AppError::Auth(AuthError::InvalidCredentials)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::UserAlreadyExists)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::AccountBlocked)),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::UserNotFound)),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let body = body_json(AppError::Auth(AuthError::InvalidOtp)).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Invalid or expired OTP");

        let body = body_json(AppError::Internal("pool exhausted".to_string())).await;
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_insufficient_stock_lists_items() {
        let err = AppError::from(StockError::Insufficient(vec![InsufficientStockItem {
            product_id: ProductId::new(3),
            product_name: "Mug".to_string(),
            requested_quantity: 4,
            available_stock: 1,
        }]));
        let body = body_json(err).await;
        assert_eq!(body["insufficientStockItems"][0]["productName"], "Mug");
        assert_eq!(body["insufficientStockItems"][0]["availableStock"], 1);
    }

    #[test]
    fn test_missing_product_message() {
        let err = AppError::from(StockError::ProductNotFound(ProductId::new(9)));
        assert_eq!(err.to_string(), "Product with ID 9 not found");
    }

    #[test]
    fn test_repository_error_helpers() {
        let err = AppError::missing("Category")(RepositoryError::NotFound);
        assert!(matches!(err, AppError::NotFound(m) if m == "Category not found"));

        let err = AppError::conflict_as_bad_request(RepositoryError::Conflict("SKU already exists".to_string()));
        assert_eq!(get_status(err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_invalid_transition_is_bad_request() {
        let err = AppError::from(FulfillmentError::InvalidTransition {
            from: "Delivered".to_string(),
            to: "Packing".to_string(),
        });
        assert!(matches!(&err, AppError::BadRequest(m) if m.contains("from Delivered to Packing")));
    }
}
