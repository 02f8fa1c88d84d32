//! Request extractors that reject with the API's JSON error shape.

use axum::extract::{
    FromRequest, FromRequestParts,
    rejection::{JsonRejection, PathRejection, QueryRejection},
};

use crate::error::AppError;

/// `axum::Json` with a 400 `{success: false, message}` rejection.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` with the API's rejection.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// `axum::extract::Path` with the API's rejection.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Trimmed value of a required text field, or `None` when absent or blank.
#[must_use]
pub fn required(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parse a status label from a request body.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for unknown labels.
pub fn parse_status<S: std::str::FromStr>(label: &str) -> Result<S, AppError> {
    label
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid status value".to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use best_wishes_core::{OrderStatus, SurpriseGiftStatus};

    #[test]
    fn test_parse_status_labels() {
        let status: OrderStatus = parse_status(" Packing ").unwrap();
        assert_eq!(status, OrderStatus::Packing);
        let gift: SurpriseGiftStatus = parse_status("OutForDelivery").unwrap();
        assert_eq!(gift, SurpriseGiftStatus::OutForDelivery);
        assert!(parse_status::<OrderStatus>("packed").is_err());
    }

    #[test]
    fn test_required_rejects_blank() {
        assert_eq!(required(Some("  hi ")), Some("hi"));
        assert_eq!(required(Some("   ")), None);
        assert_eq!(required(None), None);
    }
}
