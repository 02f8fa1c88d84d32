//! Request correlation ids.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// Header carrying the request id in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream id accepted as-is.
const MAX_UPSTREAM_LEN: usize = 128;

/// Reuse a sane upstream id, or mint a UUID v4.
fn pick_request_id(upstream: Option<&str>) -> String {
    upstream
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_UPSTREAM_LEN)
        .map_or_else(|| Uuid::new_v4().to_string(), String::from)
}

/// Tag the request span and Sentry scope with a request id and echo it back.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = pick_request_id(
        request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|h| h.to_str().ok()),
    );

    Span::current().record("request_id", &request_id);
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_id_is_kept() {
        assert_eq!(pick_request_id(Some("abc-123")), "abc-123");
    }

    #[test]
    fn test_missing_or_oversized_id_is_replaced() {
        let fresh = pick_request_id(None);
        assert!(Uuid::parse_str(&fresh).is_ok());
        let long = "x".repeat(MAX_UPSTREAM_LEN + 1);
        assert_ne!(pick_request_id(Some(&long)), long);
        assert!(Uuid::parse_str(&pick_request_id(Some("  "))).is_ok());
    }
}
