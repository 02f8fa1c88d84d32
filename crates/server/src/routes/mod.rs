//! HTTP route handlers for the JSON API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Liveness
//! GET  /health/ready                        - Readiness (database ping)
//!
//! # Accounts (mounted at /api)
//! POST /api/register | /api/login | /api/logout
//! POST /api/otp | /api/verify-otp            - Login one-time codes
//! POST /api/forgot-password | /api/verify-reset-code | /api/reset-password
//! GET  /api/myprofile                       - Current user
//! PUT  /api/updateprofile | /api/changepassword | /api/twoFactor
//!
//! # Catalog
//! /api/products                             - Listing, filters, CRUD, stock reduction
//! /api/categories                           - Categories and attribute items
//! /api/recommendations                      - Occasion picks
//! /api/chatbot                              - Gift-finder conversation
//!
//! # Purchasing
//! /api/orders                               - Orders and status changes
//! /api/surprise                             - Surprise gifts
//! /api/collaborative-purchases              - Split payments
//! /api/gift                                 - Gift contributions
//! /api/customization                        - Personalised designs and quotes
//!
//! # Staff
//! /api/delivery                             - Delivery dashboard
//! /api/order-summaries                      - Offline sales records and analytics
//! /api/admin/users                          - Staff accounts
//!
//! # Engagement
//! /api/notifications                        - Inbox and live stream (SSE)
//! /api/feedback                             - Product reviews
//! /api/events                               - Occasion calendar
//! /api/reminder                             - Event reminders
//! ```

pub mod admin_users;
pub mod auth;
pub mod categories;
pub mod chatbot;
pub mod collaborative;
pub mod customizations;
pub mod delivery;
pub mod events;
pub mod extract;
pub mod feedback;
pub mod gift;
pub mod notifications;
pub mod order_summaries;
pub mod orders;
pub mod products;
pub mod recommendations;
pub mod reminders;
pub mod surprise_gifts;

use axum::Router;

use crate::middleware::api_rate_limiter;
use crate::state::AppState;

/// Every `/api` route group.
fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .nest("/products", products::router())
        .nest("/categories", categories::router())
        .nest("/orders", orders::router())
        .nest("/delivery", delivery::router())
        .nest("/surprise", surprise_gifts::router())
        .nest("/collaborative-purchases", collaborative::router())
        .nest("/gift", gift::router())
        .nest("/order-summaries", order_summaries::router())
        .nest("/notifications", notifications::router())
        .nest("/feedback", feedback::router())
        .nest("/customization", customizations::router())
        .nest("/events", events::router())
        .nest("/reminder", reminders::router())
        .nest("/recommendations", recommendations::router())
        .nest("/chatbot", chatbot::router())
        .nest("/admin/users", admin_users::router())
}

/// Build the complete API router.
pub fn routes() -> Router<AppState> {
    Router::new().nest("/api", api_routes().layer(api_rate_limiter()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use secrecy::SecretString;
    use serde_json::Value;
    use sqlx::PgPool;
    use tower::ServiceExt;

    use super::*;
    use crate::config::ServerConfig;
    use crate::services::email::EmailService;

    /// State whose pool never connects; only routes that skip the database
    /// can be exercised with it.
    fn offline_state() -> AppState {
        let config = ServerConfig {
            database_url: SecretString::from("postgres://localhost/unused"),
            host: "127.0.0.1".parse().unwrap(),
            port: 5000,
            base_url: "http://localhost:5000".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("k9#Vq2!mZ7$wR4@tL8^pX1&nB6*cH3%d"),
            cors_origins: vec!["http://localhost:3000".to_string()],
            reminder_interval: Duration::from_secs(60),
            email: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };
        let pool = PgPool::connect_lazy("postgres://localhost/unused").unwrap();
        AppState::new(config, pool, EmailService::log_only())
    }

    async fn call(method: &str, uri: &str) -> (StatusCode, Value) {
        let app = routes().with_state(offline_state());
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_occasions_are_served_without_database() {
        let (status, body) = call("GET", "/api/recommendations/occasions").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], Value::Bool(true));
        assert!(body["occasions"].as_array().is_some_and(|o| !o.is_empty()));
    }

    #[tokio::test]
    async fn test_chatbot_start() {
        let (status, body) = call("POST", "/api/chatbot/start").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["state"], Value::String("occasion".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_occasion_is_bad_request() {
        let (status, body) = call("GET", "/api/recommendations?occasion=halloween").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], Value::Bool(false));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (status, _) = call("GET", "/api/does-not-exist").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
