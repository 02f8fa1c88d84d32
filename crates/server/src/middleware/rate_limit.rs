//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - `auth_rate_limiter`: login, registration, and code endpoints (~10/min)
//! - `admin_create_rate_limiter`: staff account creation (5 per 15 minutes)
//! - `api_rate_limiter`: everything else under `/api`
//!
//! Rejections use the same `{ success, message }` body as every other error.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

use crate::error::AppError;

/// Client IP from proxy headers, falling back to the socket peer.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

fn header_ip<T>(req: &Request<T>, name: &str) -> Option<IpAddr> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        header_ip(req, "x-forwarded-for")
            .or_else(|| header_ip(req, "x-real-ip"))
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer = GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, Body>;

/// Render a governor rejection as an API error, keeping its `Retry-After` headers.
fn rejection_response(err: GovernorError) -> Response<Body> {
    match err {
        GovernorError::TooManyRequests { headers, .. } => {
            let mut response = AppError::RateLimited.into_response();
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
        GovernorError::UnableToExtractKey => {
            AppError::Internal("unable to determine client address for rate limiting".to_string())
                .into_response()
        }
        other @ GovernorError::Other { .. } => other.into(),
    }
}

fn layer(
    config: tower_governor::governor::GovernorConfig<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>>,
) -> RateLimiterLayer {
    GovernorLayer::new(Arc::new(config)).error_handler(rejection_response)
}

/// ~10 requests per minute per IP: one token every 6 seconds, burst of 5.
///
/// # Panics
///
/// Never panics: both values are positive, which the builder always accepts.
#[must_use]
pub fn auth_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(6)
        .burst_size(5)
        .finish()
        .expect("rate limiter config with per_second(6) and burst_size(5) is valid");
    layer(config)
}

/// 5 staff accounts per 15 minutes per IP: one token every 180 seconds.
///
/// # Panics
///
/// Never panics: both values are positive, which the builder always accepts.
#[must_use]
pub fn admin_create_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(180)
        .burst_size(5)
        .finish()
        .expect("rate limiter config with per_second(180) and burst_size(5) is valid");
    layer(config)
}

/// General API: one token per second, burst of 50.
///
/// # Panics
///
/// Never panics: both values are positive, which the builder always accepts.
#[must_use]
pub fn api_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(1)
        .burst_size(50)
        .finish()
        .expect("rate limiter config with per_second(1) and burst_size(50) is valid");
    layer(config)
}
