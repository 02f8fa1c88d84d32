//! Occasion recommendation routes (`/api/recommendations`).

use axum::{Json, Router, extract::State, routing::get};
use serde::Deserialize;
use serde_json::json;

use best_wishes_core::Occasion;

use crate::error::{AppError, Result};
use crate::routes::extract::ApiQuery;
use crate::services::recommendations::{self, DEFAULT_LIMIT, occasion_options};
use crate::state::AppState;

/// Largest page of recommendations a client may ask for.
const MAX_LIMIT: usize = 20;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(recommend))
        .route("/occasions", get(occasions))
}

pub async fn occasions() -> Json<serde_json::Value> {
    Json(json!({ "success": true, "occasions": occasion_options() }))
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendQuery {
    pub occasion: Option<String>,
    pub limit: Option<usize>,
}

impl RecommendQuery {
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an unknown occasion.
    pub fn resolve(&self) -> Result<(Occasion, usize)> {
        let occasion = match self.occasion.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Occasion::default(),
            Some(label) => label
                .parse()
                .map_err(|_| AppError::BadRequest(format!("Unknown occasion: {label}")))?,
        };
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        Ok((occasion, limit))
    }
}

pub async fn recommend(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RecommendQuery>,
) -> Result<Json<serde_json::Value>> {
    let (occasion, limit) = query.resolve()?;
    let products =
        recommendations::recommend(state.pool(), occasion, limit, &state.config().frontend_url).await?;
    Ok(Json(json!({
        "success": true,
        "occasion": occasion,
        "occasionName": occasion.display_name(),
        "recommendations": products,
    })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let (occasion, limit) = RecommendQuery::default().resolve().unwrap();
        assert_eq!(occasion, Occasion::default());
        assert_eq!(limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_limit_is_clamped() {
        let query = RecommendQuery {
            occasion: Some("birthday".to_string()),
            limit: Some(500),
        };
        let (occasion, limit) = query.resolve().unwrap();
        assert_eq!(occasion, Occasion::Birthday);
        assert_eq!(limit, MAX_LIMIT);
    }

    #[test]
    fn test_unknown_occasion() {
        let query = RecommendQuery {
            occasion: Some("halloween".to_string()),
            limit: None,
        };
        assert!(query.resolve().is_err());
    }
}
