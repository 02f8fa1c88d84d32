//! Order summary routes (`/api/order-summaries`).

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{Duration, NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use best_wishes_core::{OrderSummaryKind, ProductId};

use crate::db::order_summaries::OrderSummaryRepository;
use crate::db::products::ProductRepository;
use crate::error::{AppError, Result};
use crate::middleware::{AdminOnly, AdminOrInventory, RequireRole};
use crate::models::order_summary::{NewOrderSummary, SummaryAnalytics, SummaryFilter};
use crate::models::product::Product;
use crate::routes::extract::{ApiJson, ApiQuery, parse_status};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/all", get(all))
        .route("/analytics", get(analytics))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub source_id: i32,
    pub product_id: ProductId,
    pub quantity: i32,
    pub sale_price: Option<Decimal>,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSummariesRequest {
    #[serde(default)]
    pub records: Vec<SummaryRecord>,
}

impl SummaryRecord {
    /// Price the record from its product.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a bad quantity, price or kind.
    pub fn into_new(self, product: &Product) -> Result<NewOrderSummary> {
        if self.quantity < 1 {
            return Err(AppError::BadRequest("Quantity must be at least 1".to_string()));
        }
        let kind: OrderSummaryKind = parse_status(&self.status)?;
        let sale_price = self.sale_price.unwrap_or_else(|| product.price());
        if sale_price.is_sign_negative() {
            return Err(AppError::BadRequest("Sale price cannot be negative".to_string()));
        }
        Ok(NewOrderSummary {
            source_id: self.source_id,
            kind,
            product_id: product.id,
            product_sku: product.sku.clone(),
            product_name: product.name.clone(),
            quantity: self.quantity,
            cost_price: product.cost_price,
            retail_price: product.retail_price,
            sale_price,
        })
    }
}

#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<AdminOrInventory>,
    ApiJson(body): ApiJson<CreateSummariesRequest>,
) -> Result<impl IntoResponse> {
    if body.records.is_empty() {
        return Err(AppError::BadRequest("Records array is required".to_string()));
    }

    let ids: Vec<ProductId> = body.records.iter().map(|r| r.product_id).collect();
    let products: HashMap<ProductId, Product> = ProductRepository::new(state.pool())
        .get_many(&ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut records = Vec::with_capacity(body.records.len());
    for record in body.records {
        let product = products
            .get(&record.product_id)
            .ok_or_else(|| AppError::NotFound(format!("Product with ID {} not found", record.product_id)))?;
        records.push(record.into_new(product)?);
    }

    let created = OrderSummaryRepository::new(state.pool())
        .create_many(&records)
        .await?;
    tracing::info!(target: "audit", user_id = %user.id, count = created.len(), "Order summaries created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Order summaries created",
            "summaries": created,
        })),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    pub source_id: Option<i32>,
    pub product_id: Option<ProductId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl From<SummaryQuery> for SummaryFilter {
    fn from(query: SummaryQuery) -> Self {
        Self {
            source_id: query.source_id,
            product_id: query.product_id,
            start: query.start_date.map(|d| d.and_time(NaiveTime::MIN).and_utc()),
            // the whole end day is included
            end: query
                .end_date
                .map(|d| d.and_time(NaiveTime::MIN).and_utc() + Duration::days(1) - Duration::microseconds(1)),
        }
    }
}

pub async fn all(
    State(state): State<AppState>,
    RequireRole(_user, _): RequireRole<AdminOrInventory>,
    ApiQuery(query): ApiQuery<SummaryQuery>,
) -> Result<Json<serde_json::Value>> {
    let summaries = OrderSummaryRepository::new(state.pool())
        .list(&query.into())
        .await?;
    Ok(Json(json!({
        "success": true,
        "count": summaries.len(),
        "summaries": summaries,
    })))
}

pub async fn analytics(
    State(state): State<AppState>,
    RequireRole(_admin, _): RequireRole<AdminOnly>,
    ApiQuery(query): ApiQuery<SummaryQuery>,
) -> Result<Json<serde_json::Value>> {
    let summaries = OrderSummaryRepository::new(state.pool())
        .list(&query.into())
        .await?;
    let analytics = SummaryAnalytics::from_rows(&summaries);
    Ok(Json(json!({ "success": true, "analytics": analytics })))
}
