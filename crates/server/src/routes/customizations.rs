//! Customization routes (`/api/customization`).

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use best_wishes_core::{
    CustomizationId, CustomizationStatus, CustomizationType, ProductId, QuoteCategory, QuoteType, Role,
};

use crate::db::Page;
use crate::db::customizations::CustomizationRepository;
use crate::db::products::ProductRepository;
use crate::db::quotes::QuoteRepository;
use crate::error::{AppError, Result};
use crate::middleware::{AdminOnly, RequireAuth, RequireRole};
use crate::models::customization::{CustomizationDesign, CustomizationView};
use crate::models::product::Product;
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery, parse_status};
use crate::state::AppState;

const ADMIN_PAGE_SIZE: i64 = 20;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(save))
        .route("/quotes", get(quotes))
        .route("/quotes/categories", get(quote_categories))
        .route("/products", get(products))
        .route("/my-customizations", get(mine))
        .route("/admin/all", get(admin_all))
        .route("/admin/{id}/status", patch(admin_status))
        .route("/{id}", get(get_one).delete(remove))
}

/// Parse an optional label filter. Blank or `all` means no filter.
fn optional_label<T: std::str::FromStr>(raw: Option<&str>, what: &str) -> Result<Option<T>> {
    match raw.map(str::trim).filter(|s| !s.is_empty() && *s != "all") {
        None => Ok(None),
        Some(label) => label
            .parse()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("Invalid {what}"))),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteQuery {
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub quote_type: Option<String>,
}

pub async fn quotes(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<QuoteQuery>,
) -> Result<Json<serde_json::Value>> {
    let category: Option<QuoteCategory> = optional_label(query.category.as_deref(), "category")?;
    let quote_type: Option<QuoteType> = optional_label(query.quote_type.as_deref(), "type")?;
    let quotes = QuoteRepository::new(state.pool()).list(category, quote_type).await?;
    Ok(Json(json!({ "success": true, "quotes": quotes })))
}

pub async fn quote_categories(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let categories = QuoteRepository::new(state.pool()).categories().await?;
    Ok(Json(json!({ "success": true, "categories": categories })))
}

#[derive(Debug, Default, Deserialize)]
pub struct TypeQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

pub async fn products(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TypeQuery>,
) -> Result<Json<serde_json::Value>> {
    let kind: Option<CustomizationType> = optional_label(query.kind.as_deref(), "customization type")?;
    let products = ProductRepository::new(state.pool()).customizable(kind).await?;
    Ok(Json(json!({ "success": true, "products": products })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveCustomizationRequest {
    pub product_id: ProductId,
    pub customization_type: Option<CustomizationType>,
    #[serde(flatten)]
    pub design: CustomizationDesign,
}

/// The surface to customize: the request's choice, else the product's own.
///
/// # Errors
///
/// Returns `AppError::BadRequest` if the product is not customizable.
pub fn customization_type_for(product: &Product, requested: Option<CustomizationType>) -> Result<CustomizationType> {
    if !product.is_customizable {
        return Err(AppError::BadRequest("This product is not customizable".to_string()));
    }
    requested
        .or(product.customization_type)
        .ok_or_else(|| AppError::BadRequest("Customization type is required".to_string()))
}

/// Create or replace the caller's draft for a product.
#[instrument(skip_all, fields(product_id = %body.product_id))]
pub async fn save(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<SaveCustomizationRequest>,
) -> Result<impl IntoResponse> {
    body.design.validate().map_err(AppError::BadRequest)?;
    let product = ProductRepository::new(state.pool())
        .get(body.product_id)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;
    let kind = customization_type_for(&product, body.customization_type)?;
    let price = product.price() + product.customization_price;

    let customization = CustomizationRepository::new(state.pool())
        .upsert_draft(user.id, product.id, kind, &body.design, price)
        .await?;

    if let Some(quote) = &body.design.selected_quote
        && let Err(e) = QuoteRepository::new(state.pool()).increment_usage(quote.id).await
    {
        tracing::warn!(error = %e, quote_id = %quote.id, "Failed to bump quote usage");
    }
    tracing::info!(customization_id = %customization.id, user_id = %user.id, "Customization saved");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Customization saved successfully",
            "customization": CustomizationView::from(customization),
        })),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

pub async fn mine(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiQuery(query): ApiQuery<StatusQuery>,
) -> Result<Json<serde_json::Value>> {
    let status: Option<CustomizationStatus> = optional_label(query.status.as_deref(), "status")?;
    let rows = CustomizationRepository::new(state.pool())
        .for_user(user.id, status)
        .await?;
    let customizations: Vec<CustomizationView> = rows.into_iter().map(Into::into).collect();
    Ok(Json(json!({ "success": true, "customizations": customizations })))
}

pub async fn get_one(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<CustomizationId>,
) -> Result<Json<serde_json::Value>> {
    let customization = CustomizationRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("Customization"))?;
    if customization.user_id != user.id && user.role != Role::Admin {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }
    Ok(Json(json!({
        "success": true,
        "customization": CustomizationView::from(customization),
    })))
}

pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<CustomizationId>,
) -> Result<Json<serde_json::Value>> {
    CustomizationRepository::new(state.pool())
        .delete_draft(id, user.id)
        .await
        .map_err(AppError::missing("Customization"))?;
    Ok(Json(json!({ "success": true, "message": "Customization deleted successfully" })))
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

pub async fn admin_all(
    State(state): State<AppState>,
    RequireRole(_admin, _): RequireRole<AdminOnly>,
    ApiQuery(query): ApiQuery<AdminListQuery>,
) -> Result<Json<serde_json::Value>> {
    let status: Option<CustomizationStatus> = optional_label(query.status.as_deref(), "status")?;
    let kind: Option<CustomizationType> = optional_label(query.kind.as_deref(), "customization type")?;
    let page = Page::new(query.page, query.limit, ADMIN_PAGE_SIZE);
    let (rows, total) = CustomizationRepository::new(state.pool())
        .list_all(status, kind, page)
        .await?;
    let customizations: Vec<CustomizationView> = rows.into_iter().map(Into::into).collect();

    Ok(Json(json!({
        "success": true,
        "customizations": customizations,
        "pagination": {
            "currentPage": page.page,
            "totalPages": page.total_pages(total),
            "totalItems": total,
        },
    })))
}

#[derive(Debug, Deserialize)]
pub struct AdminStatusRequest {
    pub status: String,
}

#[instrument(skip_all, fields(customization_id = %id))]
pub async fn admin_status(
    State(state): State<AppState>,
    RequireRole(admin, _): RequireRole<AdminOnly>,
    ApiPath(id): ApiPath<CustomizationId>,
    ApiJson(body): ApiJson<AdminStatusRequest>,
) -> Result<Json<serde_json::Value>> {
    let status: CustomizationStatus = parse_status(&body.status)?;
    let customization = CustomizationRepository::new(state.pool())
        .set_status(id, status)
        .await
        .map_err(AppError::missing("Customization"))?;
    tracing::info!(target: "audit", customization_id = %id, user_id = %admin.id, to = %status, "Customization status updated");

    Ok(Json(json!({
        "success": true,
        "message": format!("Customization status updated to {status}"),
        "customization": CustomizationView::from(customization),
    })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_label() {
        let none: Option<QuoteType> = optional_label(Some("all"), "type").unwrap();
        assert_eq!(none, None);
        let blank: Option<QuoteType> = optional_label(Some(" "), "type").unwrap();
        assert_eq!(blank, None);
        let mug: Option<QuoteType> = optional_label(Some("mug"), "type").unwrap();
        assert_eq!(mug, Some(QuoteType::Mug));
        assert!(optional_label::<QuoteType>(Some("poster"), "type").is_err());
    }

    #[test]
    fn test_save_request_flattens_design() {
        let body: SaveCustomizationRequest = serde_json::from_value(json!({
            "productId": 5,
            "customizationType": "mug",
            "customMessage": "Happy birthday",
        }))
        .unwrap();
        assert_eq!(body.customization_type, Some(CustomizationType::Mug));
        assert_eq!(body.design.custom_message.as_deref(), Some("Happy birthday"));
        assert_eq!(body.design.font_size, 14);
    }
}
