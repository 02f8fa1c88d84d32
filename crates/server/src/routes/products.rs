//! Product catalog routes (`/api/products`).

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use best_wishes_core::{
    CustomizationType, ProductId, ProductStatus, ShippingClass, TaxClass,
};

use crate::db::products::{ProductQuery, ProductRepository, ProductSort};
use crate::db::{Page, stock};
use crate::error::{AppError, Result};
use crate::middleware::{AdminOrInventory, RequireRole};
use crate::models::product::{Product, ProductDraft, ProductFilters, ProductView, StockRequest};
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 10;
const SEO_TITLE_MAX_CHARS: usize = 60;
const ATTRIBUTE_PREFIX: &str = "attributes.";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/filter", get(list))
        .route("/reduce-stock", put(reduce_stock))
        .route("/{id}", get(show).put(update).delete(destroy))
}

// =============================================================================
// Listing
// =============================================================================

/// Turn raw query pairs into a listing query and page.
fn parse_listing(params: &BTreeMap<String, String>) -> (ProductQuery, Page) {
    let number = |key: &str| params.get(key).and_then(|v| v.parse::<i64>().ok());
    let page = Page::new(number("page"), number("limit"), DEFAULT_PAGE_SIZE);

    let attributes = params
        .iter()
        .filter_map(|(key, value)| {
            let name = key.strip_prefix(ATTRIBUTE_PREFIX)?;
            let values: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
                .collect();
            (!name.is_empty() && !values.is_empty()).then(|| (name.to_string(), values))
        })
        .collect();

    let query = ProductQuery {
        search: params.get("search").cloned(),
        category: params.get("category").filter(|c| !c.is_empty()).cloned(),
        status: params.get("status").and_then(|s| s.parse::<ProductStatus>().ok()),
        attributes,
        sort: params
            .get("sortBy")
            .map_or(ProductSort::CreatedAt, |s| ProductSort::parse(s)),
        descending: params.get("sortOrder").is_none_or(|o| o != "asc"),
    };
    (query, page)
}

#[instrument(skip_all)]
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<BTreeMap<String, String>>,
) -> Result<Json<serde_json::Value>> {
    let (query, page) = parse_listing(&params);
    let (products, total) = ProductRepository::new(state.pool()).list(&query, page).await?;
    let data: Vec<ProductView> = products.into_iter().map(ProductView::from).collect();

    Ok(Json(json!({
        "success": true,
        "data": data,
        "pagination": {
            "page": page.page,
            "limit": page.limit,
            "total": total,
            "pages": page.total_pages(total),
        },
    })))
}

pub async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<serde_json::Value>> {
    let product = ProductRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;
    Ok(Json(json!({ "success": true, "data": ProductView::from(product) })))
}

// =============================================================================
// Writes
// =============================================================================

/// Product fields as sent by the admin UI. On update, absent fields keep
/// their stored value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub short_description: Option<String>,
    pub detailed_description: Option<String>,
    pub main_category: Option<String>,
    pub filters: Option<ProductFilters>,
    pub tags: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
    pub cost_price: Option<Decimal>,
    pub retail_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub stock: Option<i32>,
    pub tax_class: Option<TaxClass>,
    pub shipping_class: Option<ShippingClass>,
    pub status: Option<ProductStatus>,
    pub featured: Option<bool>,
    pub is_customizable: Option<bool>,
    pub customization_type: Option<CustomizationType>,
    pub customization_price: Option<Decimal>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn missing(field: &str) -> AppError {
    AppError::BadRequest(format!("{field} is required"))
}

impl ProductInput {
    /// Validate and normalize into a draft, filling gaps from `base`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` naming the first invalid field.
    pub fn into_draft(self, base: Option<&Product>) -> Result<ProductDraft> {
        let name = non_blank(self.name)
            .or_else(|| base.map(|p| p.name.clone()))
            .ok_or_else(|| missing("Name"))?;
        let sku = non_blank(self.sku)
            .or_else(|| base.map(|p| p.sku.clone()))
            .ok_or_else(|| missing("SKU"))?
            .to_uppercase();
        let short_description = non_blank(self.short_description)
            .or_else(|| base.map(|p| p.short_description.clone()))
            .ok_or_else(|| missing("Short description"))?;
        let cost_price = self
            .cost_price
            .or_else(|| base.map(|p| p.cost_price))
            .ok_or_else(|| missing("Cost price"))?;
        let retail_price = self
            .retail_price
            .or_else(|| base.map(|p| p.retail_price))
            .ok_or_else(|| missing("Retail price"))?;
        let stock = self
            .stock
            .or_else(|| base.map(|p| p.stock))
            .ok_or_else(|| missing("Stock"))?;
        let sale_price = self.sale_price.or_else(|| base.and_then(|p| p.sale_price));
        let customization_price = self
            .customization_price
            .or_else(|| base.map(|p| p.customization_price))
            .unwrap_or(Decimal::ZERO);

        if stock < 0 {
            return Err(AppError::BadRequest("Stock cannot be negative".to_string()));
        }
        let prices = [Some(cost_price), Some(retail_price), sale_price, Some(customization_price)];
        if prices.iter().flatten().any(|p| p.is_sign_negative()) {
            return Err(AppError::BadRequest("Prices cannot be negative".to_string()));
        }

        let seo_title = non_blank(self.seo_title)
            .or_else(|| base.and_then(|p| p.seo_title.clone()))
            .unwrap_or_else(|| name.chars().take(SEO_TITLE_MAX_CHARS).collect());
        let seo_description = non_blank(self.seo_description)
            .or_else(|| base.and_then(|p| p.seo_description.clone()))
            .unwrap_or_else(|| short_description.clone());

        Ok(ProductDraft {
            detailed_description: self
                .detailed_description
                .or_else(|| base.and_then(|p| p.detailed_description.clone())),
            main_category: non_blank(self.main_category)
                .or_else(|| base.and_then(|p| p.main_category.clone())),
            filters: self
                .filters
                .or_else(|| base.map(|p| p.filters.0.clone()))
                .unwrap_or_default(),
            tags: self.tags.or_else(|| base.map(|p| p.tags.clone())).unwrap_or_default(),
            images: self
                .images
                .or_else(|| base.map(|p| p.images.clone()))
                .unwrap_or_default(),
            tax_class: self.tax_class.or_else(|| base.map(|p| p.tax_class)).unwrap_or_default(),
            shipping_class: self
                .shipping_class
                .or_else(|| base.map(|p| p.shipping_class))
                .unwrap_or_default(),
            status: self.status.or_else(|| base.map(|p| p.status)).unwrap_or_default(),
            featured: self.featured.or_else(|| base.map(|p| p.featured)).unwrap_or(false),
            is_customizable: self
                .is_customizable
                .or_else(|| base.map(|p| p.is_customizable))
                .unwrap_or(false),
            customization_type: self
                .customization_type
                .or_else(|| base.and_then(|p| p.customization_type)),
            name,
            sku,
            short_description,
            cost_price,
            retail_price,
            sale_price,
            stock,
            customization_price,
            seo_title,
            seo_description,
        })
    }
}

#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<AdminOrInventory>,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<impl IntoResponse> {
    let draft = input.into_draft(None)?;
    let product = ProductRepository::new(state.pool())
        .create(&draft)
        .await
        .map_err(AppError::conflict_as_bad_request)?;
    tracing::info!(target: "audit", product_id = %product.id, user_id = %user.id, "Product created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Product created",
            "data": ProductView::from(product),
        })),
    ))
}

#[instrument(skip_all, fields(product_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<AdminOrInventory>,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<Json<serde_json::Value>> {
    let products = ProductRepository::new(state.pool());
    let existing = products
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;
    let draft = input.into_draft(Some(&existing))?;
    let product = products.update(id, &draft).await.map_err(AppError::conflict_as_bad_request)?;
    tracing::info!(target: "audit", product_id = %id, user_id = %user.id, "Product updated");

    Ok(Json(json!({
        "success": true,
        "message": "Product updated",
        "data": ProductView::from(product),
    })))
}

#[instrument(skip_all, fields(product_id = %id))]
pub async fn destroy(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<AdminOrInventory>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<serde_json::Value>> {
    ProductRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(AppError::missing("Product"))?;
    tracing::info!(target: "audit", product_id = %id, user_id = %user.id, "Product deleted");
    Ok(Json(json!({ "success": true, "message": "Product deleted" })))
}

#[derive(Debug, Deserialize)]
pub struct ReduceStockRequest {
    #[serde(default)]
    pub items: Vec<StockRequest>,
}

/// Decrement stock for several products at once, all or nothing.
#[instrument(skip_all)]
pub async fn reduce_stock(
    State(state): State<AppState>,
    RequireRole(_user, _): RequireRole<AdminOrInventory>,
    ApiJson(body): ApiJson<ReduceStockRequest>,
) -> Result<Json<serde_json::Value>> {
    if body.items.is_empty() {
        return Err(AppError::BadRequest("Items array is required".to_string()));
    }

    let updated = stock::reduce(state.pool(), &body.items).await?;
    tracing::info!(lines = updated.len(), "Stock reduced");

    Ok(Json(json!({
        "success": true,
        "message": "Stock reduced successfully",
        "totalItemsUpdated": updated.len(),
        "updatedItems": updated,
        "insufficientStockItems": [],
    })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::product::fixtures;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn minimal_input() -> ProductInput {
        ProductInput {
            name: Some("Star Mug".to_string()),
            sku: Some(" mug-01 ".to_string()),
            short_description: Some("A mug with stars".to_string()),
            cost_price: Some(Decimal::from(4)),
            retail_price: Some(Decimal::from(12)),
            stock: Some(15),
            ..ProductInput::default()
        }
    }

    #[test]
    fn test_listing_defaults() {
        let (query, page) = parse_listing(&BTreeMap::new());
        assert_eq!(page, Page { page: 1, limit: 10 });
        assert_eq!(query.sort, ProductSort::CreatedAt);
        assert!(query.descending);
        assert!(query.attributes.is_empty());
    }

    #[test]
    fn test_listing_parses_attributes_and_sort() {
        let (query, page) = parse_listing(&params(&[
            ("attributes.color", "red, blue,"),
            ("attributes.size", ""),
            ("sortBy", "price"),
            ("sortOrder", "asc"),
            ("limit", "500"),
            ("status", "active"),
        ]));
        assert_eq!(query.attributes.get("color").unwrap(), &vec!["red", "blue"]);
        assert!(!query.attributes.contains_key("size"));
        assert_eq!(query.sort, ProductSort::Price);
        assert!(!query.descending);
        assert_eq!(query.status, Some(ProductStatus::Active));
        assert_eq!(page.limit, Page::MAX_LIMIT);
    }

    #[test]
    fn test_draft_normalizes_and_derives_seo() {
        let draft = minimal_input().into_draft(None).unwrap();
        assert_eq!(draft.sku, "MUG-01");
        assert_eq!(draft.seo_title, "Star Mug");
        assert_eq!(draft.seo_description, "A mug with stars");
        assert_eq!(draft.status, ProductStatus::Draft);
    }

    #[test]
    fn test_draft_seo_title_truncated() {
        let mut input = minimal_input();
        input.name = Some("x".repeat(80));
        let draft = input.into_draft(None).unwrap();
        assert_eq!(draft.seo_title.chars().count(), SEO_TITLE_MAX_CHARS);
    }

    #[test]
    fn test_draft_rejects_missing_and_negative() {
        let mut input = minimal_input();
        input.sku = Some("  ".to_string());
        assert!(matches!(input.into_draft(None), Err(AppError::BadRequest(m)) if m == "SKU is required"));

        let mut input = minimal_input();
        input.stock = Some(-1);
        assert!(input.into_draft(None).is_err());

        let mut input = minimal_input();
        input.sale_price = Some(Decimal::from(-2));
        assert!(input.into_draft(None).is_err());
    }

    #[test]
    fn test_update_keeps_stored_fields() {
        let base = fixtures::product(3, "Card", "8", Some("6"));
        let input = ProductInput {
            stock: Some(0),
            ..ProductInput::default()
        };
        let draft = input.into_draft(Some(&base)).unwrap();
        assert_eq!(draft.name, "Card");
        assert_eq!(draft.sku, "SKU-3");
        assert_eq!(draft.sale_price, Some(Decimal::from(6)));
        assert_eq!(draft.stock, 0);
    }
}
