//! Category routes (`/api/categories`).
//!
//! A category is addressed by its numeric id or by its key in the same path
//! segment. Attribute items are edited in place on the category's JSON
//! attribute list. Every write drops the cached listings.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use best_wishes_core::CategoryId;

use crate::db::categories::CategoryRepository;
use crate::error::{AppError, Result};
use crate::middleware::{AdminOrInventory, RequireRole};
use crate::models::category::{Category, CategoryAttribute, CategoryDraft};
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{category}", get(show).put(update).delete(destroy))
        .route("/{category}/attributes/{attribute}/items", post(add_item))
        .route(
            "/{category}/attributes/{attribute}/items/{item}",
            get(show_item).put(rename_item).delete(remove_item),
        )
}

/// A path segment naming a category by id or key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryRef {
    Id(CategoryId),
    Key(String),
}

impl CategoryRef {
    #[must_use]
    pub fn parse(segment: &str) -> Self {
        segment
            .parse::<i32>()
            .map_or_else(|_| Self::Key(segment.to_lowercase()), |id| Self::Id(CategoryId::new(id)))
    }
}

async fn resolve(state: &AppState, segment: &str) -> Result<Category> {
    let categories = CategoryRepository::new(state.pool());
    let found = match CategoryRef::parse(segment) {
        CategoryRef::Id(id) => categories.get(id).await?,
        CategoryRef::Key(key) => categories.get_by_key(&key).await?,
    };
    found.ok_or_else(|| AppError::not_found("Category"))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub active: Option<bool>,
}

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<serde_json::Value>> {
    let categories = state.categories(params.active.unwrap_or(false)).await?;
    Ok(Json(json!({
        "success": true,
        "data": categories.as_slice(),
        "message": "Categories fetched successfully",
    })))
}

pub async fn show(
    State(state): State<AppState>,
    ApiPath(segment): ApiPath<String>,
) -> Result<Json<serde_json::Value>> {
    let category = resolve(&state, &segment).await?;
    Ok(Json(json!({ "success": true, "data": category })))
}

/// Category fields; absent fields keep their stored value on update.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
    pub key: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub attributes: Option<Vec<CategoryAttribute>>,
    pub icon: Option<String>,
    pub image: Option<String>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

impl CategoryInput {
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` when key or name is missing.
    pub fn into_draft(self, base: Option<&Category>) -> Result<CategoryDraft> {
        let key = self
            .key
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .or_else(|| base.map(|c| c.key.clone()))
            .ok_or_else(|| AppError::BadRequest("Category key is required".to_string()))?;
        if key.parse::<i32>().is_ok() {
            return Err(AppError::BadRequest(
                "Category key cannot be a number".to_string(),
            ));
        }
        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .or_else(|| base.map(|c| c.name.clone()))
            .ok_or_else(|| AppError::BadRequest("Category name is required".to_string()))?;

        Ok(CategoryDraft {
            key,
            name,
            description: self.description.or_else(|| base.and_then(|c| c.description.clone())),
            attributes: self
                .attributes
                .or_else(|| base.map(|c| c.attributes.0.clone()))
                .unwrap_or_default(),
            icon: self.icon.or_else(|| base.and_then(|c| c.icon.clone())),
            image: self.image.or_else(|| base.and_then(|c| c.image.clone())),
            is_active: self.is_active.or_else(|| base.map(|c| c.is_active)).unwrap_or(true),
            sort_order: self.sort_order.or_else(|| base.map(|c| c.sort_order)).unwrap_or(0),
        })
    }
}

#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<AdminOrInventory>,
    ApiJson(input): ApiJson<CategoryInput>,
) -> Result<impl IntoResponse> {
    let draft = input.into_draft(None)?;
    let category = CategoryRepository::new(state.pool())
        .create(&draft)
        .await
        .map_err(AppError::conflict_as_bad_request)?;
    state.invalidate_categories();
    tracing::info!(target: "audit", category = %category.key, user_id = %user.id, "Category created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": category,
            "message": "Category created successfully",
        })),
    ))
}

#[instrument(skip_all, fields(category = %segment))]
pub async fn update(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<AdminOrInventory>,
    ApiPath(segment): ApiPath<String>,
    ApiJson(input): ApiJson<CategoryInput>,
) -> Result<Json<serde_json::Value>> {
    let existing = resolve(&state, &segment).await?;
    let draft = input.into_draft(Some(&existing))?;
    let category = CategoryRepository::new(state.pool())
        .update(existing.id, &draft)
        .await
        .map_err(AppError::conflict_as_bad_request)?;
    state.invalidate_categories();
    tracing::info!(target: "audit", category = %category.key, user_id = %user.id, "Category updated");

    Ok(Json(json!({
        "success": true,
        "data": category,
        "message": "Category updated successfully",
    })))
}

#[instrument(skip_all, fields(category = %segment))]
pub async fn destroy(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<AdminOrInventory>,
    ApiPath(segment): ApiPath<String>,
) -> Result<Json<serde_json::Value>> {
    let existing = resolve(&state, &segment).await?;
    CategoryRepository::new(state.pool())
        .delete(existing.id)
        .await
        .map_err(AppError::missing("Category"))?;
    state.invalidate_categories();
    tracing::info!(target: "audit", category = %existing.key, user_id = %user.id, "Category deleted");

    Ok(Json(json!({ "success": true, "message": "Category deleted successfully" })))
}

// =============================================================================
// Attribute items
// =============================================================================

const ATTRIBUTE_NOT_FOUND: &str = "Attribute not found in this category";
const ITEM_NOT_FOUND: &str = "Item not found under this attribute";

fn attribute<'c>(category: &'c mut Category, name: &str) -> Result<&'c mut CategoryAttribute> {
    category
        .attribute_mut(name)
        .ok_or_else(|| AppError::NotFound(ATTRIBUTE_NOT_FOUND.to_string()))
}

/// Append `value` to the attribute's items.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for a blank or duplicate value.
pub fn push_item(attribute: &mut CategoryAttribute, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest("Value is required".to_string()));
    }
    if attribute.items.iter().any(|i| i == value) {
        return Err(AppError::BadRequest(
            "Value already exists in this attribute".to_string(),
        ));
    }
    attribute.items.push(value.to_string());
    Ok(value.to_string())
}

/// Replace `old` with `new` in place.
///
/// # Errors
///
/// Returns `AppError::NotFound` when `old` is absent and
/// `AppError::BadRequest` when `new` is blank or taken.
pub fn rename(attribute: &mut CategoryAttribute, old: &str, new: &str) -> Result<String> {
    let new = new.trim();
    if new.is_empty() {
        return Err(AppError::BadRequest("New value is required".to_string()));
    }
    let index = attribute
        .items
        .iter()
        .position(|i| i == old)
        .ok_or_else(|| AppError::NotFound(ITEM_NOT_FOUND.to_string()))?;
    if new != old && attribute.items.iter().any(|i| i == new) {
        return Err(AppError::BadRequest(
            "New value already exists in this attribute".to_string(),
        ));
    }
    attribute.items[index] = new.to_string();
    Ok(new.to_string())
}

/// Remove `item`.
///
/// # Errors
///
/// Returns `AppError::NotFound` when the item is absent.
pub fn remove(attribute: &mut CategoryAttribute, item: &str) -> Result<()> {
    let index = attribute
        .items
        .iter()
        .position(|i| i == item)
        .ok_or_else(|| AppError::NotFound(ITEM_NOT_FOUND.to_string()))?;
    attribute.items.remove(index);
    Ok(())
}

async fn save_attributes(state: &AppState, category: &Category) -> Result<()> {
    CategoryRepository::new(state.pool())
        .set_attributes(category.id, &category.attributes.0)
        .await?;
    state.invalidate_categories();
    Ok(())
}

pub async fn show_item(
    State(state): State<AppState>,
    ApiPath((segment, name, item)): ApiPath<(String, String, String)>,
) -> Result<Json<serde_json::Value>> {
    let mut category = resolve(&state, &segment).await?;
    let attribute = attribute(&mut category, &name)?;
    if !attribute.items.contains(&item) {
        return Err(AppError::NotFound(ITEM_NOT_FOUND.to_string()));
    }
    Ok(Json(json!({
        "success": true,
        "message": "Item found under attribute",
        "data": { "category": segment, "attribute": name, "item": item },
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRequest {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameItemRequest {
    #[serde(default)]
    pub new_value: String,
}

#[instrument(skip_all, fields(category = %segment, attribute = %name))]
pub async fn add_item(
    State(state): State<AppState>,
    RequireRole(_user, _): RequireRole<AdminOrInventory>,
    ApiPath((segment, name)): ApiPath<(String, String)>,
    ApiJson(body): ApiJson<ItemRequest>,
) -> Result<Json<serde_json::Value>> {
    let mut category = resolve(&state, &segment).await?;
    let added = push_item(attribute(&mut category, &name)?, &body.value)?;
    save_attributes(&state, &category).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Value added to attribute successfully",
        "data": { "category": segment, "attribute": name, "addedValue": added },
    })))
}

#[instrument(skip_all, fields(category = %segment, attribute = %name))]
pub async fn rename_item(
    State(state): State<AppState>,
    RequireRole(_user, _): RequireRole<AdminOrInventory>,
    ApiPath((segment, name, item)): ApiPath<(String, String, String)>,
    ApiJson(body): ApiJson<RenameItemRequest>,
) -> Result<Json<serde_json::Value>> {
    let mut category = resolve(&state, &segment).await?;
    let renamed = rename(attribute(&mut category, &name)?, &item, &body.new_value)?;
    save_attributes(&state, &category).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Value updated successfully",
        "data": {
            "category": segment,
            "attribute": name,
            "oldValue": item,
            "newValue": renamed,
        },
    })))
}

#[instrument(skip_all, fields(category = %segment, attribute = %name))]
pub async fn remove_item(
    State(state): State<AppState>,
    RequireRole(_user, _): RequireRole<AdminOrInventory>,
    ApiPath((segment, name, item)): ApiPath<(String, String, String)>,
) -> Result<Json<serde_json::Value>> {
    let mut category = resolve(&state, &segment).await?;
    remove(attribute(&mut category, &name)?, &item)?;
    save_attributes(&state, &category).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Item deleted from attribute",
        "data": { "category": segment, "attribute": name, "deletedItem": item },
    })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn colors() -> CategoryAttribute {
        CategoryAttribute {
            name: "color".to_string(),
            display_name: "Color".to_string(),
            items: vec!["red".to_string(), "blue".to_string()],
        }
    }

    #[test]
    fn test_category_ref_parse() {
        assert_eq!(CategoryRef::parse("12"), CategoryRef::Id(CategoryId::new(12)));
        assert_eq!(CategoryRef::parse("Mugs"), CategoryRef::Key("mugs".to_string()));
    }

    #[test]
    fn test_push_item() {
        let mut attr = colors();
        assert_eq!(push_item(&mut attr, " green ").unwrap(), "green");
        assert_eq!(attr.items.len(), 3);
        assert!(matches!(push_item(&mut attr, "red"), Err(AppError::BadRequest(_))));
        assert!(matches!(push_item(&mut attr, "  "), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_rename_item() {
        let mut attr = colors();
        assert_eq!(rename(&mut attr, "red", "crimson").unwrap(), "crimson");
        assert_eq!(attr.items, vec!["crimson", "blue"]);
        assert!(matches!(rename(&mut attr, "pink", "rose"), Err(AppError::NotFound(_))));
        assert!(matches!(rename(&mut attr, "crimson", "blue"), Err(AppError::BadRequest(_))));
        assert!(rename(&mut attr, "blue", "blue").is_ok());
    }

    #[test]
    fn test_remove_item() {
        let mut attr = colors();
        remove(&mut attr, "red").unwrap();
        assert_eq!(attr.items, vec!["blue"]);
        assert!(matches!(remove(&mut attr, "red"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_input_requires_non_numeric_key() {
        let input = CategoryInput {
            key: Some("42".to_string()),
            name: Some("Answer".to_string()),
            ..CategoryInput::default()
        };
        assert!(input.into_draft(None).is_err());

        let draft = CategoryInput {
            key: Some(" Mugs ".to_string()),
            name: Some("Mugs".to_string()),
            ..CategoryInput::default()
        }
        .into_draft(None)
        .unwrap();
        assert_eq!(draft.key, "mugs");
        assert!(draft.is_active);
    }
}
