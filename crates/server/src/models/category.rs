//! Product categories and their filterable attributes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use best_wishes_core::CategoryId;

/// A filterable attribute of a category, e.g. `color` with its allowed values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAttribute {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub items: Vec<String>,
}

/// A category row.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub attributes: Json<Vec<CategoryAttribute>>,
    pub icon: Option<String>,
    pub image: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    /// Find an attribute by name.
    #[must_use]
    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut CategoryAttribute> {
        self.attributes.0.iter_mut().find(|a| a.name == name)
    }
}

/// Validated category fields for insert and update.
#[derive(Debug, Clone)]
pub struct CategoryDraft {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub attributes: Vec<CategoryAttribute>,
    pub icon: Option<String>,
    pub image: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
}
