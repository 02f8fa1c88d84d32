//! Product catalog types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use best_wishes_core::{
    CustomizationType, ProductId, ProductStatus, ShippingClass, StockStatus, TaxClass,
    profit_margin, selling_price,
};

/// Attribute selections used by `attributes.<key>` filters.
pub type ProductFilters = serde_json::Map<String, serde_json::Value>;

/// A product row.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub short_description: String,
    pub detailed_description: Option<String>,
    pub main_category: Option<String>,
    pub filters: Json<ProductFilters>,
    pub tags: Vec<String>,
    pub images: Vec<String>,
    pub cost_price: Decimal,
    pub retail_price: Decimal,
    pub sale_price: Option<Decimal>,
    pub stock: i32,
    pub stock_status: StockStatus,
    pub tax_class: TaxClass,
    pub shipping_class: ShippingClass,
    pub status: ProductStatus,
    pub featured: bool,
    pub is_customizable: bool,
    pub customization_type: Option<CustomizationType>,
    pub customization_price: Decimal,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// What a customer pays for one unit.
    #[must_use]
    pub fn price(&self) -> Decimal {
        selling_price(self.retail_price, self.sale_price)
    }

    /// First image, used as the line-item thumbnail.
    #[must_use]
    pub fn thumbnail(&self) -> Option<String> {
        self.images.first().cloned()
    }
}

/// A product with its computed selling price and margin.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub price: Decimal,
    pub profit_margin: Option<Decimal>,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        let price = product.price();
        let profit_margin = profit_margin(product.cost_price, price);
        Self {
            product,
            price,
            profit_margin,
        }
    }
}

/// Validated product fields for insert and update.
#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub name: String,
    pub sku: String,
    pub short_description: String,
    pub detailed_description: Option<String>,
    pub main_category: Option<String>,
    pub filters: ProductFilters,
    pub tags: Vec<String>,
    pub images: Vec<String>,
    pub cost_price: Decimal,
    pub retail_price: Decimal,
    pub sale_price: Option<Decimal>,
    pub stock: i32,
    pub tax_class: TaxClass,
    pub shipping_class: ShippingClass,
    pub status: ProductStatus,
    pub featured: bool,
    pub is_customizable: bool,
    pub customization_type: Option<CustomizationType>,
    pub customization_price: Decimal,
    pub seo_title: String,
    pub seo_description: String,
}

/// One requested stock decrement.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// A line that could not be fulfilled from stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsufficientStockItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub requested_quantity: i32,
    pub available_stock: i32,
}

/// A line whose stock was decremented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdate {
    pub product_id: ProductId,
    pub product_name: String,
    pub old_stock: i32,
    pub new_stock: i32,
    pub reduced_quantity: i32,
}
