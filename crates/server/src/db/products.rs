//! Product repository: catalog listing, CRUD, and lookups used by other flows.

use std::collections::BTreeMap;

use sqlx::PgPool;
use sqlx::types::Json;

use best_wishes_core::{CustomizationType, ProductId, ProductStatus, StockStatus};

use super::{Page, RepositoryError};
use crate::models::product::{Product, ProductDraft};

const PRODUCT_COLUMNS: &str = r"
    p.id, p.name, p.sku, p.short_description, p.detailed_description, p.main_category,
    p.filters, p.tags, p.images, p.cost_price, p.retail_price, p.sale_price, p.stock,
    p.stock_status, p.tax_class, p.shipping_class, p.status, p.featured,
    p.is_customizable, p.customization_type, p.customization_price, p.seo_title,
    p.seo_description, p.rating, p.created_at, p.updated_at
";

/// Selling price as SQL, matching `best_wishes_core::selling_price`.
pub const SELLING_PRICE_SQL: &str =
    "CASE WHEN p.sale_price > 0 THEN p.sale_price ELSE p.retail_price END";

/// Sortable product columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProductSort {
    #[default]
    CreatedAt,
    Name,
    Price,
    Rating,
    Stock,
    UpdatedAt,
}

impl ProductSort {
    /// Parse a `sortBy` value. Unknown columns fall back to `createdAt`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "name" => Self::Name,
            "price" => Self::Price,
            "rating" => Self::Rating,
            "stock" => Self::Stock,
            "updatedAt" => Self::UpdatedAt,
            _ => Self::CreatedAt,
        }
    }

    const fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "p.created_at",
            Self::Name => "p.name",
            Self::Price => SELLING_PRICE_SQL,
            Self::Rating => "p.rating",
            Self::Stock => "p.stock",
            Self::UpdatedAt => "p.updated_at",
        }
    }
}

/// Filters for the product listing.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<ProductStatus>,
    /// `attributes.<key>=a,b`: the product's `filters->>key` must be one of the values.
    pub attributes: BTreeMap<String, Vec<String>>,
    pub sort: ProductSort,
    pub descending: bool,
}

impl ProductQuery {
    /// `ORDER BY` clause built only from whitelisted columns.
    #[must_use]
    pub fn order_clause(&self) -> String {
        let direction = if self.descending { "DESC" } else { "ASC" };
        format!("ORDER BY {} {direction}, p.id {direction}", self.sort.column())
    }

    fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)))
    }
}

/// Escape `%`, `_` and `\` so user text matches literally in `ILIKE`.
#[must_use]
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// $1 search pattern, $2 category, $3 status, $4 attribute filters as {key: [values]}
const LIST_FILTER: &str = r"
    WHERE ($1::text IS NULL OR p.name ILIKE $1 OR p.short_description ILIKE $1
           OR p.detailed_description ILIKE $1 OR p.main_category ILIKE $1
           OR EXISTS (SELECT 1 FROM unnest(p.tags) t WHERE t ILIKE $1))
      AND ($2::text IS NULL OR lower(p.main_category) = lower($2))
      AND ($3::product_status IS NULL OR p.status = $3)
      AND NOT EXISTS (
          SELECT 1 FROM jsonb_each($4::jsonb) AS f(key, allowed)
          WHERE NOT COALESCE(allowed ? (p.filters ->> f.key), FALSE)
      )
";

pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of products plus the total match count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        query: &ProductQuery,
        page: Page,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let pattern = query.search_pattern();

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM products p {LIST_FILTER}"
        ))
        .bind(&pattern)
        .bind(&query.category)
        .bind(query.status)
        .bind(Json(&query.attributes))
        .fetch_one(self.pool)
        .await?;

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p {LIST_FILTER} {} LIMIT $5 OFFSET $6",
            query.order_clause()
        ))
        .bind(&pattern)
        .bind(&query.category)
        .bind(query.status)
        .bind(Json(&query.attributes))
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((products, total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(product)
    }

    /// Fetch several products at once, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;
        Ok(products)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the SKU is taken.
    pub async fn create(&self, draft: &ProductDraft) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(&format!(
            r"
            INSERT INTO products AS p (
                name, sku, short_description, detailed_description, main_category, filters,
                tags, images, cost_price, retail_price, sale_price, stock, stock_status,
                tax_class, shipping_class, status, featured, is_customizable,
                customization_type, customization_price, seo_title, seo_description
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&draft.name)
        .bind(&draft.sku)
        .bind(&draft.short_description)
        .bind(&draft.detailed_description)
        .bind(&draft.main_category)
        .bind(Json(&draft.filters))
        .bind(&draft.tags)
        .bind(&draft.images)
        .bind(draft.cost_price)
        .bind(draft.retail_price)
        .bind(draft.sale_price)
        .bind(draft.stock)
        .bind(StockStatus::for_quantity(draft.stock))
        .bind(draft.tax_class)
        .bind(draft.shipping_class)
        .bind(draft.status)
        .bind(draft.featured)
        .bind(draft.is_customizable)
        .bind(draft.customization_type)
        .bind(draft.customization_price)
        .bind(&draft.seo_title)
        .bind(&draft.seo_description)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "SKU already exists"))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist, or
    /// `RepositoryError::Conflict` if the new SKU is taken.
    pub async fn update(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(&format!(
            r"
            UPDATE products AS p SET
                name = $2, sku = $3, short_description = $4, detailed_description = $5,
                main_category = $6, filters = $7, tags = $8, images = $9, cost_price = $10,
                retail_price = $11, sale_price = $12, stock = $13, stock_status = $14,
                tax_class = $15, shipping_class = $16, status = $17, featured = $18,
                is_customizable = $19, customization_type = $20, customization_price = $21,
                seo_title = $22, seo_description = $23, updated_at = NOW()
            WHERE p.id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&draft.name)
        .bind(&draft.sku)
        .bind(&draft.short_description)
        .bind(&draft.detailed_description)
        .bind(&draft.main_category)
        .bind(Json(&draft.filters))
        .bind(&draft.tags)
        .bind(&draft.images)
        .bind(draft.cost_price)
        .bind(draft.retail_price)
        .bind(draft.sale_price)
        .bind(draft.stock)
        .bind(StockStatus::for_quantity(draft.stock))
        .bind(draft.tax_class)
        .bind(draft.shipping_class)
        .bind(draft.status)
        .bind(draft.featured)
        .bind(draft.is_customizable)
        .bind(draft.customization_type)
        .bind(draft.customization_price)
        .bind(&draft.seo_title)
        .bind(&draft.seo_description)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "SKU already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query(r"DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Active, in-stock products that accept a customization.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn customizable(
        &self,
        kind: Option<CustomizationType>,
    ) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM products p
            WHERE p.is_customizable AND p.status = 'active'
              AND p.stock_status <> 'out-of-stock'
              AND ($1::customization_type IS NULL OR p.customization_type = $1)
            ORDER BY p.featured DESC, p.rating DESC, p.created_at DESC
            "
        ))
        .bind(kind)
        .fetch_all(self.pool)
        .await?;
        Ok(products)
    }

    /// Every active product, best rated first.
    ///
    /// The catalog is small enough that recommendation scoring happens in memory.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM products p
            WHERE p.status = 'active'
            ORDER BY p.rating DESC, p.featured DESC, p.created_at DESC
            "
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_whitelist() {
        assert_eq!(ProductSort::parse("price"), ProductSort::Price);
        assert_eq!(ProductSort::parse("rating"), ProductSort::Rating);
        assert_eq!(ProductSort::parse("name; DROP TABLE products"), ProductSort::CreatedAt);
        assert_eq!(ProductSort::parse(""), ProductSort::CreatedAt);
    }

    #[test]
    fn test_order_clause() {
        let query = ProductQuery {
            sort: ProductSort::Name,
            descending: false,
            ..ProductQuery::default()
        };
        assert_eq!(query.order_clause(), "ORDER BY p.name ASC, p.id ASC");

        let query = ProductQuery {
            sort: ProductSort::Price,
            descending: true,
            ..ProductQuery::default()
        };
        assert!(query.order_clause().contains("p.sale_price > 0"));
        assert!(query.order_clause().ends_with("DESC"));
    }

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        let query = ProductQuery {
            search: Some(" 50%_off ".to_string()),
            ..ProductQuery::default()
        };
        assert_eq!(query.search_pattern().as_deref(), Some("%50\\%\\_off%"));

        let blank = ProductQuery {
            search: Some("   ".to_string()),
            ..ProductQuery::default()
        };
        assert_eq!(blank.search_pattern(), None);
    }
}
