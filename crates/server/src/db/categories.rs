//! Category repository.

use sqlx::PgPool;
use sqlx::types::Json;

use best_wishes_core::CategoryId;

use super::RepositoryError;
use crate::models::category::{Category, CategoryAttribute, CategoryDraft};

const CATEGORY_COLUMNS: &str = r"
    id, key, name, description, attributes, icon, image, is_active, sort_order,
    created_at, updated_at
";

pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Categories ordered by `sort_order`, then name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, active_only: bool) -> Result<Vec<Category>, RepositoryError> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            r"
            SELECT {CATEGORY_COLUMNS} FROM categories
            WHERE (NOT $1 OR is_active)
            ORDER BY sort_order, name
            "
        ))
        .bind(active_only)
        .fetch_all(self.pool)
        .await?;
        Ok(categories)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(category)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_key(&self, key: &str) -> Result<Option<Category>, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE key = lower($1)"
        ))
        .bind(key)
        .fetch_optional(self.pool)
        .await?;
        Ok(category)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the key is taken.
    pub async fn create(&self, draft: &CategoryDraft) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, Category>(&format!(
            r"
            INSERT INTO categories
                (key, name, description, attributes, icon, image, is_active, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(&draft.key)
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(Json(&draft.attributes))
        .bind(&draft.icon)
        .bind(&draft.image)
        .bind(draft.is_active)
        .bind(draft.sort_order)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "Category key already exists"))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist, or
    /// `RepositoryError::Conflict` if the new key is taken.
    pub async fn update(
        &self,
        id: CategoryId,
        draft: &CategoryDraft,
    ) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, Category>(&format!(
            r"
            UPDATE categories SET
                key = $2, name = $3, description = $4, attributes = $5, icon = $6,
                image = $7, is_active = $8, sort_order = $9, updated_at = NOW()
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&draft.key)
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(Json(&draft.attributes))
        .bind(&draft.icon)
        .bind(&draft.image)
        .bind(draft.is_active)
        .bind(draft.sort_order)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "Category key already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Replace a category's attribute list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn set_attributes(
        &self,
        id: CategoryId,
        attributes: &[CategoryAttribute],
    ) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, Category>(&format!(
            r"
            UPDATE categories SET attributes = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(id)
        .bind(Json(attributes))
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query(r"DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
