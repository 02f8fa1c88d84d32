//! Customization repository.
//!
//! A user holds at most one draft per product (partial unique index), so
//! saving a design again overwrites the existing draft.

use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use best_wishes_core::{
    CustomizationId, CustomizationStatus, CustomizationType, ProductId, UserId,
};

use super::{Page, RepositoryError};
use crate::models::customization::{Customization, CustomizationDesign};

const CUSTOMIZATION_COLUMNS: &str = r"
    id, product_id, user_id, order_id, customization_type, selected_quote, custom_message,
    font_style, font_size, font_color, text_position, background_color, additional_images,
    preview_image, price, status, special_instructions, created_at, updated_at
";

pub struct CustomizationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomizationRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert the user's draft for this product, or overwrite it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert_draft(
        &self,
        user_id: UserId,
        product_id: ProductId,
        customization_type: CustomizationType,
        design: &CustomizationDesign,
        price: Decimal,
    ) -> Result<Customization, RepositoryError> {
        let row = sqlx::query_as::<_, Customization>(&format!(
            r"
            INSERT INTO customizations (
                user_id, product_id, customization_type, selected_quote, custom_message,
                font_style, font_size, font_color, text_position, background_color,
                additional_images, preview_image, price, special_instructions
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (user_id, product_id) WHERE status = 'draft' DO UPDATE SET
                customization_type = EXCLUDED.customization_type,
                selected_quote = EXCLUDED.selected_quote,
                custom_message = EXCLUDED.custom_message,
                font_style = EXCLUDED.font_style,
                font_size = EXCLUDED.font_size,
                font_color = EXCLUDED.font_color,
                text_position = EXCLUDED.text_position,
                background_color = EXCLUDED.background_color,
                additional_images = EXCLUDED.additional_images,
                preview_image = EXCLUDED.preview_image,
                price = EXCLUDED.price,
                special_instructions = EXCLUDED.special_instructions,
                updated_at = NOW()
            RETURNING {CUSTOMIZATION_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(product_id)
        .bind(customization_type)
        .bind(design.selected_quote.clone().map(Json))
        .bind(&design.custom_message)
        .bind(&design.font_style)
        .bind(design.font_size)
        .bind(&design.font_color)
        .bind(Json(design.text_position))
        .bind(&design.background_color)
        .bind(Json(design.additional_images.clone()))
        .bind(&design.preview_image)
        .bind(price)
        .bind(&design.special_instructions)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// A user's customizations, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn for_user(
        &self,
        user_id: UserId,
        status: Option<CustomizationStatus>,
    ) -> Result<Vec<Customization>, RepositoryError> {
        let rows = sqlx::query_as::<_, Customization>(&format!(
            r"
            SELECT {CUSTOMIZATION_COLUMNS} FROM customizations
            WHERE user_id = $1 AND ($2::customization_status IS NULL OR status = $2)
            ORDER BY updated_at DESC
            "
        ))
        .bind(user_id)
        .bind(status)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CustomizationId) -> Result<Option<Customization>, RepositoryError> {
        let row = sqlx::query_as::<_, Customization>(&format!(
            "SELECT {CUSTOMIZATION_COLUMNS} FROM customizations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Delete one of the owner's drafts. Confirmed work cannot be removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no draft of this owner matches.
    pub async fn delete_draft(&self, id: CustomizationId, owner: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM customizations WHERE id = $1 AND user_id = $2 AND status = 'draft'",
        )
        .bind(id)
        .bind(owner)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Every customization, filtered for the admin dashboard.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_all(
        &self,
        status: Option<CustomizationStatus>,
        customization_type: Option<CustomizationType>,
        page: Page,
    ) -> Result<(Vec<Customization>, i64), RepositoryError> {
        const FILTER: &str = r"
            ($1::customization_status IS NULL OR status = $1)
            AND ($2::customization_type IS NULL OR customization_type = $2)
        ";
        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM customizations WHERE {FILTER}"
        ))
        .bind(status)
        .bind(customization_type)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, Customization>(&format!(
            r"
            SELECT {CUSTOMIZATION_COLUMNS} FROM customizations
            WHERE {FILTER}
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(status)
        .bind(customization_type)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;
        Ok((rows, total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customization does not exist.
    pub async fn set_status(
        &self,
        id: CustomizationId,
        status: CustomizationStatus,
    ) -> Result<Customization, RepositoryError> {
        sqlx::query_as::<_, Customization>(&format!(
            r"
            UPDATE customizations SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {CUSTOMIZATION_COLUMNS}
            "
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "A draft already exists for this product"))?
        .ok_or(RepositoryError::NotFound)
    }
}
