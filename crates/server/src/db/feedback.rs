//! Product review repository.

use std::collections::BTreeMap;

use sqlx::PgPool;

use best_wishes_core::{FeedbackId, OrderId, ProductId, UserId};

use super::{Page, RepositoryError};
use crate::models::feedback::{Feedback, FeedbackEdit, FeedbackView, NewFeedback, RatingStats};

const FEEDBACK_COLUMNS: &str = r"
    f.id, f.user_id, f.product_id, f.order_id, f.rating, f.title, f.comment, f.images,
    f.is_verified_purchase, f.status, f.likes, f.dislikes, f.is_edited, f.edited_at,
    f.created_at, f.updated_at
";

const AUTHOR_NAME: &str = "TRIM(u.first_name || ' ' || u.last_name) AS author_name";

/// Sort keys accepted from the query string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedbackSort {
    #[default]
    CreatedAt,
    Rating,
    Likes,
}

impl FeedbackSort {
    /// Unknown keys fall back to newest first.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "rating" => Self::Rating,
            "likes" => Self::Likes,
            _ => Self::CreatedAt,
        }
    }

    const fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "f.created_at",
            Self::Rating => "f.rating",
            Self::Likes => "f.likes",
        }
    }
}

/// Public listing filters for one product.
#[derive(Debug, Clone, Default)]
pub struct FeedbackQuery {
    pub rating: Option<i32>,
    pub verified: Option<bool>,
    pub sort: FeedbackSort,
    pub descending: bool,
}

impl FeedbackQuery {
    fn order_clause(&self) -> String {
        let direction = if self.descending { "DESC" } else { "ASC" };
        format!("ORDER BY {} {direction}, f.id {direction}", self.sort.column())
    }
}

const PRODUCT_FILTER: &str = r"
    f.product_id = $1
    AND f.status = 'active'
    AND ($2::int4 IS NULL OR f.rating = $2)
    AND ($3::bool IS NULL OR f.is_verified_purchase = $3)
";

pub struct FeedbackRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> FeedbackRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active reviews for a product with author names, plus the total.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
        query: &FeedbackQuery,
        page: Page,
    ) -> Result<(Vec<FeedbackView>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM feedback f WHERE {PRODUCT_FILTER}"
        ))
        .bind(product_id)
        .bind(query.rating)
        .bind(query.verified)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, FeedbackView>(&format!(
            r"
            SELECT {FEEDBACK_COLUMNS}, {AUTHOR_NAME}
            FROM feedback f JOIN users u ON u.id = f.user_id
            WHERE {PRODUCT_FILTER}
            {order}
            LIMIT $4 OFFSET $5
            ",
            order = query.order_clause(),
        ))
        .bind(product_id)
        .bind(query.rating)
        .bind(query.verified)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows, total))
    }

    /// Rating statistics over a product's active reviews.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn rating_stats(&self, product_id: ProductId) -> Result<RatingStats, RepositoryError> {
        let mut stats = self.rating_stats_many(&[product_id]).await?;
        Ok(stats.remove(&product_id).unwrap_or_default())
    }

    /// Rating statistics keyed by product. Every requested product gets an
    /// entry, empty when it has no reviews.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn rating_stats_many(
        &self,
        product_ids: &[ProductId],
    ) -> Result<BTreeMap<ProductId, RatingStats>, RepositoryError> {
        let ids: Vec<i32> = product_ids.iter().map(ProductId::as_i32).collect();
        let rows: Vec<(ProductId, i32, i64)> = sqlx::query_as(
            r"
            SELECT product_id, rating, COUNT(*)
            FROM feedback
            WHERE product_id = ANY($1) AND status = 'active'
            GROUP BY product_id, rating
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut counts: BTreeMap<ProductId, Vec<(i32, i64)>> = BTreeMap::new();
        for (product_id, rating, count) in rows {
            counts.entry(product_id).or_default().push((rating, count));
        }
        Ok(product_ids
            .iter()
            .map(|id| {
                let stats = counts
                    .get(id)
                    .map(|c| RatingStats::from_counts(c))
                    .unwrap_or_default();
                (*id, stats)
            })
            .collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed this
    /// product for this order.
    pub async fn create(&self, user_id: UserId, new: &NewFeedback) -> Result<Feedback, RepositoryError> {
        let row = sqlx::query_as::<_, Feedback>(&format!(
            r"
            INSERT INTO feedback AS f
                (user_id, product_id, order_id, rating, title, comment, images, is_verified_purchase)
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
            RETURNING {FEEDBACK_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(new.product_id)
        .bind(new.order_id)
        .bind(new.rating)
        .bind(&new.title)
        .bind(&new.comment)
        .bind(&new.images)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            RepositoryError::unique(
                e,
                "You have already provided feedback for this product in this order",
            )
        })?;
        Ok(row)
    }

    /// The caller's own reviews, newest first, plus the total.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn for_user(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<(Vec<FeedbackView>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feedback WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool)
            .await?;
        let rows = sqlx::query_as::<_, FeedbackView>(&format!(
            r"
            SELECT {FEEDBACK_COLUMNS}, {AUTHOR_NAME}
            FROM feedback f JOIN users u ON u.id = f.user_id
            WHERE f.user_id = $1
            ORDER BY f.created_at DESC, f.id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;
        Ok((rows, total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: FeedbackId) -> Result<Option<Feedback>, RepositoryError> {
        let row = sqlx::query_as::<_, Feedback>(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback f WHERE f.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// The review a user left for a product in an order, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_existing(
        &self,
        user_id: UserId,
        product_id: ProductId,
        order_id: OrderId,
    ) -> Result<Option<Feedback>, RepositoryError> {
        let row = sqlx::query_as::<_, Feedback>(&format!(
            r"
            SELECT {FEEDBACK_COLUMNS} FROM feedback f
            WHERE f.user_id = $1 AND f.product_id = $2 AND f.order_id = $3
            "
        ))
        .bind(user_id)
        .bind(product_id)
        .bind(order_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Apply the provided fields and mark the review edited.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn update(&self, id: FeedbackId, edit: &FeedbackEdit) -> Result<Feedback, RepositoryError> {
        sqlx::query_as::<_, Feedback>(&format!(
            r"
            UPDATE feedback AS f SET
                rating = COALESCE($2, rating),
                title = COALESCE($3, title),
                comment = COALESCE($4, comment),
                images = COALESCE($5, images),
                is_edited = TRUE,
                edited_at = NOW(),
                updated_at = NOW()
            WHERE f.id = $1
            RETURNING {FEEDBACK_COLUMNS}
            "
        ))
        .bind(id)
        .bind(edit.rating)
        .bind(&edit.title)
        .bind(&edit.comment)
        .bind(&edit.images)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn delete(&self, id: FeedbackId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM feedback WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_parse_falls_back_to_created_at() {
        assert_eq!(FeedbackSort::parse("rating"), FeedbackSort::Rating);
        assert_eq!(FeedbackSort::parse("likes"), FeedbackSort::Likes);
        assert_eq!(FeedbackSort::parse("title; DROP TABLE"), FeedbackSort::CreatedAt);
    }

    #[test]
    fn test_order_clause() {
        let query = FeedbackQuery {
            sort: FeedbackSort::Rating,
            descending: true,
            ..FeedbackQuery::default()
        };
        assert_eq!(query.order_clause(), "ORDER BY f.rating DESC, f.id DESC");
    }
}
