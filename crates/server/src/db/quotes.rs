//! Quote library for mug and card customization.

use sqlx::PgPool;

use best_wishes_core::{QuoteCategory, QuoteId, QuoteType};

use super::RepositoryError;
use crate::models::quote::{NewQuote, Quote};

const QUOTE_COLUMNS: &str = r"
    id, text, category, quote_type, tags, is_active, usage_count, created_at, updated_at
";

/// Most quotes returned by a single listing.
pub const QUOTE_LIMIT: i64 = 50;

pub struct QuoteRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> QuoteRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active quotes, most used first. A type filter also matches `both`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        category: Option<QuoteCategory>,
        quote_type: Option<QuoteType>,
    ) -> Result<Vec<Quote>, RepositoryError> {
        let rows = sqlx::query_as::<_, Quote>(&format!(
            r"
            SELECT {QUOTE_COLUMNS} FROM quotes
            WHERE is_active
              AND ($1::quote_category IS NULL OR category = $1)
              AND ($2::quote_type IS NULL OR quote_type = $2 OR quote_type = 'both')
            ORDER BY usage_count DESC, created_at DESC
            LIMIT $3
            "
        ))
        .bind(category)
        .bind(quote_type)
        .bind(QUOTE_LIMIT)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Distinct categories that have at least one active quote.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<QuoteCategory>, RepositoryError> {
        let rows: Vec<QuoteCategory> = sqlx::query_scalar(
            "SELECT DISTINCT category FROM quotes WHERE is_active ORDER BY category",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn increment_usage(&self, id: QuoteId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE quotes SET usage_count = usage_count + 1, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, quote: &NewQuote) -> Result<Quote, RepositoryError> {
        let row = sqlx::query_as::<_, Quote>(&format!(
            r"
            INSERT INTO quotes (text, category, quote_type, tags)
            VALUES ($1, $2, $3, $4)
            RETURNING {QUOTE_COLUMNS}
            "
        ))
        .bind(&quote.text)
        .bind(quote.category)
        .bind(quote.quote_type)
        .bind(&quote.tags)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }
}
