//! Database operations for the Best Wishes `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `users`, `auth_codes` - Accounts and one-time codes
//! - `tower_sessions.session` - Session storage
//! - `categories`, `products`, `quotes` - Catalog
//! - `orders`, `order_items`, `order_status_history` - Orders
//! - `surprise_gifts`, `surprise_gift_items` - Gifts delivered to a recipient
//! - `collaborative_purchases` and children - Split-payment purchases
//! - `gift_contributions` and participants - Lightweight group gifts
//! - `order_summaries` - Profit rows written when stock is committed
//! - `notifications`, `feedback`, `customizations`, `events`, `event_reminders`
//!
//! Queries are checked at runtime (`query_as::<_, Row>`), so the workspace
//! builds without a live database.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p best-wishes-cli -- migrate
//! ```

pub mod auth_codes;
pub mod categories;
pub mod collaborative;
pub mod customizations;
pub mod events;
pub mod feedback;
pub mod gift_contributions;
pub mod line_items;
pub mod notifications;
pub mod order_summaries;
pub mod orders;
pub mod products;
pub mod quotes;
pub mod reminders;
pub mod stock;
pub mod surprise_gifts;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use auth_codes::{AuthCodeRepository, CodePurpose};
pub use categories::CategoryRepository;
pub use collaborative::CollaborativeRepository;
pub use customizations::CustomizationRepository;
pub use events::EventRepository;
pub use feedback::FeedbackRepository;
pub use gift_contributions::GiftContributionRepository;
pub use notifications::NotificationRepository;
pub use order_summaries::OrderSummaryRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use quotes::QuoteRepository;
pub use reminders::ReminderRepository;
pub use surprise_gifts::SurpriseGiftRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A row points at something that does not exist, such as an unknown product.
    #[error("{0}")]
    MissingReference(String),
}

impl RepositoryError {
    /// Map a unique violation to `Conflict`, anything else to `Database`.
    pub(crate) fn unique(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }

    /// Map a foreign-key violation to `MissingReference`, anything else to `Database`.
    pub(crate) fn foreign_key(err: sqlx::Error, message: impl FnOnce() -> String) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_foreign_key_violation()
        {
            return Self::MissingReference(message());
        }
        Self::Database(err)
    }
}

/// Page/limit pair resolved to SQL `LIMIT`/`OFFSET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    pub const MAX_LIMIT: i64 = 100;
    /// Highest page whose offset still fits in an `i64` at `MAX_LIMIT`.
    pub const MAX_PAGE: i64 = i64::MAX / Self::MAX_LIMIT;

    /// Clamp user input: page between 1 and `MAX_PAGE`, limit between 1 and `MAX_LIMIT`.
    #[must_use]
    pub fn new(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, Self::MAX_PAGE),
            limit: limit.unwrap_or(default_limit).clamp(1, Self::MAX_LIMIT),
        }
    }

    #[must_use]
    pub const fn offset(self) -> i64 {
        (self.page - 1) * self.limit
    }

    /// Number of pages needed for `total` rows.
    #[must_use]
    pub const fn total_pages(self, total: i64) -> i64 {
        (total + self.limit - 1) / self.limit
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_clamps_input() {
        let page = Page::new(Some(0), Some(500), 10);
        assert_eq!(page, Page { page: 1, limit: 100 });

        let page = Page::new(None, None, 20);
        assert_eq!(page, Page { page: 1, limit: 20 });
    }

    #[test]
    fn test_page_offset_and_total_pages() {
        let page = Page::new(Some(3), Some(10), 10);
        assert_eq!(page.offset(), 20);
        assert_eq!(page.total_pages(0), 0);
        assert_eq!(page.total_pages(10), 1);
        assert_eq!(page.total_pages(21), 3);
    }

    #[test]
    fn test_huge_page_offset_stays_positive() {
        let page = Page::new(Some(i64::MAX), Some(10), 10);
        assert_eq!(page.page, Page::MAX_PAGE);
        assert!(page.offset() > 0);

        let widest = Page::new(Some(i64::MAX), Some(i64::MAX), 10);
        assert_eq!(widest.limit, Page::MAX_LIMIT);
        assert!(widest.offset() > 0);
    }
}
