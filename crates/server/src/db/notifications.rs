//! Notification repository. Every query is scoped to the owning user.

use sqlx::PgPool;

use best_wishes_core::{NotificationId, UserId};

use super::{Page, RepositoryError};
use crate::models::notification::{NewNotification, Notification};

const NOTIFICATION_COLUMNS: &str = r"
    id, user_id, title, message, type, is_read, priority, related_id, related_model,
    action_url, created_at, updated_at
";

pub struct NotificationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, new: &NewNotification) -> Result<Notification, RepositoryError> {
        let row = sqlx::query_as::<_, Notification>(&format!(
            r"
            INSERT INTO notifications
                (user_id, title, message, type, priority, related_id, related_model, action_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {NOTIFICATION_COLUMNS}
            "
        ))
        .bind(new.user_id)
        .bind(&new.title)
        .bind(&new.message)
        .bind(new.kind)
        .bind(new.priority)
        .bind(new.related_id)
        .bind(&new.related_model)
        .bind(&new.action_url)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// One page of a user's notifications, newest first, plus the total.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<(Vec<Notification>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar(r"SELECT COUNT(*) FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool)
            .await?;
        let rows = sqlx::query_as::<_, Notification>(&format!(
            r"
            SELECT {NOTIFICATION_COLUMNS} FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
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
    pub async fn unread_count(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r"SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the notification is not the user's.
    pub async fn mark_read(
        &self,
        id: NotificationId,
        user_id: UserId,
    ) -> Result<Notification, RepositoryError> {
        sqlx::query_as::<_, Notification>(&format!(
            r"
            UPDATE notifications SET is_read = TRUE, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {NOTIFICATION_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Returns how many notifications changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"UPDATE notifications SET is_read = TRUE, updated_at = NOW() WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the notification is not the user's.
    pub async fn delete(&self, id: NotificationId, user_id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query(r"DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
