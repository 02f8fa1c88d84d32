//! Event calendar repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use best_wishes_core::EventId;

use super::RepositoryError;
use crate::models::event::{Event, EventEdit, NewEvent};

const EVENT_COLUMNS: &str = r"
    id, name, description, date, image, is_active, featured, created_at, updated_at
";

pub struct EventRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> EventRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, event: &NewEvent) -> Result<Event, RepositoryError> {
        let row = sqlx::query_as::<_, Event>(&format!(
            r"
            INSERT INTO events (name, description, date, image, is_active, featured)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {EVENT_COLUMNS}
            "
        ))
        .bind(&event.name)
        .bind(&event.description)
        .bind(event.date)
        .bind(&event.image)
        .bind(event.is_active)
        .bind(event.featured)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Event>, RepositoryError> {
        let rows = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY date"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Events dated on or after the start of `today`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upcoming(&self, today: DateTime<Utc>) -> Result<Vec<Event>, RepositoryError> {
        let rows = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE date >= $1 ORDER BY date"
        ))
        .bind(today)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the event does not exist.
    pub async fn update(&self, id: EventId, edit: &EventEdit) -> Result<Event, RepositoryError> {
        sqlx::query_as::<_, Event>(&format!(
            r"
            UPDATE events SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                date = COALESCE($4, date),
                image = COALESCE($5, image),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {EVENT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&edit.name)
        .bind(&edit.description)
        .bind(edit.date)
        .bind(&edit.image)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the event does not exist.
    pub async fn set_flags(
        &self,
        id: EventId,
        is_active: Option<bool>,
        featured: Option<bool>,
    ) -> Result<Event, RepositoryError> {
        sqlx::query_as::<_, Event>(&format!(
            r"
            UPDATE events SET
                is_active = COALESCE($2, is_active),
                featured = COALESCE($3, featured),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {EVENT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(is_active)
        .bind(featured)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the event does not exist.
    pub async fn delete(&self, id: EventId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
