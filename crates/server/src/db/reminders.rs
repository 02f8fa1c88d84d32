//! Event reminder repository.

use chrono::NaiveDate;
use sqlx::PgPool;

use best_wishes_core::{ReminderId, UserId};

use super::RepositoryError;
use crate::models::reminder::{DueReminder, NewReminder, Reminder, ReminderEdit};

const REMINDER_COLUMNS: &str = r"
    r.id, r.user_id, r.reminder_msg, r.date, r.event, r.occasion, r.time, r.sent,
    r.created_at, r.updated_at
";

pub struct ReminderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReminderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, user_id: UserId, new: &NewReminder) -> Result<Reminder, RepositoryError> {
        let row = sqlx::query_as::<_, Reminder>(&format!(
            r"
            INSERT INTO event_reminders AS r (user_id, reminder_msg, date, event, occasion, time)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {REMINDER_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(&new.reminder_msg)
        .bind(new.date)
        .bind(&new.event)
        .bind(new.occasion)
        .bind(&new.time)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// A user's reminders, latest date and time first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Reminder>, RepositoryError> {
        let rows = sqlx::query_as::<_, Reminder>(&format!(
            r"
            SELECT {REMINDER_COLUMNS} FROM event_reminders r
            WHERE r.user_id = $1
            ORDER BY r.date DESC, r.time DESC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Apply the provided fields to one of the user's reminders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the reminder is not the user's.
    pub async fn update(
        &self,
        id: ReminderId,
        user_id: UserId,
        edit: &ReminderEdit,
    ) -> Result<Reminder, RepositoryError> {
        sqlx::query_as::<_, Reminder>(&format!(
            r"
            UPDATE event_reminders AS r SET
                reminder_msg = COALESCE($3, reminder_msg),
                date = COALESCE($4, date),
                event = COALESCE($5, event),
                occasion = COALESCE($6, occasion),
                time = COALESCE($7, time),
                updated_at = NOW()
            WHERE r.id = $1 AND r.user_id = $2
            RETURNING {REMINDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .bind(&edit.reminder_msg)
        .bind(edit.date)
        .bind(&edit.event)
        .bind(edit.occasion)
        .bind(&edit.time)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the reminder is not the user's.
    pub async fn delete(&self, id: ReminderId, user_id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM event_reminders WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Unsent reminders set for exactly this date and `HH:MM`, with the
    /// owner's address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn due(&self, date: NaiveDate, minute: &str) -> Result<Vec<DueReminder>, RepositoryError> {
        let rows = sqlx::query_as::<_, DueReminder>(&format!(
            r"
            SELECT {REMINDER_COLUMNS}, u.email, u.first_name
            FROM event_reminders r JOIN users u ON u.id = r.user_id
            WHERE NOT r.sent AND r.date = $1 AND r.time = $2
            ORDER BY r.id
            "
        ))
        .bind(date)
        .bind(minute)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_sent(&self, id: ReminderId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE event_reminders SET sent = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
