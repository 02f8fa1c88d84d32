//! Background delivery of event reminders.
//!
//! Each tick also purges expired auth codes and sessions.
//!
//! Reminders are stored with a local date and an `HH:MM` label, so each tick
//! matches against the server's local clock.

use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use sqlx::PgPool;
use thiserror::Error;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::db::RepositoryError;
use crate::db::auth_codes::AuthCodeRepository;
use crate::db::products::ProductRepository;
use crate::db::reminders::ReminderRepository;
use crate::middleware::session::purge_expired_sessions;
use crate::models::product::Product;
use crate::models::reminder::{DueReminder, minute_label};
use crate::services::email::{EmailService, ReminderMail};
use crate::services::recommendations::{self, DEFAULT_LIMIT};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Emails due reminders once per tick.
pub struct ReminderScheduler {
    pool: PgPool,
    email: EmailService,
    poll_interval: Duration,
}

impl ReminderScheduler {
    /// Spawn the scheduler loop.
    pub fn spawn(pool: PgPool, email: EmailService, poll_interval: Duration) -> tokio::task::JoinHandle<()> {
        let scheduler = Self {
            pool,
            email,
            poll_interval,
        };
        tokio::spawn(async move {
            scheduler.start().await;
        })
    }

    async fn start(&self) {
        info!(interval = ?self.poll_interval, "Starting reminder scheduler");

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let now = Local::now().naive_local();
            match self.send_due(now).await {
                Ok(0) => {}
                Ok(sent) => info!(sent, "Reminders delivered"),
                Err(e) => error!(error = %e, "Error checking reminders"),
            }
            match AuthCodeRepository::new(&self.pool).purge_expired().await {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "Expired auth codes removed"),
                Err(e) => warn!(error = %e, "Failed to purge expired auth codes"),
            }
            match purge_expired_sessions(&self.pool).await {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "Expired sessions removed"),
                Err(e) => warn!(error = %e, "Failed to purge expired sessions"),
            }
        }
    }

    /// Send every reminder due at `now`. Returns how many were sent.
    async fn send_due(&self, now: NaiveDateTime) -> Result<usize, SchedulerError> {
        let reminders = ReminderRepository::new(&self.pool);
        let due = reminders.due(now.date(), &minute_label(now)).await?;
        if due.is_empty() {
            return Ok(0);
        }

        let catalog = ProductRepository::new(&self.pool).active().await?;
        let mut sent = 0;
        for item in &due {
            if let Err(e) = self.deliver(item, &catalog).await {
                warn!(reminder_id = %item.reminder.id, error = %e, "Failed to send reminder");
                continue;
            }
            if let Err(e) = reminders.mark_sent(item.reminder.id).await {
                warn!(reminder_id = %item.reminder.id, error = %e, "Failed to mark reminder sent");
                continue;
            }
            sent += 1;
        }
        Ok(sent)
    }

    async fn deliver(
        &self,
        item: &DueReminder,
        catalog: &[Product],
    ) -> Result<(), crate::services::email::EmailError> {
        let reminder = &item.reminder;
        let picks: Vec<Product> = recommendations::rank(catalog, reminder.occasion, DEFAULT_LIMIT)
            .into_iter()
            .cloned()
            .collect();
        self.email
            .send_reminder(
                &item.email,
                ReminderMail {
                    name: &item.first_name,
                    event: &reminder.event,
                    message: &reminder.reminder_msg,
                    date: reminder.date,
                    time: &reminder.time,
                    occasion: reminder.occasion.display_name(),
                },
                &picks,
                false,
            )
            .await
    }
}
