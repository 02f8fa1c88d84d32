//! In-app notifications.

use chrono::{DateTime, Utc};
use serde::Serialize;

use best_wishes_core::{NotificationId, NotificationPriority, NotificationType, UserId};

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub is_read: bool,
    pub priority: NotificationPriority,
    pub related_id: Option<i32>,
    pub related_model: Option<String>,
    pub action_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A notification to persist and push.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub kind: NotificationType,
    pub priority: NotificationPriority,
    pub related_id: Option<i32>,
    pub related_model: Option<String>,
    pub action_url: Option<String>,
}

impl NewNotification {
    #[must_use]
    pub fn new(user_id: UserId, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id,
            title: title.into(),
            message: message.into(),
            kind: NotificationType::default(),
            priority: NotificationPriority::default(),
            related_id: None,
            related_model: None,
            action_url: None,
        }
    }

    #[must_use]
    pub const fn kind(mut self, kind: NotificationType) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub const fn priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Point the notification at another record, e.g. `("Order", 42)`.
    #[must_use]
    pub fn related(mut self, model: &str, id: i32) -> Self {
        self.related_model = Some(model.to_string());
        self.related_id = Some(id);
        self
    }

    #[must_use]
    pub fn action_url(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }
}
