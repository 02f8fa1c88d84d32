//! Notification persistence, live push, and status emails.
//!
//! Notifications are stored first, then published on a broadcast channel that
//! feeds the per-user SSE streams. Push and email are best effort: once the
//! row exists, later failures are only logged.

use sqlx::PgPool;
use tokio::sync::broadcast;

use best_wishes_core::{NotificationPriority, NotificationType, OrderId, OrderStatus, UserId};

use crate::db::RepositoryError;
use crate::db::notifications::NotificationRepository;
use crate::db::users::UserRepository;
use crate::models::notification::{NewNotification, Notification};
use crate::services::email::EmailService;

/// Buffered notifications per subscriber before slow streams start lagging.
pub const HUB_CAPACITY: usize = 256;

/// Fan-out of freshly stored notifications to connected clients.
#[derive(Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<Notification>,
}

impl NotificationHub {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Publish to every live subscriber. Having none is not an error.
    pub fn publish(&self, notification: Notification) {
        let _ = self.sender.send(notification);
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(HUB_CAPACITY)
    }
}

/// Title and message for an order entering `status`.
#[must_use]
pub fn order_status_copy(order_id: OrderId, status: OrderStatus) -> (&'static str, String) {
    let reference = order_id.reference();
    match status {
        OrderStatus::Pending => (
            "Order Created Successfully",
            format!("Your order #{reference} has been created and is pending confirmation."),
        ),
        OrderStatus::Processing => (
            "Order Confirmed",
            format!("Your order #{reference} has been confirmed and is now being processed."),
        ),
        OrderStatus::Packing => (
            "Order Being Packed",
            format!("Your order #{reference} is now being packed for shipment."),
        ),
        OrderStatus::Shipped => (
            "Order Ready for Delivery",
            format!("Your order #{reference} is packed and ready for delivery!"),
        ),
        OrderStatus::Delivered => (
            "Order Delivered Successfully",
            format!(
                "Your order #{reference} has been delivered successfully! Thank you for choosing Best Wishes."
            ),
        ),
        OrderStatus::Cancelled => (
            "Order Cancelled",
            format!("Your order #{reference} has been cancelled."),
        ),
    }
}

/// Title and message for any other tracked item changing status.
#[must_use]
pub fn status_update_copy(what: &str, reference: &str, status: &str) -> (&'static str, String) {
    (
        "Order Status Updated",
        format!("Your {what} #{reference} status has been updated to {status}."),
    )
}

pub struct NotificationService<'a> {
    pool: &'a PgPool,
    hub: &'a NotificationHub,
    email: &'a EmailService,
    frontend_url: &'a str,
}

impl<'a> NotificationService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        hub: &'a NotificationHub,
        email: &'a EmailService,
        frontend_url: &'a str,
    ) -> Self {
        Self {
            pool,
            hub,
            email,
            frontend_url,
        }
    }

    /// Store a notification and push it to live streams.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the notification cannot be stored.
    pub async fn notify(&self, new: NewNotification) -> Result<Notification, RepositoryError> {
        let notification = NotificationRepository::new(self.pool).create(&new).await?;
        self.hub.publish(notification.clone());
        Ok(notification)
    }

    /// Store, push, and email an order status change.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the notification cannot be stored.
    pub async fn order_status(
        &self,
        user_id: UserId,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Notification, RepositoryError> {
        let (title, message) = order_status_copy(order_id, status);
        let priority = if matches!(status, OrderStatus::Delivered | OrderStatus::Cancelled) {
            NotificationPriority::High
        } else {
            NotificationPriority::Medium
        };
        let notification = self
            .notify(
                NewNotification::new(user_id, title, message.clone())
                    .kind(NotificationType::Order)
                    .priority(priority)
                    .related("Order", order_id.as_i32())
                    .action_url("/user/orders"),
            )
            .await?;

        self.email_user(user_id, title, message, "/user/orders").await;
        Ok(notification)
    }

    /// Store, push, and email a status change for a gift or group purchase.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the notification cannot be stored.
    pub async fn item_status(
        &self,
        user_id: UserId,
        related: (&str, i32),
        what: &str,
        status: &str,
    ) -> Result<Notification, RepositoryError> {
        let reference = format!("{:06}", related.1);
        let (title, message) = status_update_copy(what, &reference, status);
        let notification = self
            .notify(
                NewNotification::new(user_id, title, message.clone())
                    .kind(NotificationType::Gift)
                    .related(related.0, related.1),
            )
            .await?;

        self.email_user(user_id, title, message, "/user/orders").await;
        Ok(notification)
    }

    async fn email_user(&self, user_id: UserId, subject: &str, message: String, path: &str) {
        let user = match UserRepository::new(self.pool).get_by_id(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, user_id = %user_id, "Could not load user for status email");
                return;
            }
        };
        let link = format!("{}{path}", self.frontend_url);
        let lines = vec![format!("Dear {},", user.first_name), message];
        if let Err(e) = self
            .email
            .send_notice(user.email.as_str(), subject, subject, &lines, Some(&link))
            .await
        {
            tracing::warn!(error = %e, user_id = %user_id, "Failed to send status email");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_copy_uses_padded_reference() {
        let (title, message) = order_status_copy(OrderId::new(42), OrderStatus::Shipped);
        assert_eq!(title, "Order Ready for Delivery");
        assert_eq!(message, "Your order #000042 is packed and ready for delivery!");
    }

    #[test]
    fn test_every_order_status_has_copy() {
        for status in OrderStatus::ALL {
            let (title, message) = order_status_copy(OrderId::new(7), *status);
            assert!(!title.is_empty());
            assert!(message.contains("#000007"));
        }
    }

    #[test]
    fn test_generic_status_copy() {
        let (title, message) = status_update_copy("surprise gift", "000012", "OutForDelivery");
        assert_eq!(title, "Order Status Updated");
        assert!(message.ends_with("updated to OutForDelivery."));
    }

    #[tokio::test]
    async fn test_hub_delivers_to_subscribers() {
        let hub = NotificationHub::new(4);
        let mut rx = hub.subscribe();
        let now = chrono::Utc::now();
        hub.publish(Notification {
            id: best_wishes_core::NotificationId::new(1),
            user_id: UserId::new(5),
            title: "Hi".to_string(),
            message: "There".to_string(),
            kind: NotificationType::System,
            is_read: false,
            priority: NotificationPriority::Low,
            related_id: None,
            related_model: None,
            action_url: None,
            created_at: now,
            updated_at: now,
        });
        let received = rx.recv().await.unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(received.user_id, UserId::new(5));
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let hub = NotificationHub::default();
        drop(hub.subscribe());
        let now = chrono::Utc::now();
        hub.publish(Notification {
            id: best_wishes_core::NotificationId::new(2),
            user_id: UserId::new(1),
            title: String::new(),
            message: String::new(),
            kind: NotificationType::System,
            is_read: false,
            priority: NotificationPriority::Medium,
            related_id: None,
            related_model: None,
            action_url: None,
            created_at: now,
            updated_at: now,
        });
    }
}
