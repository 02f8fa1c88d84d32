//! Notification routes (`/api/notifications`).
//!
//! `GET /stream` pushes new notifications as Server-Sent Events. Each stream
//! subscribes to the shared hub and keeps only the caller's rows.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::{delete, get, put},
};
use futures::stream::{self, Stream};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::{Receiver, error::RecvError};

use best_wishes_core::{NotificationId, UserId};

use crate::db::Page;
use crate::db::notifications::NotificationRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::notification::Notification;
use crate::routes::extract::{ApiPath, ApiQuery};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 20;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/unread-count", get(unread_count))
        .route("/mark-all-read", put(mark_all_read))
        .route("/stream", get(stream))
        .route("/{id}/read", put(mark_read))
        .route("/{id}", delete(remove))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<serde_json::Value>> {
    let page = Page::new(query.page, query.limit, DEFAULT_LIMIT);
    let repo = NotificationRepository::new(state.pool());
    let (notifications, total) = repo.list(user.id, page).await?;
    let unread = repo.unread_count(user.id).await?;

    Ok(Json(json!({
        "success": true,
        "notifications": notifications,
        "pagination": {
            "currentPage": page.page,
            "totalPages": page.total_pages(total),
            "totalCount": total,
        },
        "unreadCount": unread,
    })))
}

pub async fn unread_count(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<serde_json::Value>> {
    let count = NotificationRepository::new(state.pool())
        .unread_count(user.id)
        .await?;
    Ok(Json(json!({ "success": true, "unreadCount": count })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<NotificationId>,
) -> Result<Json<serde_json::Value>> {
    let notification = NotificationRepository::new(state.pool())
        .mark_read(id, user.id)
        .await
        .map_err(AppError::missing("Notification"))?;
    Ok(Json(json!({ "success": true, "notification": notification })))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<serde_json::Value>> {
    let updated = NotificationRepository::new(state.pool())
        .mark_all_read(user.id)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "All notifications marked as read",
        "updated": updated,
    })))
}

pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<NotificationId>,
) -> Result<Json<serde_json::Value>> {
    NotificationRepository::new(state.pool())
        .delete(id, user.id)
        .await
        .map_err(AppError::missing("Notification"))?;
    Ok(Json(json!({ "success": true, "message": "Notification deleted" })))
}

/// Live feed of the caller's new notifications.
pub async fn stream(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    tracing::debug!(user_id = %user.id, "Notification stream opened");
    let events = user_events(state.hub().subscribe(), user.id);
    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// Turn hub messages into SSE events for one user.
///
/// A lagging receiver skips what it missed; the client can refetch the list.
fn user_events(
    receiver: Receiver<Notification>,
    user_id: UserId,
) -> impl Stream<Item = std::result::Result<Event, Infallible>> {
    stream::unfold(receiver, move |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(notification) if notification.user_id == user_id => {
                    let event = Event::default()
                        .event("notification")
                        .id(notification.id.to_string())
                        .json_data(&notification)
                        .unwrap_or_else(|_| Event::default().event("notification"));
                    return Some((Ok(event), receiver));
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id = %user_id, skipped, "Notification stream lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use best_wishes_core::{NotificationPriority, NotificationType};
    use chrono::Utc;
    use futures::StreamExt;

    use crate::services::notifications::NotificationHub;

    fn notification(id: i32, user: i32) -> Notification {
        Notification {
            id: NotificationId::new(id),
            user_id: UserId::new(user),
            title: "Order Confirmed".to_string(),
            message: "Your order #000001 has been confirmed.".to_string(),
            kind: NotificationType::Order,
            is_read: false,
            priority: NotificationPriority::Medium,
            related_id: Some(1),
            related_model: Some("Order".to_string()),
            action_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_stream_only_yields_own_notifications() {
        let hub = NotificationHub::new(8);
        let events = user_events(hub.subscribe(), UserId::new(2));
        hub.publish(notification(1, 1));
        hub.publish(notification(2, 2));
        hub.publish(notification(3, 1));
        hub.publish(notification(4, 2));
        drop(hub);

        let received: Vec<_> = events.collect().await;
        assert_eq!(received.len(), 2);
    }

    #[tokio::test]
    async fn test_stream_ends_when_hub_closes() {
        let hub = NotificationHub::new(8);
        let mut events = Box::pin(user_events(hub.subscribe(), UserId::new(1)));
        drop(hub);
        assert!(events.next().await.is_none());
    }
}
