//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::db::RepositoryError;
use crate::db::categories::CategoryRepository;
use crate::models::category::Category;
use crate::services::email::EmailService;
use crate::services::notifications::{NotificationHub, NotificationService};

/// Category listings cached per `active_only` flag.
type CategoryCache = Cache<bool, Arc<Vec<Category>>>;

const CATEGORY_CACHE_TTL: Duration = Duration::from_secs(300);

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    email: EmailService,
    hub: NotificationHub,
    categories: CategoryCache,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: ServerConfig, pool: PgPool, email: EmailService) -> Self {
        let categories = Cache::builder()
            .max_capacity(2)
            .time_to_live(CATEGORY_CACHE_TTL)
            .build();

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                email,
                hub: NotificationHub::default(),
                categories,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    /// Broadcast hub feeding the notification streams.
    #[must_use]
    pub fn hub(&self) -> &NotificationHub {
        &self.inner.hub
    }

    /// Notification service bound to this state.
    #[must_use]
    pub fn notifications(&self) -> NotificationService<'_> {
        NotificationService::new(
            &self.inner.pool,
            &self.inner.hub,
            &self.inner.email,
            &self.inner.config.frontend_url,
        )
    }

    /// Categories, served from cache for five minutes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the categories cannot be loaded.
    pub async fn categories(&self, active_only: bool) -> Result<Arc<Vec<Category>>, RepositoryError> {
        if let Some(hit) = self.inner.categories.get(&active_only).await {
            return Ok(hit);
        }
        let fresh = Arc::new(CategoryRepository::new(&self.inner.pool).list(active_only).await?);
        self.inner
            .categories
            .insert(active_only, Arc::clone(&fresh))
            .await;
        Ok(fresh)
    }

    /// Drop cached categories after a write.
    pub fn invalidate_categories(&self) {
        self.inner.categories.invalidate_all();
    }
}
