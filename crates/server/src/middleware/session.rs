//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions.

use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::ServerConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "bw_session";

/// Sessions end after seven days without a request.
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session layer with a `PostgreSQL` store.
///
/// The frontend runs on its own origin, so the cookie is `SameSite=None`
/// whenever it can be marked secure.
#[must_use]
pub fn create_session_layer(pool: &PgPool, config: &ServerConfig) -> SessionManagerLayer<PostgresStore> {
    // The sessions table is created by migration.
    let store = PostgresStore::new(pool.clone());

    let secure = config.is_secure();
    let same_site = if secure {
        tower_sessions::cookie::SameSite::None
    } else {
        tower_sessions::cookie::SameSite::Lax
    };

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(secure)
        .with_same_site(same_site)
        .with_http_only(true)
        .with_path("/")
}

/// Delete sessions past their expiry. Returns how many were removed.
///
/// # Errors
///
/// Returns the database error if the delete fails.
pub async fn purge_expired_sessions(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(r"DELETE FROM tower_sessions.session WHERE expiry_date < NOW()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
