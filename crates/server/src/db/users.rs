//! User repository for database operations.

use sqlx::PgPool;

use best_wishes_core::{Email, UserId};

use super::RepositoryError;
use crate::models::user::{NewUser, ProfileUpdate, User, UserStatsRow};

const USER_COLUMNS: &str = r"
    u.id, u.first_name, u.last_name, u.email, u.password_hash, u.phone, u.address,
    u.zip_code, u.role, u.two_factor_enabled, u.is_blocked, u.profile_image,
    u.last_login, u.last_active_at, u.created_at, u.updated_at
";

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.email = $1"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// Whether an account already uses this email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn email_exists(&self, email: &Email) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar(r"SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, user: &NewUser) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(&format!(
            r"
            INSERT INTO users AS u
                (first_name, last_name, email, password_hash, phone, address, zip_code, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.phone)
        .bind(&user.address)
        .bind(&user.zip_code)
        .bind(user.role)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "email already exists"))
    }

    /// Replace the password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no user matched.
    pub async fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Replace the password hash for an email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no user matched.
    pub async fn update_password_by_email(
        &self,
        email: &Email,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"UPDATE users SET password_hash = $2, updated_at = NOW() WHERE email = $1",
        )
        .bind(email)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Update only the fields that are present.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no user matched.
    pub async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(&format!(
            r"
            UPDATE users AS u SET
                first_name = COALESCE($2, u.first_name),
                last_name = COALESCE($3, u.last_name),
                phone = COALESCE($4, u.phone),
                address = COALESCE($5, u.address),
                zip_code = COALESCE($6, u.zip_code),
                profile_image = COALESCE($7, u.profile_image),
                updated_at = NOW()
            WHERE u.id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.phone)
        .bind(&update.address)
        .bind(&update.zip_code)
        .bind(&update.profile_image)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Set the two-factor flag for an email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no user matched.
    pub async fn set_two_factor(
        &self,
        email: &Email,
        enabled: bool,
    ) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(&format!(
            r"
            UPDATE users AS u SET two_factor_enabled = $2, updated_at = NOW()
            WHERE u.email = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(email)
        .bind(enabled)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Record a successful login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn touch_login(&self, id: UserId) -> Result<(), RepositoryError> {
        sqlx::query(r"UPDATE users SET last_login = NOW(), last_active_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Record activity on an authenticated request.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn touch_active(&self, id: UserId) -> Result<(), RepositoryError> {
        sqlx::query(r"UPDATE users SET last_active_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// All users with their order count and lifetime spend, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_with_stats(&self) -> Result<Vec<UserStatsRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserStatsRow>(&format!(
            r"
            SELECT {USER_COLUMNS},
                   COUNT(o.id) AS total_orders,
                   COALESCE(SUM(o.total), 0) AS total_buying_amount
            FROM users u
            LEFT JOIN orders o ON o.user_id = u.id
            GROUP BY u.id
            ORDER BY u.created_at DESC
            "
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Block or unblock users. Returns how many rows changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_blocked(&self, ids: &[UserId], blocked: bool) -> Result<u64, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(UserId::as_i32).collect();
        let result = sqlx::query(
            r"UPDATE users SET is_blocked = $2, updated_at = NOW() WHERE id = ANY($1)",
        )
        .bind(&ids)
        .bind(blocked)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete users. Returns how many rows were removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_many(&self, ids: &[UserId]) -> Result<u64, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(UserId::as_i32).collect();
        let result = sqlx::query(r"DELETE FROM users WHERE id = ANY($1)")
            .bind(&ids)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
