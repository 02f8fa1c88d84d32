//! Gift-contribution repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use best_wishes_core::{GiftContributionId, GiftContributionStatus, ProductId, UserId};

use super::RepositoryError;
use crate::models::gift_contribution::{
    ContributionParticipant, GiftContribution, GiftContributionDetail,
};

const CONTRIBUTION_COLUMNS: &str = r"
    g.id, g.created_by, g.product_id, g.amount, g.status, g.deadline, g.created_at, g.updated_at
";

#[derive(sqlx::FromRow)]
struct ContributionRow {
    #[sqlx(flatten)]
    contribution: GiftContribution,
    product_name: String,
}

pub struct GiftContributionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> GiftContributionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if an insert fails.
    pub async fn create(
        &self,
        created_by: UserId,
        product_id: ProductId,
        amount: Decimal,
        deadline: DateTime<Utc>,
        emails: &[String],
    ) -> Result<GiftContributionDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let id: GiftContributionId = sqlx::query_scalar(
            r"
            INSERT INTO gift_contributions (created_by, product_id, amount, deadline)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(created_by)
        .bind(product_id)
        .bind(amount)
        .bind(deadline)
        .fetch_one(&mut *tx)
        .await?;

        for email in emails {
            sqlx::query(
                r"INSERT INTO gift_contribution_participants (contribution_id, email) VALUES ($1, $2)",
            )
            .bind(id)
            .bind(email)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::unique(e, "duplicate participant"))?;
        }

        let detail = load_detail(&mut *tx, id).await?.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(detail)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(
        &self,
        id: GiftContributionId,
    ) -> Result<Option<GiftContributionDetail>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_detail(&mut conn, id).await
    }

    /// Contributions the user created or was invited to.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn for_user(
        &self,
        user_id: UserId,
        email: &str,
    ) -> Result<Vec<GiftContributionDetail>, RepositoryError> {
        let ids: Vec<GiftContributionId> = sqlx::query_scalar(
            r"
            SELECT g.id FROM gift_contributions g
            WHERE g.created_by = $1
               OR EXISTS (SELECT 1 FROM gift_contribution_participants p
                          WHERE p.contribution_id = g.id AND p.email = $2)
            ORDER BY g.created_at DESC
            ",
        )
        .bind(user_id)
        .bind(email)
        .fetch_all(self.pool)
        .await?;

        let mut conn = self.pool.acquire().await?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(detail) = load_detail(&mut conn, id).await? {
                out.push(detail);
            }
        }
        Ok(out)
    }
}

/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn load_detail(
    conn: &mut PgConnection,
    id: GiftContributionId,
) -> Result<Option<GiftContributionDetail>, RepositoryError> {
    let row = sqlx::query_as::<_, ContributionRow>(&format!(
        r"
        SELECT {CONTRIBUTION_COLUMNS}, p.name AS product_name
        FROM gift_contributions g JOIN products p ON p.id = g.product_id
        WHERE g.id = $1
        "
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let participants = sqlx::query_as::<_, ContributionParticipant>(
        r"
        SELECT email, has_paid, declined, paid_at
        FROM gift_contribution_participants
        WHERE contribution_id = $1
        ORDER BY id
        ",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(GiftContributionDetail {
        contribution: row.contribution,
        product_name: row.product_name,
        participants,
    }))
}

/// Lock a contribution row for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(
    conn: &mut PgConnection,
    id: GiftContributionId,
) -> Result<Option<GiftContribution>, RepositoryError> {
    let row = sqlx::query_as::<_, GiftContribution>(&format!(
        "SELECT {CONTRIBUTION_COLUMNS} FROM gift_contributions g WHERE g.id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

/// Mark the participant with this email as paid or declined.
/// Returns whether a participant row matched.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn respond(
    conn: &mut PgConnection,
    id: GiftContributionId,
    email: &str,
    paid: bool,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE gift_contribution_participants SET
            has_paid = has_paid OR $3,
            declined = NOT $3,
            paid_at = CASE WHEN $3 THEN NOW() ELSE paid_at END
        WHERE contribution_id = $1 AND email = $2
        ",
    )
    .bind(id)
    .bind(email)
    .bind(paid)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn set_status(
    conn: &mut PgConnection,
    id: GiftContributionId,
    status: GiftContributionStatus,
) -> Result<(), RepositoryError> {
    sqlx::query(r"UPDATE gift_contributions SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
