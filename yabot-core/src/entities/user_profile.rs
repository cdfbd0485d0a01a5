use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

/// The user record owning the besitos balance.
///
/// The balance is mutated only inside the same database transaction as the
/// corresponding ledger insert; see `wallet`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct UserProfile {
    pub user_id: String,
    pub besitos_balance: i64,
    pub last_daily_gift_at: Option<time::OffsetDateTime>,
    pub created_at: time::OffsetDateTime,
    pub updated_at: time::OffsetDateTime,
}

impl UserProfile {
    /// Ensure the profile row exists (balance 0) and return the current
    /// balance under a row lock. Serializes concurrent wallet mutations
    /// for the same user at the storage layer.
    pub async fn lock_balance_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: &str,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query(
            "INSERT INTO user_profiles (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

        sqlx::query_scalar::<_, i64>(
            "SELECT besitos_balance FROM user_profiles WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await
    }

    /// Row-locked balance read that does NOT create a missing profile.
    ///
    /// Used by the spend path, where an absent profile means insufficient
    /// funds rather than a fresh zero-balance account.
    pub async fn lock_balance_existing_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: &str,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT besitos_balance FROM user_profiles WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Write the new balance inside the caller's transaction.
    pub async fn set_balance_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: &str,
        balance: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE user_profiles SET besitos_balance = $2, updated_at = now() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(balance)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Atomically claim the daily gift slot.
    ///
    /// Returns `true` when the claim succeeded, `false` when the cooldown
    /// has not elapsed. The conditional UPDATE makes concurrent claims for
    /// the same user race safely: only one sees an affected row.
    pub async fn try_claim_daily_gift(
        pool: &sqlx::PgPool,
        user_id: &str,
        cooldown: std::time::Duration,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query(
            "INSERT INTO user_profiles (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(pool)
        .await?;

        let result = sqlx::query(
            r#"
            UPDATE user_profiles
            SET last_daily_gift_at = now(), updated_at = now()
            WHERE user_id = $1
              AND (last_daily_gift_at IS NULL
                   OR last_daily_gift_at < now() - ($2::double precision * interval '1 second'))
            "#,
        )
        .bind(user_id)
        .bind(cooldown.as_secs_f64())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone)]
/// Get a user's current balance. Unknown users read as 0.
pub struct GetBalance {
    pub user_id: String,
}

impl Processor<GetBalance> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetBalance")]
    async fn process(&self, query: GetBalance) -> Result<i64, sqlx::Error> {
        let balance = sqlx::query_scalar::<_, i64>(
            "SELECT besitos_balance FROM user_profiles WHERE user_id = $1",
        )
        .bind(&query.user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(balance.unwrap_or(0))
    }
}

#[derive(Debug, Clone)]
/// Fetch the full profile row.
pub struct GetProfile {
    pub user_id: String,
}

impl Processor<GetProfile> for DatabaseProcessor {
    type Output = Option<UserProfile>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetProfile")]
    async fn process(&self, query: GetProfile) -> Result<Option<UserProfile>, sqlx::Error> {
        sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT user_id, besitos_balance, last_daily_gift_at, created_at, updated_at
            FROM user_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(&query.user_id)
        .fetch_optional(&self.pool)
        .await
    }
}
