use crate::entities::{SubscriptionPlan, SubscriptionStatus};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Subscription {
    pub subscription_id: Uuid,
    pub user_id: String,
    pub plan: SubscriptionPlan,
    pub status: SubscriptionStatus,
    pub start_date: time::OffsetDateTime,
    /// `None` means the subscription never expires.
    pub end_date: Option<time::OffsetDateTime>,
    pub created_at: time::OffsetDateTime,
    pub updated_at: time::OffsetDateTime,
}

impl Subscription {
    /// Whether this row should have expired by `now`.
    pub fn is_past_due(&self, now: time::OffsetDateTime) -> bool {
        self.status == SubscriptionStatus::Active
            && self.end_date.is_some_and(|end| end < now)
    }

    /// Whether this row currently grants VIP access.
    pub fn grants_vip(&self, now: time::OffsetDateTime) -> bool {
        self.status == SubscriptionStatus::Active
            && !self.is_past_due(now)
            && matches!(self.plan, SubscriptionPlan::Vip | SubscriptionPlan::Premium)
    }
}

const SUBSCRIPTION_COLUMNS: &str =
    "subscription_id, user_id, plan, status, start_date, end_date, created_at, updated_at";

impl Subscription {
    /// Upsert the user's subscription as active with the given plan.
    pub async fn upsert_active(
        pool: &sqlx::PgPool,
        user_id: &str,
        plan: SubscriptionPlan,
        end_date: Option<time::OffsetDateTime>,
    ) -> Result<Subscription, sqlx::Error> {
        sqlx::query_as::<_, Subscription>(&format!(
            r#"
            INSERT INTO subscriptions (subscription_id, user_id, plan, status, start_date, end_date)
            VALUES ($1, $2, $3, 'active', now(), $4)
            ON CONFLICT (user_id) DO UPDATE
            SET plan = EXCLUDED.plan,
                status = 'active',
                start_date = now(),
                end_date = EXCLUDED.end_date,
                updated_at = now()
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(plan)
        .bind(end_date)
        .fetch_one(pool)
        .await
    }

    /// Flip one subscription to expired. Returns whether a row changed,
    /// so the lazy path publishes an update event at most once.
    pub async fn expire(pool: &sqlx::PgPool, subscription_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE subscriptions SET status = 'expired', updated_at = now() \
             WHERE subscription_id = $1 AND status = 'active'",
        )
        .bind(subscription_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Bulk sweep: expire every active subscription past its end date and
    /// return the transitioned rows for per-row event publication.
    pub async fn expire_due_bulk(pool: &sqlx::PgPool) -> Result<Vec<Subscription>, sqlx::Error> {
        sqlx::query_as::<_, Subscription>(&format!(
            r#"
            UPDATE subscriptions
            SET status = 'expired', updated_at = now()
            WHERE status = 'active'
              AND end_date IS NOT NULL
              AND end_date < now()
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#,
        ))
        .fetch_all(pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// The user's subscription row, if any.
pub struct GetSubscription {
    pub user_id: String,
}

impl Processor<GetSubscription> for DatabaseProcessor {
    type Output = Option<Subscription>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetSubscription")]
    async fn process(&self, query: GetSubscription) -> Result<Option<Subscription>, sqlx::Error> {
        sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = $1",
        ))
        .bind(&query.user_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription(
        plan: SubscriptionPlan,
        status: SubscriptionStatus,
        end_date: Option<time::OffsetDateTime>,
    ) -> Subscription {
        Subscription {
            subscription_id: Uuid::new_v4(),
            user_id: "u-1".into(),
            plan,
            status,
            start_date: time::OffsetDateTime::UNIX_EPOCH,
            end_date,
            created_at: time::OffsetDateTime::UNIX_EPOCH,
            updated_at: time::OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn active_vip_within_end_date_grants_vip() {
        let now = time::OffsetDateTime::UNIX_EPOCH + time::Duration::days(1);
        let sub = subscription(
            SubscriptionPlan::Vip,
            SubscriptionStatus::Active,
            Some(now + time::Duration::days(30)),
        );
        assert!(sub.grants_vip(now));
        assert!(!sub.is_past_due(now));
    }

    #[test]
    fn past_end_date_is_due_and_not_vip() {
        let now = time::OffsetDateTime::UNIX_EPOCH + time::Duration::days(31);
        let sub = subscription(
            SubscriptionPlan::Premium,
            SubscriptionStatus::Active,
            Some(time::OffsetDateTime::UNIX_EPOCH + time::Duration::days(30)),
        );
        assert!(sub.is_past_due(now));
        assert!(!sub.grants_vip(now));
    }

    #[test]
    fn free_plan_never_grants_vip() {
        let now = time::OffsetDateTime::UNIX_EPOCH;
        let sub = subscription(SubscriptionPlan::Free, SubscriptionStatus::Active, None);
        assert!(!sub.grants_vip(now));
    }

    #[test]
    fn open_ended_subscription_never_expires() {
        let now = time::OffsetDateTime::UNIX_EPOCH + time::Duration::days(10_000);
        let sub = subscription(SubscriptionPlan::Vip, SubscriptionStatus::Active, None);
        assert!(!sub.is_past_due(now));
        assert!(sub.grants_vip(now));
    }
}
