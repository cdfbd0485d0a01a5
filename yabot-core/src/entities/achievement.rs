use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

/// Per-user achievement progress. One row per `(user_id, achievement_id)`;
/// once `completed` flips the row is never mutated again, which is what
/// guards the unlock reward against double-firing.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct UserAchievement {
    pub user_id: String,
    pub achievement_id: String,
    pub current_value: i64,
    pub target_value: i64,
    pub completed: bool,
    pub unlocked_at: Option<time::OffsetDateTime>,
    pub created_at: time::OffsetDateTime,
}

impl UserAchievement {
    pub fn progress_percentage(&self) -> f64 {
        if self.target_value <= 0 {
            return 100.0;
        }
        (self.current_value as f64 / self.target_value as f64 * 100.0).min(100.0)
    }

    /// Ensure the progress row exists and return it under a row lock.
    pub async fn lock_or_insert_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: &str,
        achievement_id: &str,
        target_value: i64,
    ) -> Result<UserAchievement, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_achievements (user_id, achievement_id, target_value)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, achievement_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(achievement_id)
        .bind(target_value)
        .execute(&mut **tx)
        .await?;

        sqlx::query_as::<_, UserAchievement>(
            r#"
            SELECT user_id, achievement_id, current_value, target_value,
                   completed, unlocked_at, created_at
            FROM user_achievements
            WHERE user_id = $1 AND achievement_id = $2
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(achievement_id)
        .fetch_one(&mut **tx)
        .await
    }

    /// Persist advanced progress, flipping `completed` when crossed.
    pub async fn save_progress_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE user_achievements
            SET current_value = $3, completed = $4, unlocked_at = $5
            WHERE user_id = $1 AND achievement_id = $2
            "#,
        )
        .bind(&self.user_id)
        .bind(&self.achievement_id)
        .bind(self.current_value)
        .bind(self.completed)
        .bind(self.unlocked_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// All achievement progress rows of one user.
pub struct GetUserAchievements {
    pub user_id: String,
}

impl Processor<GetUserAchievements> for DatabaseProcessor {
    type Output = Vec<UserAchievement>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetUserAchievements")]
    async fn process(
        &self,
        query: GetUserAchievements,
    ) -> Result<Vec<UserAchievement>, sqlx::Error> {
        sqlx::query_as::<_, UserAchievement>(
            r#"
            SELECT user_id, achievement_id, current_value, target_value,
                   completed, unlocked_at, created_at
            FROM user_achievements
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(&query.user_id)
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_is_capped_at_hundred() {
        let row = UserAchievement {
            user_id: "u-1".into(),
            achievement_id: "missions_10".into(),
            current_value: 15,
            target_value: 10,
            completed: true,
            unlocked_at: Some(time::OffsetDateTime::UNIX_EPOCH),
            created_at: time::OffsetDateTime::UNIX_EPOCH,
        };
        assert_eq!(row.progress_percentage(), 100.0);
    }

    #[test]
    fn partial_progress_percentage() {
        let row = UserAchievement {
            user_id: "u-1".into(),
            achievement_id: "missions_10".into(),
            current_value: 4,
            target_value: 10,
            completed: false,
            unlocked_at: None,
            created_at: time::OffsetDateTime::UNIX_EPOCH,
        };
        assert_eq!(row.progress_percentage(), 40.0);
    }
}
