use crate::entities::{MissionKind, MissionStatus};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// The interaction that advances an objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveTrigger {
    Reaction,
    Decision,
    Interaction,
    DailyClaim,
}

/// One tracked objective inside a mission. Stored as JSONB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub objective_id: String,
    pub description: String,
    pub trigger: ObjectiveTrigger,
    pub target_value: i64,
    pub current_value: i64,
    pub completed: bool,
}

impl Objective {
    /// Advance by `increment`, capping at the target. Returns whether this
    /// call completed the objective.
    fn advance(&mut self, increment: i64) -> bool {
        if self.completed {
            return false;
        }
        self.current_value = (self.current_value + increment).min(self.target_value);
        if self.current_value >= self.target_value {
            self.completed = true;
            return true;
        }
        false
    }
}

/// Result of applying progress to a mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressOutcome {
    /// The named objective does not exist on this mission.
    ObjectiveNotFound,
    /// Progress recorded; the mission is still in flight.
    Advanced,
    /// This update completed the last open objective.
    MissionCompleted,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Mission {
    pub mission_id: Uuid,
    pub user_id: String,
    pub kind: MissionKind,
    pub status: MissionStatus,
    pub title: String,
    pub objectives: Json<Vec<Objective>>,
    pub reward_besitos: i64,
    pub reward_items: Json<Vec<String>>,
    pub expires_at: Option<time::OffsetDateTime>,
    pub created_at: time::OffsetDateTime,
    pub updated_at: time::OffsetDateTime,
}

impl Mission {
    pub fn all_objectives_completed(&self) -> bool {
        self.objectives.0.iter().all(|o| o.completed)
    }

    /// Apply an increment to one named objective.
    ///
    /// The first progress on an `available` mission moves it to
    /// `in_progress`; completing the last objective moves it to
    /// `completed`. The caller persists the new state and, on
    /// [`ProgressOutcome::MissionCompleted`], distributes rewards.
    pub fn apply_increment(&mut self, objective_id: &str, increment: i64) -> ProgressOutcome {
        let Some(objective) = self
            .objectives
            .0
            .iter_mut()
            .find(|o| o.objective_id == objective_id)
        else {
            return ProgressOutcome::ObjectiveNotFound;
        };
        objective.advance(increment);

        if self.status == MissionStatus::Available {
            self.status = MissionStatus::InProgress;
        }
        if self.all_objectives_completed() {
            self.status = MissionStatus::Completed;
            return ProgressOutcome::MissionCompleted;
        }
        ProgressOutcome::Advanced
    }

    /// Advance every objective matching `trigger` by one.
    ///
    /// Returns `(advanced, completed)`: whether any objective moved, and
    /// whether the mission completed as a result.
    pub fn apply_trigger(&mut self, trigger: ObjectiveTrigger) -> (bool, bool) {
        let mut advanced = false;
        for objective in self.objectives.0.iter_mut() {
            if objective.trigger == trigger && !objective.completed {
                objective.advance(1);
                advanced = true;
            }
        }
        if !advanced {
            return (false, false);
        }
        if self.status == MissionStatus::Available {
            self.status = MissionStatus::InProgress;
        }
        if self.all_objectives_completed() {
            self.status = MissionStatus::Completed;
            return (true, true);
        }
        (true, false)
    }

    /// Force every objective to its target and complete the mission.
    pub fn force_complete(&mut self) {
        for objective in self.objectives.0.iter_mut() {
            objective.current_value = objective.target_value;
            objective.completed = true;
        }
        self.status = MissionStatus::Completed;
    }
}

const MISSION_COLUMNS: &str = "mission_id, user_id, kind, status, title, objectives, \
     reward_besitos, reward_items, expires_at, created_at, updated_at";

impl Mission {
    /// Persist a freshly instantiated mission.
    pub async fn insert(&self, pool: &sqlx::PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO missions
                (mission_id, user_id, kind, status, title, objectives,
                 reward_besitos, reward_items, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(self.mission_id)
        .bind(&self.user_id)
        .bind(self.kind)
        .bind(self.status)
        .bind(&self.title)
        .bind(&self.objectives)
        .bind(self.reward_besitos)
        .bind(&self.reward_items)
        .bind(self.expires_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Row-locked fetch of a user's mission for a progress update.
    pub async fn lock_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: &str,
        mission_id: Uuid,
    ) -> Result<Option<Mission>, sqlx::Error> {
        sqlx::query_as::<_, Mission>(&format!(
            "SELECT {MISSION_COLUMNS} FROM missions \
             WHERE mission_id = $1 AND user_id = $2 FOR UPDATE",
        ))
        .bind(mission_id)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Write back objectives and status after a progress mutation.
    pub async fn save_progress_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE missions SET objectives = $2, status = $3, updated_at = now() \
             WHERE mission_id = $1",
        )
        .bind(self.mission_id)
        .bind(&self.objectives)
        .bind(self.status)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Bulk-expire missions past their deadline. Returns the count affected.
    pub async fn expire_due(pool: &sqlx::PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE missions
            SET status = 'expired', updated_at = now()
            WHERE status IN ('available', 'in_progress')
              AND expires_at IS NOT NULL
              AND expires_at < now()
            "#,
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
/// Find a user's active (available or in-progress) mission of one kind.
///
/// Backs the at-most-one-active-mission-per-kind invariant: assignment
/// looks up before instantiating.
pub struct FindActiveMission {
    pub user_id: String,
    pub kind: MissionKind,
}

impl Processor<FindActiveMission> for DatabaseProcessor {
    type Output = Option<Mission>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:FindActiveMission")]
    async fn process(&self, query: FindActiveMission) -> Result<Option<Mission>, sqlx::Error> {
        sqlx::query_as::<_, Mission>(&format!(
            "SELECT {MISSION_COLUMNS} FROM missions \
             WHERE user_id = $1 AND kind = $2 AND status IN ('available', 'in_progress') \
             ORDER BY created_at DESC LIMIT 1",
        ))
        .bind(&query.user_id)
        .bind(query.kind)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// All active missions of one user, oldest first.
pub struct ListActiveMissions {
    pub user_id: String,
}

impl Processor<ListActiveMissions> for DatabaseProcessor {
    type Output = Vec<Mission>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListActiveMissions")]
    async fn process(&self, query: ListActiveMissions) -> Result<Vec<Mission>, sqlx::Error> {
        sqlx::query_as::<_, Mission>(&format!(
            "SELECT {MISSION_COLUMNS} FROM missions \
             WHERE user_id = $1 AND status IN ('available', 'in_progress') \
             ORDER BY created_at ASC",
        ))
        .bind(&query.user_id)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Count a user's completed missions of one kind (follow-on assignment).
pub struct CountCompletedMissions {
    pub user_id: String,
    pub kind: MissionKind,
}

impl Processor<CountCompletedMissions> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CountCompletedMissions")]
    async fn process(&self, query: CountCompletedMissions) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM missions \
             WHERE user_id = $1 AND kind = $2 AND status = 'completed'",
        )
        .bind(&query.user_id)
        .bind(query.kind)
        .fetch_one(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_objective_mission() -> Mission {
        Mission {
            mission_id: Uuid::new_v4(),
            user_id: "u-1".into(),
            kind: MissionKind::Daily,
            status: MissionStatus::Available,
            title: "Daily check-in".into(),
            objectives: Json(vec![
                Objective {
                    objective_id: "a".into(),
                    description: "first".into(),
                    trigger: ObjectiveTrigger::Reaction,
                    target_value: 1,
                    current_value: 0,
                    completed: false,
                },
                Objective {
                    objective_id: "b".into(),
                    description: "second".into(),
                    trigger: ObjectiveTrigger::Decision,
                    target_value: 1,
                    current_value: 0,
                    completed: false,
                },
            ]),
            reward_besitos: 25,
            reward_items: Json(vec![]),
            expires_at: None,
            created_at: time::OffsetDateTime::UNIX_EPOCH,
            updated_at: time::OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn first_objective_leaves_mission_in_progress() {
        let mut mission = two_objective_mission();
        let outcome = mission.apply_increment("a", 1);
        assert_eq!(outcome, ProgressOutcome::Advanced);
        assert_eq!(mission.status, MissionStatus::InProgress);
    }

    #[test]
    fn last_objective_completes_mission() {
        let mut mission = two_objective_mission();
        mission.apply_increment("a", 1);
        let outcome = mission.apply_increment("b", 1);
        assert_eq!(outcome, ProgressOutcome::MissionCompleted);
        assert_eq!(mission.status, MissionStatus::Completed);
    }

    #[test]
    fn unknown_objective_reports_not_found() {
        let mut mission = two_objective_mission();
        assert_eq!(
            mission.apply_increment("nope", 1),
            ProgressOutcome::ObjectiveNotFound
        );
        assert_eq!(mission.status, MissionStatus::Available);
    }

    #[test]
    fn increments_cap_at_target() {
        let mut mission = two_objective_mission();
        mission.apply_increment("a", 100);
        assert_eq!(mission.objectives.0[0].current_value, 1);
        assert!(mission.objectives.0[0].completed);
    }

    #[test]
    fn trigger_advances_only_matching_objectives() {
        let mut mission = two_objective_mission();
        let (advanced, completed) = mission.apply_trigger(ObjectiveTrigger::Reaction);
        assert!(advanced);
        assert!(!completed);
        assert!(mission.objectives.0[0].completed);
        assert!(!mission.objectives.0[1].completed);

        let (_, completed) = mission.apply_trigger(ObjectiveTrigger::Decision);
        assert!(completed);
    }

    #[test]
    fn force_complete_fills_every_objective() {
        let mut mission = two_objective_mission();
        mission.force_complete();
        assert!(mission.all_objectives_completed());
        assert_eq!(mission.status, MissionStatus::Completed);
    }
}
