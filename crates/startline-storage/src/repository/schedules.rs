//! Schedule repository

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use startline_common::types::{OrgId, RepeatPeriod, ScheduleId};
use uuid::Uuid;

use crate::models::Schedule;

/// Schedule repository
#[derive(Clone)]
pub struct ScheduleRepository {
    pool: SqlitePool,
}

impl ScheduleRepository {
    /// Create a new schedule repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a schedule
    pub async fn create(
        &self,
        org_id: OrgId,
        repeat_period: RepeatPeriod,
        next_fire: Option<DateTime<Utc>>,
    ) -> Result<Schedule, sqlx::Error> {
        let now = Utc::now();

        sqlx::query_as::<_, Schedule>(
            r#"
            INSERT INTO schedules (id, org_id, repeat_period, next_fire, is_paused, created_at, updated_at)
            VALUES (?, ?, ?, ?, 0, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(repeat_period.as_str())
        .bind(next_fire)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
    }

    /// Get a schedule by ID
    pub async fn get(&self, id: ScheduleId) -> Result<Option<Schedule>, sqlx::Error> {
        sqlx::query_as::<_, Schedule>("SELECT * FROM schedules WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Pause or resume a schedule
    pub async fn set_paused(
        &self,
        id: ScheduleId,
        paused: bool,
    ) -> Result<Option<Schedule>, sqlx::Error> {
        sqlx::query_as::<_, Schedule>(
            "UPDATE schedules SET is_paused = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(paused)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Delete a schedule
    pub async fn delete(&self, id: ScheduleId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count schedules for an org
    pub async fn count_by_org(&self, org_id: OrgId) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schedules WHERE org_id = ?")
            .bind(org_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
