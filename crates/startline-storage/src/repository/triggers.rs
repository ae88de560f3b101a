//! Trigger repository

use chrono::Utc;
use sqlx::SqlitePool;
use startline_common::types::{OrgId, TriggerId, TriggerType};
use uuid::Uuid;

use crate::models::{NewTrigger, Trigger};

/// Trigger repository
#[derive(Clone)]
pub struct TriggerRepository {
    pool: SqlitePool,
}

impl TriggerRepository {
    /// Create a new trigger repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a trigger, archiving every existing active trigger of the same
    /// type that the given predicate considers equivalent. The conflict
    /// search, the archival of the losers and the insert of the winner all
    /// happen in one transaction so two concurrently created equivalent
    /// triggers can never both end up active.
    pub async fn create_resolving_conflicts(
        &self,
        input: NewTrigger,
        conflicts_with: impl Fn(&Trigger) -> bool,
    ) -> Result<(Trigger, Vec<TriggerId>), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let candidates: Vec<Trigger> = sqlx::query_as(
            r#"
            SELECT * FROM triggers
            WHERE org_id = ? AND trigger_type = ? AND is_active = 1 AND is_archived = 0
            "#,
        )
        .bind(input.org_id)
        .bind(input.trigger_type.as_str())
        .fetch_all(&mut *tx)
        .await?;

        let now = Utc::now();
        let mut archived = Vec::new();
        for conflict in candidates.iter().filter(|t| conflicts_with(t)) {
            sqlx::query("UPDATE triggers SET is_archived = 1, updated_at = ? WHERE id = ?")
                .bind(now)
                .bind(conflict.id)
                .execute(&mut *tx)
                .await?;
            archived.push(conflict.id);
        }

        let trigger = Self::insert(&mut tx, input).await?;

        tx.commit().await?;

        Ok((trigger, archived))
    }

    /// Create a trigger without conflict resolution (import restores and
    /// schedule triggers, which never conflict)
    pub async fn create(&self, input: NewTrigger) -> Result<Trigger, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let trigger = Self::insert(&mut tx, input).await?;
        tx.commit().await?;
        Ok(trigger)
    }

    async fn insert(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        input: NewTrigger,
    ) -> Result<Trigger, sqlx::Error> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let keywords = if input.keywords.is_empty() {
            None
        } else {
            Some(serde_json::json!(input.keywords))
        };

        sqlx::query_as::<_, Trigger>(
            r#"
            INSERT INTO triggers (
                id, org_id, trigger_type, flow_id, keywords, match_type, group_ids,
                exclude_group_ids, contact_ids, channel_id, referrer_id, schedule_id,
                priority, is_archived, is_active, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 1, ?, ?)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.org_id)
        .bind(input.trigger_type.as_str())
        .bind(input.flow_id)
        .bind(keywords)
        .bind(input.match_type.map(|m| m.as_str()))
        .bind(serde_json::json!(input.group_ids))
        .bind(serde_json::json!(input.exclude_group_ids))
        .bind(serde_json::json!(input.contact_ids))
        .bind(input.channel_id)
        .bind(&input.referrer_id)
        .bind(input.schedule_id)
        .bind(input.priority)
        .bind(now)
        .bind(now)
        .fetch_one(&mut **tx)
        .await
    }

    /// Get a trigger by ID
    pub async fn get(&self, id: TriggerId) -> Result<Option<Trigger>, sqlx::Error> {
        sqlx::query_as::<_, Trigger>("SELECT * FROM triggers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List active, non-archived triggers of a type for an org
    pub async fn list_active_by_type(
        &self,
        org_id: OrgId,
        trigger_type: TriggerType,
    ) -> Result<Vec<Trigger>, sqlx::Error> {
        sqlx::query_as::<_, Trigger>(
            r#"
            SELECT * FROM triggers
            WHERE org_id = ? AND trigger_type = ? AND is_active = 1 AND is_archived = 0
            ORDER BY created_at
            "#,
        )
        .bind(org_id)
        .bind(trigger_type.as_str())
        .fetch_all(&self.pool)
        .await
    }

    /// List active but archived triggers of a type for an org
    pub async fn list_archived_by_type(
        &self,
        org_id: OrgId,
        trigger_type: TriggerType,
    ) -> Result<Vec<Trigger>, sqlx::Error> {
        sqlx::query_as::<_, Trigger>(
            r#"
            SELECT * FROM triggers
            WHERE org_id = ? AND trigger_type = ? AND is_active = 1 AND is_archived = 1
            ORDER BY created_at
            "#,
        )
        .bind(org_id)
        .bind(trigger_type.as_str())
        .fetch_all(&self.pool)
        .await
    }

    /// List all triggers for an org
    pub async fn list_by_org(&self, org_id: OrgId) -> Result<Vec<Trigger>, sqlx::Error> {
        sqlx::query_as::<_, Trigger>(
            "SELECT * FROM triggers WHERE org_id = ? ORDER BY created_at",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Set the archived flag of a trigger
    pub async fn set_archived(
        &self,
        id: TriggerId,
        archived: bool,
    ) -> Result<Option<Trigger>, sqlx::Error> {
        sqlx::query_as::<_, Trigger>(
            "UPDATE triggers SET is_archived = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(archived)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Deactivate a trigger and detach its schedule
    pub async fn release(&self, id: TriggerId) -> Result<Option<Trigger>, sqlx::Error> {
        sqlx::query_as::<_, Trigger>(
            r#"
            UPDATE triggers SET is_active = 0, schedule_id = NULL, updated_at = ?
            WHERE id = ? RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Count triggers for an org
    pub async fn count_by_org(&self, org_id: OrgId) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM triggers WHERE org_id = ?")
            .bind(org_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
