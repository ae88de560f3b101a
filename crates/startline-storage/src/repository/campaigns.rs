//! Campaign repository

use chrono::Utc;
use sqlx::SqlitePool;
use startline_common::types::{CampaignId, GroupId, OrgId};
use uuid::Uuid;

use crate::models::Campaign;

/// Campaign repository
#[derive(Clone)]
pub struct CampaignRepository {
    pool: SqlitePool,
}

impl CampaignRepository {
    /// Create a new campaign repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a campaign
    pub async fn create(
        &self,
        org_id: OrgId,
        name: &str,
        group_id: GroupId,
    ) -> Result<Campaign, sqlx::Error> {
        self.create_with_id(Uuid::new_v4(), org_id, name, group_id).await
    }

    /// Create a campaign with a caller-chosen id, used by imports which
    /// preserve the exported UUID
    pub async fn create_with_id(
        &self,
        id: CampaignId,
        org_id: OrgId,
        name: &str,
        group_id: GroupId,
    ) -> Result<Campaign, sqlx::Error> {
        let now = Utc::now();

        sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (id, org_id, name, group_id, is_archived, created_at, updated_at)
            VALUES (?, ?, ?, ?, 0, ?, ?)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(org_id)
        .bind(name)
        .bind(group_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
    }

    /// Get a campaign by ID
    pub async fn get(&self, id: CampaignId) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Get a campaign by ID and org
    pub async fn get_by_org(
        &self,
        org_id: OrgId,
        id: CampaignId,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = ? AND org_id = ?")
            .bind(id)
            .bind(org_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Find a campaign by name, case-insensitively
    pub async fn find_by_name(
        &self,
        org_id: OrgId,
        name: &str,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            "SELECT * FROM campaigns WHERE org_id = ? AND LOWER(name) = LOWER(?)",
        )
        .bind(org_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
    }

    /// List campaigns for an org
    pub async fn list_by_org(&self, org_id: OrgId) -> Result<Vec<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            "SELECT * FROM campaigns WHERE org_id = ? ORDER BY created_at",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Update a campaign's contact group
    pub async fn update_group(
        &self,
        id: CampaignId,
        group_id: GroupId,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            "UPDATE campaigns SET group_id = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(group_id)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Set the archived flag of a campaign
    pub async fn set_archived(
        &self,
        id: CampaignId,
        archived: bool,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            "UPDATE campaigns SET is_archived = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(archived)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Delete a campaign and all of its events
    pub async fn delete(&self, id: CampaignId) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM campaign_events WHERE campaign_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM campaigns WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}
