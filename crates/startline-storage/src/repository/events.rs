//! Campaign event repository

use chrono::Utc;
use sqlx::SqlitePool;
use startline_common::types::{
    CampaignId, EventId, EventStatus, FieldId, FlowId, OffsetUnit, OrgId,
};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{CampaignEvent, NewCampaignEvent, Translation};

/// Campaign event repository
#[derive(Clone)]
pub struct CampaignEventRepository {
    pool: SqlitePool,
}

impl CampaignEventRepository {
    /// Create a new campaign event repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a campaign event, ready with fire version 0. Event ids are
    /// time-ordered (UUID v7) so ascending id order is creation order.
    pub async fn create(&self, input: NewCampaignEvent) -> Result<CampaignEvent, sqlx::Error> {
        let now = Utc::now();
        let translations = input
            .translations
            .map(|t| serde_json::to_value(t).unwrap_or_default());

        sqlx::query_as::<_, CampaignEvent>(
            r#"
            INSERT INTO campaign_events (
                id, campaign_id, event_type, status, fire_version, relative_to_id,
                "offset", unit, delivery_hour, flow_id, translations, base_language,
                start_mode, is_active, created_at, updated_at
            )
            VALUES (?, ?, ?, 'ready', 0, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(input.campaign_id)
        .bind(input.event_type.as_str())
        .bind(input.relative_to_id)
        .bind(input.offset)
        .bind(input.unit.as_str())
        .bind(input.delivery_hour)
        .bind(input.flow_id)
        .bind(translations)
        .bind(&input.base_language)
        .bind(input.start_mode.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
    }

    /// Get an event by ID
    pub async fn get(&self, id: EventId) -> Result<Option<CampaignEvent>, sqlx::Error> {
        sqlx::query_as::<_, CampaignEvent>("SELECT * FROM campaign_events WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List active events of a campaign in ascending id order
    pub async fn list_active_by_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<CampaignEvent>, sqlx::Error> {
        sqlx::query_as::<_, CampaignEvent>(
            r#"
            SELECT * FROM campaign_events
            WHERE campaign_id = ? AND is_active = 1
            ORDER BY id
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
    }

    /// List all events of a campaign, including released ones
    pub async fn list_by_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<CampaignEvent>, sqlx::Error> {
        sqlx::query_as::<_, CampaignEvent>(
            "SELECT * FROM campaign_events WHERE campaign_id = ? ORDER BY id",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Perform the local half of a (re)schedule in one transaction: drop
    /// every fire count row of the event (all versions), bump the fire
    /// version by exactly one and mark the event scheduling. The external
    /// engine is only notified after this commits.
    pub async fn begin_schedule(
        &self,
        org_id: OrgId,
        id: EventId,
    ) -> Result<Option<CampaignEvent>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM fire_counts WHERE org_id = ? AND scope LIKE ? || '%'")
            .bind(org_id)
            .bind(format!("campfires:{}:", id))
            .execute(&mut *tx)
            .await?;

        let event = sqlx::query_as::<_, CampaignEvent>(
            r#"
            UPDATE campaign_events
            SET fire_version = fire_version + 1, status = 'scheduling', updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(event)
    }

    /// Update the scheduling-relevant fields of an event
    pub async fn update_schedule_fields(
        &self,
        id: EventId,
        relative_to_id: FieldId,
        offset: i64,
        unit: OffsetUnit,
        delivery_hour: i64,
        flow_id: Option<FlowId>,
    ) -> Result<Option<CampaignEvent>, sqlx::Error> {
        sqlx::query_as::<_, CampaignEvent>(
            r#"
            UPDATE campaign_events
            SET relative_to_id = ?, "offset" = ?, unit = ?, delivery_hour = ?,
                flow_id = ?, updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(relative_to_id)
        .bind(offset)
        .bind(unit.as_str())
        .bind(delivery_hour)
        .bind(flow_id)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Update the message content of an event, leaving version and status
    /// untouched
    pub async fn update_translations(
        &self,
        id: EventId,
        translations: &HashMap<String, Translation>,
        base_language: &str,
    ) -> Result<Option<CampaignEvent>, sqlx::Error> {
        sqlx::query_as::<_, CampaignEvent>(
            r#"
            UPDATE campaign_events
            SET translations = ?, base_language = ?, updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(serde_json::to_value(translations).unwrap_or_default())
        .bind(base_language)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Set the status of an event, the ready flip being an external signal
    pub async fn set_status(
        &self,
        id: EventId,
        status: EventStatus,
    ) -> Result<Option<CampaignEvent>, sqlx::Error> {
        sqlx::query_as::<_, CampaignEvent>(
            "UPDATE campaign_events SET status = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Deactivate an event
    pub async fn set_inactive(&self, id: EventId) -> Result<Option<CampaignEvent>, sqlx::Error> {
        sqlx::query_as::<_, CampaignEvent>(
            "UPDATE campaign_events SET is_active = 0, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }
}
