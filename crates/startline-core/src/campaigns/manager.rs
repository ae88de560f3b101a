//! Campaign and campaign event lifecycle manager
//!
//! Fire scheduling itself belongs to the external engine; this side owns
//! the fire version counter that tells current fires and fire counts apart
//! from stale ones. Every (re)schedule bumps the version and wipes the
//! event's counts in one transaction, then notifies the engine after
//! commit.

use startline_common::types::{
    CampaignId, EventId, EventStatus, EventType, FieldId, FieldType, FlowId, GroupId, OffsetUnit,
    OrgId, StartMode,
};
use startline_storage::db::DatabasePool;
use startline_storage::models::{
    Campaign, CampaignEvent, NewCampaignEvent, ResolvedFire, Translation,
};
use startline_storage::repository::{
    CampaignEventRepository, CampaignRepository, ContactFieldRepository, ContactGroupRepository,
    ContactRepository, FireCountRepository, FlowRepository, RecentFireRepository,
};
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

use crate::engine::{DispatchHandle, ScheduleNotification};

/// Errors from campaign operations
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("Campaign not found")]
    CampaignNotFound,

    #[error("Campaign event not found")]
    EventNotFound,

    #[error("Group not found or not usable")]
    GroupNotFound,

    #[error("Flow not found or not usable")]
    FlowNotFound,

    #[error("Events can only be relative to datetime fields, {0} is {1}")]
    NonDatetimeField(String, String),

    #[error("Invalid delivery hour: {0}")]
    InvalidDeliveryHour(i64),

    #[error("Missing translation for base language {0}")]
    MissingBaseTranslation(String),

    #[error("Event is being scheduled and cannot be edited")]
    EventScheduling,

    #[error("Invalid campaign definition: {0}")]
    InvalidDefinition(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Manages campaigns and their events
#[derive(Clone)]
pub struct CampaignManager {
    campaigns: CampaignRepository,
    events: CampaignEventRepository,
    fire_counts: FireCountRepository,
    recent_fires: RecentFireRepository,
    contacts: ContactRepository,
    pub(super) groups: ContactGroupRepository,
    pub(super) fields: ContactFieldRepository,
    pub(super) flows: FlowRepository,
    dispatch: DispatchHandle,
}

impl CampaignManager {
    /// Create a new campaign manager on the given database, queueing
    /// engine notifications through the given dispatch handle
    pub fn new(db: &DatabasePool, dispatch: DispatchHandle) -> Self {
        let pool = db.pool().clone();
        Self {
            campaigns: CampaignRepository::new(pool.clone()),
            events: CampaignEventRepository::new(pool.clone()),
            fire_counts: FireCountRepository::new(pool.clone()),
            recent_fires: RecentFireRepository::new(pool.clone()),
            contacts: ContactRepository::new(pool.clone()),
            groups: ContactGroupRepository::new(pool.clone()),
            fields: ContactFieldRepository::new(pool.clone()),
            flows: FlowRepository::new(pool),
            dispatch,
        }
    }

    /// Create a campaign over a contact group
    pub async fn create_campaign(
        &self,
        org_id: OrgId,
        name: &str,
        group_id: GroupId,
    ) -> Result<Campaign, CampaignError> {
        self.groups
            .get(group_id)
            .await?
            .filter(|g| g.org_id == org_id && g.is_active)
            .ok_or(CampaignError::GroupNotFound)?;

        let campaign = self.campaigns.create(org_id, name, group_id).await?;
        info!(campaign_id = %campaign.id, "Created campaign");
        Ok(campaign)
    }

    /// Get a campaign by id within an org
    pub async fn get_campaign(
        &self,
        org_id: OrgId,
        id: CampaignId,
    ) -> Result<Campaign, CampaignError> {
        self.campaigns
            .get_by_org(org_id, id)
            .await?
            .ok_or(CampaignError::CampaignNotFound)
    }

    /// Archive a campaign. Its events stay as they are, the engine simply
    /// stops acting on archived campaigns.
    pub async fn archive_campaign(
        &self,
        org_id: OrgId,
        id: CampaignId,
    ) -> Result<Campaign, CampaignError> {
        self.get_campaign(org_id, id).await?;
        let campaign = self
            .campaigns
            .set_archived(id, true)
            .await?
            .ok_or(CampaignError::CampaignNotFound)?;

        info!(campaign_id = %id, "Archived campaign");
        Ok(campaign)
    }

    /// Restore an archived campaign and reschedule all of its events so
    /// fires missed while archived are rebuilt
    pub async fn restore_campaign(
        &self,
        org_id: OrgId,
        id: CampaignId,
    ) -> Result<Campaign, CampaignError> {
        self.get_campaign(org_id, id).await?;
        let campaign = self
            .campaigns
            .set_archived(id, false)
            .await?
            .ok_or(CampaignError::CampaignNotFound)?;

        self.schedule_campaign(org_id, id).await?;

        info!(campaign_id = %id, "Restored campaign");
        Ok(campaign)
    }

    /// Delete a campaign, its events and all of their fire counts
    pub async fn delete_campaign(&self, org_id: OrgId, id: CampaignId) -> Result<(), CampaignError> {
        self.get_campaign(org_id, id).await?;

        for event in self.events.list_by_campaign(id).await? {
            self.fire_counts
                .delete_prefix(org_id, &event.fire_count_scope_prefix())
                .await?;
        }
        self.campaigns.delete(id).await?;

        info!(campaign_id = %id, "Deleted campaign");
        Ok(())
    }

    /// Create a flow event and schedule it
    #[allow(clippy::too_many_arguments)]
    pub async fn create_flow_event(
        &self,
        org_id: OrgId,
        campaign_id: CampaignId,
        relative_to_id: FieldId,
        offset: i64,
        unit: OffsetUnit,
        delivery_hour: i64,
        flow_id: FlowId,
        start_mode: StartMode,
    ) -> Result<CampaignEvent, CampaignError> {
        self.get_campaign(org_id, campaign_id).await?;
        self.validate_relative_to(org_id, relative_to_id).await?;
        validate_delivery_hour(delivery_hour)?;
        self.flows
            .get_active(org_id, flow_id)
            .await?
            .ok_or(CampaignError::FlowNotFound)?;

        let event = self
            .events
            .create(NewCampaignEvent {
                campaign_id,
                event_type: EventType::Flow,
                relative_to_id,
                offset,
                unit,
                delivery_hour,
                flow_id: Some(flow_id),
                translations: None,
                base_language: None,
                start_mode,
            })
            .await?;

        self.schedule_event(org_id, event.id).await
    }

    /// Create a message event and schedule it
    #[allow(clippy::too_many_arguments)]
    pub async fn create_message_event(
        &self,
        org_id: OrgId,
        campaign_id: CampaignId,
        relative_to_id: FieldId,
        offset: i64,
        unit: OffsetUnit,
        delivery_hour: i64,
        translations: HashMap<String, Translation>,
        base_language: &str,
        start_mode: StartMode,
    ) -> Result<CampaignEvent, CampaignError> {
        self.get_campaign(org_id, campaign_id).await?;
        self.validate_relative_to(org_id, relative_to_id).await?;
        validate_delivery_hour(delivery_hour)?;
        validate_translations(&translations, base_language)?;

        let event = self
            .events
            .create(NewCampaignEvent {
                campaign_id,
                event_type: EventType::Message,
                relative_to_id,
                offset,
                unit,
                delivery_hour,
                flow_id: None,
                translations: Some(translations),
                base_language: Some(base_language.to_string()),
                start_mode,
            })
            .await?;

        self.schedule_event(org_id, event.id).await
    }

    /// Get an event by id within an org
    pub async fn get_event(
        &self,
        org_id: OrgId,
        id: EventId,
    ) -> Result<CampaignEvent, CampaignError> {
        let event = self.events.get(id).await?.ok_or(CampaignError::EventNotFound)?;
        self.get_campaign(org_id, event.campaign_id)
            .await
            .map_err(|_| CampaignError::EventNotFound)?;
        Ok(event)
    }

    /// List the active events of a campaign in creation order
    pub async fn list_events(
        &self,
        org_id: OrgId,
        campaign_id: CampaignId,
    ) -> Result<Vec<CampaignEvent>, CampaignError> {
        self.get_campaign(org_id, campaign_id).await?;
        Ok(self.events.list_active_by_campaign(campaign_id).await?)
    }

    /// (Re)schedule an event: bump its fire version, wipe its counts and
    /// mark it scheduling, then notify the engine once that has committed.
    /// The engine rebuilds fires under the new version and flips the event
    /// back to ready.
    pub async fn schedule_event(
        &self,
        org_id: OrgId,
        id: EventId,
    ) -> Result<CampaignEvent, CampaignError> {
        self.get_event(org_id, id).await?;

        let event = self
            .events
            .begin_schedule(org_id, id)
            .await?
            .ok_or(CampaignError::EventNotFound)?;

        info!(
            event_id = %id,
            fire_version = event.fire_version,
            "Scheduling campaign event"
        );

        self.dispatch.notify(ScheduleNotification {
            org_id,
            event_id: id,
            fire_version: event.fire_version,
        });

        Ok(event)
    }

    /// Schedule every active event of a campaign in creation order
    pub async fn schedule_campaign(
        &self,
        org_id: OrgId,
        campaign_id: CampaignId,
    ) -> Result<Vec<CampaignEvent>, CampaignError> {
        let mut scheduled = Vec::new();
        for event in self.events.list_active_by_campaign(campaign_id).await? {
            scheduled.push(self.schedule_event(org_id, event.id).await?);
        }
        Ok(scheduled)
    }

    /// Update the schedule of an event and reschedule it. Rejected while a
    /// previous schedule of the event is still in flight.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_event_schedule(
        &self,
        org_id: OrgId,
        id: EventId,
        relative_to_id: FieldId,
        offset: i64,
        unit: OffsetUnit,
        delivery_hour: i64,
        flow_id: Option<FlowId>,
    ) -> Result<CampaignEvent, CampaignError> {
        let event = self.get_event(org_id, id).await?;
        if event.status_enum() != Some(EventStatus::Ready) {
            return Err(CampaignError::EventScheduling);
        }

        self.validate_relative_to(org_id, relative_to_id).await?;
        validate_delivery_hour(delivery_hour)?;

        let flow_id = match event.event_type_enum() {
            Some(EventType::Flow) => {
                let flow_id = flow_id.ok_or(CampaignError::FlowNotFound)?;
                self.flows
                    .get_active(org_id, flow_id)
                    .await?
                    .ok_or(CampaignError::FlowNotFound)?;
                Some(flow_id)
            }
            _ => None,
        };

        self.events
            .update_schedule_fields(id, relative_to_id, offset, unit, delivery_hour, flow_id)
            .await?
            .ok_or(CampaignError::EventNotFound)?;

        self.schedule_event(org_id, id).await
    }

    /// Update the message content of an event. Content edits do not change
    /// which contacts fire or when, so the fire version and status are left
    /// alone and no reschedule happens.
    pub async fn update_event_translations(
        &self,
        org_id: OrgId,
        id: EventId,
        translations: HashMap<String, Translation>,
        base_language: &str,
    ) -> Result<CampaignEvent, CampaignError> {
        let event = self.get_event(org_id, id).await?;
        if event.event_type_enum() != Some(EventType::Message) {
            return Err(CampaignError::InvalidDefinition(
                "Only message events have translations".to_string(),
            ));
        }

        validate_translations(&translations, base_language)?;

        self.events
            .update_translations(id, &translations, base_language)
            .await?
            .ok_or(CampaignError::EventNotFound)
    }

    /// Mark an event ready, the signal the engine sends when it has
    /// finished building fires for the current version
    pub async fn mark_ready(&self, org_id: OrgId, id: EventId) -> Result<CampaignEvent, CampaignError> {
        self.get_event(org_id, id).await?;
        self.events
            .set_status(id, EventStatus::Ready)
            .await?
            .ok_or(CampaignError::EventNotFound)
    }

    /// Release an event, deleting its fire counts across all versions
    pub async fn release_event(&self, org_id: OrgId, id: EventId) -> Result<(), CampaignError> {
        let event = self.get_event(org_id, id).await?;

        self.events.set_inactive(id).await?;
        self.fire_counts
            .delete_prefix(org_id, &event.fire_count_scope_prefix())
            .await?;

        info!(event_id = %id, "Released campaign event");
        Ok(())
    }

    /// How many times an event has fired under its current version. Counts
    /// written under superseded versions are invisible.
    pub async fn get_fire_count(&self, org_id: OrgId, id: EventId) -> Result<i64, CampaignError> {
        let event = self.get_event(org_id, id).await?;
        Ok(self.fire_counts.sum(org_id, &event.fire_count_scope()).await?)
    }

    /// Bulk fire counts for a set of events, keyed by event id
    pub async fn get_fire_counts(
        &self,
        org_id: OrgId,
        events: &[CampaignEvent],
    ) -> Result<HashMap<EventId, i64>, CampaignError> {
        let scopes: Vec<String> = events.iter().map(|e| e.fire_count_scope()).collect();
        let sums = self.fire_counts.prefetch(org_id, &scopes).await?;

        Ok(events
            .iter()
            .map(|e| (e.id, sums.get(&e.fire_count_scope()).copied().unwrap_or(0)))
            .collect())
    }

    /// The most recent fires of an event resolved to contacts, most recent
    /// first. Entries whose contact has since been deleted are dropped
    /// rather than eagerly purged.
    pub async fn get_recent_fires(
        &self,
        org_id: OrgId,
        id: EventId,
    ) -> Result<Vec<ResolvedFire>, CampaignError> {
        self.get_event(org_id, id).await?;

        let fires = self.recent_fires.list_desc(id).await?;
        let contact_ids: Vec<_> = fires.iter().filter_map(|f| f.contact_id()).collect();
        let contacts: HashMap<_, _> = self
            .contacts
            .list_active_by_ids(org_id, &contact_ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        Ok(fires
            .iter()
            .filter_map(|f| {
                let contact = contacts.get(&f.contact_id()?)?.clone();
                Some(ResolvedFire { contact, time: f.fired_on })
            })
            .collect())
    }

    pub(super) async fn validate_relative_to(
        &self,
        org_id: OrgId,
        field_id: FieldId,
    ) -> Result<(), CampaignError> {
        let field = self
            .fields
            .get(field_id)
            .await?
            .filter(|f| f.org_id == org_id)
            .ok_or_else(|| {
                CampaignError::InvalidDefinition("Unknown relative-to field".to_string())
            })?;

        if field.value_type_enum() != Some(FieldType::Datetime) {
            return Err(CampaignError::NonDatetimeField(field.key, field.value_type));
        }

        Ok(())
    }

    pub(super) fn events_repo(&self) -> &CampaignEventRepository {
        &self.events
    }

    pub(super) fn campaigns_repo(&self) -> &CampaignRepository {
        &self.campaigns
    }
}

fn validate_delivery_hour(hour: i64) -> Result<(), CampaignError> {
    // -1 means fire at the relative time itself
    if hour != -1 && !(0..=23).contains(&hour) {
        return Err(CampaignError::InvalidDeliveryHour(hour));
    }
    Ok(())
}

fn validate_translations(
    translations: &HashMap<String, Translation>,
    base_language: &str,
) -> Result<(), CampaignError> {
    if !translations.contains_key(base_language) {
        return Err(CampaignError::MissingBaseTranslation(
            base_language.to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Dispatcher, RecordingFlowScheduler};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use startline_storage::repository::{ContactFieldRepository, ContactGroupRepository};
    use uuid::Uuid;

    struct Fixture {
        db: DatabasePool,
        manager: CampaignManager,
        recorder: Arc<RecordingFlowScheduler>,
        org: OrgId,
        campaign: Campaign,
        field: FieldId,
    }

    async fn setup() -> Fixture {
        let db = DatabasePool::connect_memory().await.unwrap();
        db.migrate().await.unwrap();

        let recorder = RecordingFlowScheduler::shared();
        let dispatch = Dispatcher::spawn(recorder.clone());
        let manager = CampaignManager::new(&db, dispatch);
        let org = Uuid::new_v4();

        let group = ContactGroupRepository::new(db.pool().clone())
            .create(org, "Farmers")
            .await
            .unwrap();
        let field = ContactFieldRepository::new(db.pool().clone())
            .create(org, "planting_date", "Planting Date", FieldType::Datetime)
            .await
            .unwrap();
        let campaign = manager.create_campaign(org, "Reminders", group.id).await.unwrap();

        Fixture { db, manager, recorder, org, campaign, field: field.id }
    }

    fn translations(pairs: &[(&str, &str)]) -> HashMap<String, Translation> {
        pairs
            .iter()
            .map(|(lang, text)| (lang.to_string(), Translation { text: text.to_string() }))
            .collect()
    }

    async fn message_event(fx: &Fixture, offset: i64) -> CampaignEvent {
        fx.manager
            .create_message_event(
                fx.org,
                fx.campaign.id,
                fx.field,
                offset,
                OffsetUnit::Days,
                -1,
                translations(&[("eng", "Time to plant!")]),
                "eng",
                StartMode::Interrupt,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_schedules_at_version_one() {
        let fx = setup().await;
        let event = message_event(&fx, 3).await;

        assert_eq!(1, event.fire_version);
        assert_eq!(Some(EventStatus::Scheduling), event.status_enum());

        fx.manager.dispatch.drain().await;
        let calls = fx.recorder.calls();
        assert_eq!(1, calls.len());
        assert_eq!(event.id, calls[0].event_id);
        assert_eq!(1, calls[0].fire_version);
    }

    #[tokio::test]
    async fn test_reschedule_hides_stale_counts() {
        let fx = setup().await;
        let event = message_event(&fx, 3).await;

        // the engine fires some contacts under version 1
        fx.manager
            .fire_counts
            .incr(fx.org, &event.fire_count_scope(), 4)
            .await
            .unwrap();
        assert_eq!(4, fx.manager.get_fire_count(fx.org, event.id).await.unwrap());

        fx.manager.mark_ready(fx.org, event.id).await.unwrap();
        let event = fx.manager.schedule_event(fx.org, event.id).await.unwrap();

        // version bumped, old counts invisible and physically gone
        assert_eq!(2, event.fire_version);
        assert_eq!(0, fx.manager.get_fire_count(fx.org, event.id).await.unwrap());
        assert_eq!(
            0,
            fx.manager
                .fire_counts
                .sum(fx.org, &format!("campfires:{}:1", event.id))
                .await
                .unwrap()
        );

        // a late count written under the stale version stays invisible
        fx.manager
            .fire_counts
            .incr(fx.org, &format!("campfires:{}:1", event.id), 1)
            .await
            .unwrap();
        fx.manager
            .fire_counts
            .incr(fx.org, &event.fire_count_scope(), 2)
            .await
            .unwrap();
        assert_eq!(2, fx.manager.get_fire_count(fx.org, event.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_bulk_fire_counts() {
        let fx = setup().await;
        let event1 = message_event(&fx, 1).await;
        let event2 = message_event(&fx, 2).await;

        fx.manager
            .fire_counts
            .incr(fx.org, &event1.fire_count_scope(), 3)
            .await
            .unwrap();

        let events = fx.manager.list_events(fx.org, fx.campaign.id).await.unwrap();
        let counts = fx.manager.get_fire_counts(fx.org, &events).await.unwrap();

        assert_eq!(Some(&3), counts.get(&event1.id));
        assert_eq!(Some(&0), counts.get(&event2.id));
    }

    #[tokio::test]
    async fn test_schedule_edit_rejected_while_scheduling() {
        let fx = setup().await;
        let event = message_event(&fx, 3).await;
        assert_eq!(Some(EventStatus::Scheduling), event.status_enum());

        let result = fx
            .manager
            .update_event_schedule(fx.org, event.id, fx.field, 5, OffsetUnit::Days, -1, None)
            .await;
        assert!(matches!(result, Err(CampaignError::EventScheduling)));

        // once the engine reports back the edit goes through and triggers
        // another schedule
        fx.manager.mark_ready(fx.org, event.id).await.unwrap();
        let updated = fx
            .manager
            .update_event_schedule(fx.org, event.id, fx.field, 5, OffsetUnit::Weeks, 9, None)
            .await
            .unwrap();

        assert_eq!(5, updated.offset);
        assert_eq!("weeks", updated.unit);
        assert_eq!(9, updated.delivery_hour);
        assert_eq!(2, updated.fire_version);
        assert_eq!(Some(EventStatus::Scheduling), updated.status_enum());
    }

    #[tokio::test]
    async fn test_translation_edits_do_not_reschedule() {
        let fx = setup().await;
        let event = message_event(&fx, 3).await;

        let updated = fx
            .manager
            .update_event_translations(
                fx.org,
                event.id,
                translations(&[("eng", "Get planting!"), ("spa", "¡A plantar!")]),
                "eng",
            )
            .await
            .unwrap();

        // content changed, scheduling state untouched even mid-schedule
        assert_eq!(event.fire_version, updated.fire_version);
        assert_eq!(event.status, updated.status);
        assert_eq!(
            Some(Translation { text: "Get planting!".to_string() }),
            updated.get_message(None)
        );

        let result = fx
            .manager
            .update_event_translations(fx.org, event.id, translations(&[("spa", "Hola")]), "eng")
            .await;
        assert!(matches!(result, Err(CampaignError::MissingBaseTranslation(_))));
    }

    #[tokio::test]
    async fn test_create_event_validations() {
        let fx = setup().await;

        let result = fx
            .manager
            .create_message_event(
                fx.org,
                fx.campaign.id,
                fx.field,
                1,
                OffsetUnit::Days,
                24,
                translations(&[("eng", "Hi")]),
                "eng",
                StartMode::Interrupt,
            )
            .await;
        assert!(matches!(result, Err(CampaignError::InvalidDeliveryHour(24))));

        let text_field = ContactFieldRepository::new(fx.db.pool().clone())
            .create(fx.org, "crop", "Crop", FieldType::Text)
            .await
            .unwrap();
        let result = fx
            .manager
            .create_message_event(
                fx.org,
                fx.campaign.id,
                text_field.id,
                1,
                OffsetUnit::Days,
                -1,
                translations(&[("eng", "Hi")]),
                "eng",
                StartMode::Interrupt,
            )
            .await;
        assert!(matches!(result, Err(CampaignError::NonDatetimeField(_, _))));

        let result = fx
            .manager
            .create_flow_event(
                fx.org,
                fx.campaign.id,
                fx.field,
                1,
                OffsetUnit::Days,
                -1,
                Uuid::new_v4(),
                StartMode::Interrupt,
            )
            .await;
        assert!(matches!(result, Err(CampaignError::FlowNotFound)));
    }

    #[tokio::test]
    async fn test_release_event_wipes_counts() {
        let fx = setup().await;
        let event = message_event(&fx, 3).await;

        fx.manager
            .fire_counts
            .incr(fx.org, &event.fire_count_scope(), 5)
            .await
            .unwrap();

        fx.manager.release_event(fx.org, event.id).await.unwrap();

        assert!(fx.manager.list_events(fx.org, fx.campaign.id).await.unwrap().is_empty());
        assert_eq!(
            0,
            fx.manager
                .fire_counts
                .sum(fx.org, &event.fire_count_scope())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_restore_campaign_reschedules_events() {
        let fx = setup().await;
        let event1 = message_event(&fx, 1).await;
        let event2 = message_event(&fx, 2).await;

        fx.manager.archive_campaign(fx.org, fx.campaign.id).await.unwrap();
        fx.manager.restore_campaign(fx.org, fx.campaign.id).await.unwrap();
        fx.manager.dispatch.drain().await;

        // events rescheduled in creation order with bumped versions
        let calls = fx.recorder.calls();
        let restores: Vec<_> = calls.iter().skip(2).collect();
        assert_eq!(2, restores.len());
        assert_eq!(event1.id, restores[0].event_id);
        assert_eq!(2, restores[0].fire_version);
        assert_eq!(event2.id, restores[1].event_id);
        assert_eq!(2, restores[1].fire_version);
    }

    #[tokio::test]
    async fn test_recent_fires_drop_deleted_contacts() {
        let fx = setup().await;
        let event = message_event(&fx, 3).await;

        let ann = fx.manager.contacts.create(fx.org, Some("Ann"), None).await.unwrap();
        let bob = fx.manager.contacts.create(fx.org, Some("Bob"), None).await.unwrap();

        let t1 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap();
        fx.manager
            .recent_fires
            .add(event.id, &format!("{}|{}", Uuid::new_v4(), ann.id), t1)
            .await
            .unwrap();
        fx.manager
            .recent_fires
            .add(event.id, &format!("{}|{}", Uuid::new_v4(), bob.id), t2)
            .await
            .unwrap();

        let fires = fx.manager.get_recent_fires(fx.org, event.id).await.unwrap();
        assert_eq!(2, fires.len());
        assert_eq!(bob.id, fires[0].contact.id);
        assert_eq!(t2, fires[0].time);
        assert_eq!(ann.id, fires[1].contact.id);

        // deleted contacts are filtered at read time
        fx.manager.contacts.set_active(bob.id, false).await.unwrap();
        let fires = fx.manager.get_recent_fires(fx.org, event.id).await.unwrap();
        assert_eq!(1, fires.len());
        assert_eq!(ann.id, fires[0].contact.id);
    }

    #[tokio::test]
    async fn test_org_isolation() {
        let fx = setup().await;
        let event = message_event(&fx, 3).await;
        let other_org = Uuid::new_v4();

        assert!(matches!(
            fx.manager.get_campaign(other_org, fx.campaign.id).await,
            Err(CampaignError::CampaignNotFound)
        ));
        assert!(matches!(
            fx.manager.get_event(other_org, event.id).await,
            Err(CampaignError::EventNotFound)
        ));
        assert!(matches!(
            fx.manager.schedule_event(other_org, event.id).await,
            Err(CampaignError::EventNotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_campaign_removes_events_and_counts() {
        let fx = setup().await;
        let event = message_event(&fx, 3).await;

        fx.manager
            .fire_counts
            .incr(fx.org, &event.fire_count_scope(), 2)
            .await
            .unwrap();

        fx.manager.delete_campaign(fx.org, fx.campaign.id).await.unwrap();

        assert!(matches!(
            fx.manager.get_campaign(fx.org, fx.campaign.id).await,
            Err(CampaignError::CampaignNotFound)
        ));
        assert!(fx.manager.events.get(event.id).await.unwrap().is_none());
        assert_eq!(
            0,
            fx.manager
                .fire_counts
                .sum(fx.org, &event.fire_count_scope())
                .await
                .unwrap()
        );
    }
}
