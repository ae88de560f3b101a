//! Trigger lifecycle manager

use startline_common::types::{FlowId, OrgId, TriggerId, TriggerType};
use startline_storage::db::DatabasePool;
use startline_storage::models::{NewTrigger, Trigger};
use startline_storage::repository::{
    ChannelRepository, ContactGroupRepository, FlowRepository, ScheduleRepository,
    TriggerRepository,
};
use thiserror::Error;
use tracing::info;

use super::types::{self, TriggerScope};

/// Errors from trigger operations
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Trigger not found")]
    NotFound,

    #[error("Flow not found or not usable")]
    FlowNotFound,

    #[error("Channel not found or not usable")]
    ChannelNotFound,

    #[error("Keyword triggers require at least one keyword")]
    MissingKeywords,

    #[error("Invalid keyword: {0}")]
    InvalidKeyword(String),

    #[error("Schedule triggers require a schedule")]
    MissingSchedule,

    #[error("Invalid trigger definition: {0}")]
    InvalidDefinition(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Manages the trigger lifecycle: creation with conflict resolution,
/// archive and restore, release, and import/export
#[derive(Clone)]
pub struct TriggerManager {
    triggers: TriggerRepository,
    schedules: ScheduleRepository,
    flows: FlowRepository,
    channels: ChannelRepository,
    pub(super) groups: ContactGroupRepository,
}

impl TriggerManager {
    /// Create a new trigger manager on the given database
    pub fn new(db: &DatabasePool) -> Self {
        let pool = db.pool().clone();
        Self {
            triggers: TriggerRepository::new(pool.clone()),
            schedules: ScheduleRepository::new(pool.clone()),
            flows: FlowRepository::new(pool.clone()),
            channels: ChannelRepository::new(pool.clone()),
            groups: ContactGroupRepository::new(pool),
        }
    }

    /// Create a trigger, archiving any active trigger of the same type with
    /// an equivalent scope. Creation always wins, there is no duplicate
    /// error.
    pub async fn create(
        &self,
        org_id: OrgId,
        trigger_type: TriggerType,
        flow_id: FlowId,
        scope: TriggerScope,
    ) -> Result<Trigger, TriggerError> {
        let scope = scope.normalized(trigger_type);
        self.validate(org_id, trigger_type, flow_id, &scope).await?;

        let input = new_trigger(org_id, trigger_type, flow_id, scope.clone());
        let (trigger, archived) = self
            .triggers
            .create_resolving_conflicts(input, |existing| {
                types::conflicts(
                    trigger_type,
                    &scope,
                    &TriggerScope::from_trigger(existing).normalized(trigger_type),
                )
            })
            .await?;

        info!(
            trigger_id = %trigger.id,
            trigger_type = %trigger_type,
            archived = archived.len(),
            "Created trigger"
        );

        Ok(trigger)
    }

    /// List the active triggers a new trigger with this scope would archive
    pub async fn conflict_precheck(
        &self,
        org_id: OrgId,
        trigger_type: TriggerType,
        scope: TriggerScope,
    ) -> Result<Vec<Trigger>, TriggerError> {
        let scope = scope.normalized(trigger_type);
        let candidates = self.triggers.list_active_by_type(org_id, trigger_type).await?;

        Ok(candidates
            .into_iter()
            .filter(|t| {
                types::conflicts(
                    trigger_type,
                    &scope,
                    &TriggerScope::from_trigger(t).normalized(trigger_type),
                )
            })
            .collect())
    }

    /// Archive a trigger, pausing its schedule if it has one
    pub async fn archive(&self, org_id: OrgId, id: TriggerId) -> Result<Trigger, TriggerError> {
        let trigger = self.get_checked(org_id, id).await?;

        if let Some(schedule_id) = trigger.schedule_id {
            self.schedules.set_paused(schedule_id, true).await?;
        }

        let trigger = self
            .triggers
            .set_archived(id, true)
            .await?
            .ok_or(TriggerError::NotFound)?;

        info!(trigger_id = %id, "Archived trigger");
        Ok(trigger)
    }

    /// Restore an archived trigger, resuming its schedule if it has one.
    /// Restoring does not archive conflicting triggers, the restored
    /// trigger simply rejoins priority ordering.
    pub async fn restore(&self, org_id: OrgId, id: TriggerId) -> Result<Trigger, TriggerError> {
        let trigger = self.get_checked(org_id, id).await?;

        if let Some(schedule_id) = trigger.schedule_id {
            self.schedules.set_paused(schedule_id, false).await?;
        }

        let trigger = self
            .triggers
            .set_archived(id, false)
            .await?
            .ok_or(TriggerError::NotFound)?;

        info!(trigger_id = %id, "Restored trigger");
        Ok(trigger)
    }

    /// Release a trigger, deleting its schedule if it has one
    pub async fn release(&self, org_id: OrgId, id: TriggerId) -> Result<(), TriggerError> {
        let trigger = self.get_checked(org_id, id).await?;

        self.triggers.release(id).await?.ok_or(TriggerError::NotFound)?;

        if let Some(schedule_id) = trigger.schedule_id {
            self.schedules.delete(schedule_id).await?;
        }

        info!(trigger_id = %id, "Released trigger");
        Ok(())
    }

    /// Get a trigger by id within an org
    pub async fn get(&self, org_id: OrgId, id: TriggerId) -> Result<Trigger, TriggerError> {
        self.get_checked(org_id, id).await
    }

    /// List all triggers of an org
    pub async fn list(&self, org_id: OrgId) -> Result<Vec<Trigger>, TriggerError> {
        Ok(self.triggers.list_by_org(org_id).await?)
    }

    async fn get_checked(&self, org_id: OrgId, id: TriggerId) -> Result<Trigger, TriggerError> {
        self.triggers
            .get(id)
            .await?
            .filter(|t| t.org_id == org_id && t.is_active)
            .ok_or(TriggerError::NotFound)
    }

    pub(super) async fn validate(
        &self,
        org_id: OrgId,
        trigger_type: TriggerType,
        flow_id: FlowId,
        scope: &TriggerScope,
    ) -> Result<(), TriggerError> {
        self.flows
            .get_active(org_id, flow_id)
            .await?
            .ok_or(TriggerError::FlowNotFound)?;

        if let Some(channel_id) = scope.channel_id {
            self.channels
                .get_active(org_id, channel_id)
                .await?
                .ok_or(TriggerError::ChannelNotFound)?;
        }

        match trigger_type {
            TriggerType::Keyword => {
                if scope.keywords.is_empty() {
                    return Err(TriggerError::MissingKeywords);
                }
                for keyword in &scope.keywords {
                    if !types::is_valid_keyword(keyword) {
                        return Err(TriggerError::InvalidKeyword(keyword.clone()));
                    }
                }
            }
            TriggerType::Schedule => {
                if scope.schedule_id.is_none() {
                    return Err(TriggerError::MissingSchedule);
                }
            }
            _ => {}
        }

        Ok(())
    }

    pub(super) fn triggers_repo(&self) -> &TriggerRepository {
        &self.triggers
    }

    pub(super) fn flows_repo(&self) -> &FlowRepository {
        &self.flows
    }

    pub(super) fn channels_repo(&self) -> &ChannelRepository {
        &self.channels
    }
}

fn new_trigger(
    org_id: OrgId,
    trigger_type: TriggerType,
    flow_id: FlowId,
    scope: TriggerScope,
) -> NewTrigger {
    let priority = scope.priority();
    NewTrigger {
        org_id,
        trigger_type,
        flow_id,
        keywords: scope.keywords,
        match_type: scope.match_type,
        group_ids: scope.group_ids,
        exclude_group_ids: scope.exclude_group_ids,
        contact_ids: scope.contact_ids,
        channel_id: scope.channel_id,
        referrer_id: scope.referrer_id,
        schedule_id: scope.schedule_id,
        priority,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;
    use startline_common::types::{MatchType, RepeatPeriod};
    use startline_storage::models::Flow;
    use uuid::Uuid;

    struct Fixture {
        db: DatabasePool,
        manager: TriggerManager,
        org: OrgId,
        flow: Flow,
    }

    async fn setup() -> Fixture {
        let db = DatabasePool::connect_memory().await.unwrap();
        db.migrate().await.unwrap();
        let manager = TriggerManager::new(&db);
        let org = Uuid::new_v4();
        let flow = FlowRepository::new(db.pool().clone())
            .create(org, "Survey")
            .await
            .unwrap();
        Fixture { db, manager, org, flow }
    }

    fn keyword_scope(keywords: &[&str]) -> TriggerScope {
        TriggerScope {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            match_type: Some(MatchType::OnlyWord),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_archives_equivalent_triggers() {
        let fx = setup().await;

        let first = fx
            .manager
            .create(fx.org, TriggerType::Keyword, fx.flow.id, keyword_scope(&["start"]))
            .await
            .unwrap();

        // different keyword coexists
        let other = fx
            .manager
            .create(fx.org, TriggerType::Keyword, fx.flow.id, keyword_scope(&["stop"]))
            .await
            .unwrap();

        // overlapping keyword archives the first but not the other
        let second = fx
            .manager
            .create(
                fx.org,
                TriggerType::Keyword,
                fx.flow.id,
                keyword_scope(&["start", "begin"]),
            )
            .await
            .unwrap();

        assert!(fx.manager.get(fx.org, first.id).await.unwrap().is_archived);
        assert!(!fx.manager.get(fx.org, other.id).await.unwrap().is_archived);
        assert!(!fx.manager.get(fx.org, second.id).await.unwrap().is_archived);
    }

    #[tokio::test]
    async fn test_create_lowercases_keywords_and_stores_priority() {
        let fx = setup().await;
        let channels = ChannelRepository::new(fx.db.pool().clone());
        let channel = channels.create(fx.org, "Vonage").await.unwrap();
        let group = fx.manager.groups.create(fx.org, "Farmers").await.unwrap();

        let trigger = fx
            .manager
            .create(
                fx.org,
                TriggerType::Keyword,
                fx.flow.id,
                TriggerScope {
                    keywords: vec!["Start".to_string()],
                    match_type: Some(MatchType::FirstWord),
                    group_ids: vec![group.id],
                    channel_id: Some(channel.id),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(vec!["start".to_string()], trigger.keywords_vec());
        assert_eq!(6, trigger.priority);
    }

    #[tokio::test]
    async fn test_create_validations() {
        let fx = setup().await;

        let result = fx
            .manager
            .create(fx.org, TriggerType::Keyword, fx.flow.id, keyword_scope(&[]))
            .await;
        assert!(matches!(result, Err(TriggerError::MissingKeywords)));

        let result = fx
            .manager
            .create(fx.org, TriggerType::Keyword, fx.flow.id, keyword_scope(&["not a keyword"]))
            .await;
        assert!(matches!(result, Err(TriggerError::InvalidKeyword(_))));

        let result = fx
            .manager
            .create(fx.org, TriggerType::Keyword, Uuid::new_v4(), keyword_scope(&["start"]))
            .await;
        assert!(matches!(result, Err(TriggerError::FlowNotFound)));

        // a flow from another org is just as unusable
        let other_flow = FlowRepository::new(fx.db.pool().clone())
            .create(Uuid::new_v4(), "Other")
            .await
            .unwrap();
        let result = fx
            .manager
            .create(fx.org, TriggerType::Keyword, other_flow.id, keyword_scope(&["start"]))
            .await;
        assert!(matches!(result, Err(TriggerError::FlowNotFound)));

        let result = fx
            .manager
            .create(
                fx.org,
                TriggerType::NewConversation,
                fx.flow.id,
                TriggerScope { channel_id: Some(Uuid::new_v4()), ..Default::default() },
            )
            .await;
        assert!(matches!(result, Err(TriggerError::ChannelNotFound)));

        let result = fx
            .manager
            .create(fx.org, TriggerType::Schedule, fx.flow.id, TriggerScope::default())
            .await;
        assert!(matches!(result, Err(TriggerError::MissingSchedule)));
    }

    #[tokio::test]
    async fn test_conflict_precheck_is_read_only() {
        let fx = setup().await;

        let existing = fx
            .manager
            .create(fx.org, TriggerType::Keyword, fx.flow.id, keyword_scope(&["start"]))
            .await
            .unwrap();

        let conflicts = fx
            .manager
            .conflict_precheck(fx.org, TriggerType::Keyword, keyword_scope(&["start", "join"]))
            .await
            .unwrap();
        assert_eq!(vec![existing.id], conflicts.iter().map(|t| t.id).collect::<Vec<_>>());

        let conflicts = fx
            .manager
            .conflict_precheck(fx.org, TriggerType::Keyword, keyword_scope(&["stop"]))
            .await
            .unwrap();
        assert!(conflicts.is_empty());

        // nothing was archived by the checks
        assert!(!fx.manager.get(fx.org, existing.id).await.unwrap().is_archived);
    }

    #[tokio::test]
    async fn test_archived_triggers_do_not_conflict() {
        let fx = setup().await;

        let first = fx
            .manager
            .create(fx.org, TriggerType::MissedCall, fx.flow.id, TriggerScope::default())
            .await
            .unwrap();
        fx.manager.archive(fx.org, first.id).await.unwrap();

        let second = fx
            .manager
            .create(fx.org, TriggerType::MissedCall, fx.flow.id, TriggerScope::default())
            .await
            .unwrap();

        // the archived one stays archived, untouched by the new creation
        assert!(fx.manager.get(fx.org, first.id).await.unwrap().is_archived);
        assert!(!fx.manager.get(fx.org, second.id).await.unwrap().is_archived);
    }

    #[tokio::test]
    async fn test_conflicts_are_scoped_to_org() {
        let fx = setup().await;
        let other_org = Uuid::new_v4();
        let other_flow = FlowRepository::new(fx.db.pool().clone())
            .create(other_org, "Survey")
            .await
            .unwrap();

        let ours = fx
            .manager
            .create(fx.org, TriggerType::Keyword, fx.flow.id, keyword_scope(&["start"]))
            .await
            .unwrap();
        fx.manager
            .create(other_org, TriggerType::Keyword, other_flow.id, keyword_scope(&["start"]))
            .await
            .unwrap();

        assert!(!fx.manager.get(fx.org, ours.id).await.unwrap().is_archived);
    }

    #[tokio::test]
    async fn test_schedule_trigger_lifecycle() {
        let fx = setup().await;
        let schedules = ScheduleRepository::new(fx.db.pool().clone());
        let schedule = schedules
            .create(fx.org, RepeatPeriod::Daily, Some(Utc::now() + Duration::days(1)))
            .await
            .unwrap();

        let trigger = fx
            .manager
            .create(
                fx.org,
                TriggerType::Schedule,
                fx.flow.id,
                TriggerScope { schedule_id: Some(schedule.id), ..Default::default() },
            )
            .await
            .unwrap();

        // two schedule triggers never conflict
        let second_schedule = schedules.create(fx.org, RepeatPeriod::Weekly, None).await.unwrap();
        fx.manager
            .create(
                fx.org,
                TriggerType::Schedule,
                fx.flow.id,
                TriggerScope { schedule_id: Some(second_schedule.id), ..Default::default() },
            )
            .await
            .unwrap();
        assert!(!fx.manager.get(fx.org, trigger.id).await.unwrap().is_archived);

        // archiving pauses the schedule, restoring resumes it
        fx.manager.archive(fx.org, trigger.id).await.unwrap();
        assert!(schedules.get(schedule.id).await.unwrap().unwrap().is_paused);

        fx.manager.restore(fx.org, trigger.id).await.unwrap();
        assert!(!schedules.get(schedule.id).await.unwrap().unwrap().is_paused);

        // releasing deletes the schedule entirely
        fx.manager.release(fx.org, trigger.id).await.unwrap();
        assert!(schedules.get(schedule.id).await.unwrap().is_none());
        assert!(matches!(
            fx.manager.get(fx.org, trigger.id).await,
            Err(TriggerError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_org_isolation() {
        let fx = setup().await;
        let trigger = fx
            .manager
            .create(fx.org, TriggerType::Keyword, fx.flow.id, keyword_scope(&["start"]))
            .await
            .unwrap();

        let other_org = Uuid::new_v4();
        assert!(matches!(
            fx.manager.get(other_org, trigger.id).await,
            Err(TriggerError::NotFound)
        ));
        assert!(matches!(
            fx.manager.archive(other_org, trigger.id).await,
            Err(TriggerError::NotFound)
        ));
    }
}
