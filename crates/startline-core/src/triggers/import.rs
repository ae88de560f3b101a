//! Trigger import and export
//!
//! Unlike campaigns, trigger import merges into what exists: an equivalent
//! active trigger pointing at the same flow is left alone, an equivalent
//! archived one is restored, and an equivalent active one pointing at a
//! different flow is archived before the imported trigger is created.

use serde::{Deserialize, Serialize};
use startline_common::types::{ChannelId, ExportRef, MatchType, OrgId, TriggerType};
use startline_storage::models::Trigger;
use tracing::info;
use uuid::Uuid;

use super::manager::{TriggerError, TriggerManager};
use super::types::{self, TriggerScope};

/// An exported trigger definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerDef {
    pub trigger_type: String,
    pub flow: ExportRef,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelRef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<ExportRef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_groups: Vec<ExportRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,

    /// Legacy single-keyword field accepted on import
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer_id: Option<String>,
}

/// Exports reference channels by uuid and name, older ones by bare uuid
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelRef {
    Ref(ExportRef),
    Uuid(Uuid),
}

impl ChannelRef {
    fn uuid(&self) -> ChannelId {
        match self {
            ChannelRef::Ref(r) => r.uuid,
            ChannelRef::Uuid(u) => *u,
        }
    }
}

impl TriggerDef {
    fn keywords(&self) -> Vec<String> {
        match (&self.keywords, &self.keyword) {
            (Some(keywords), _) => keywords.clone(),
            (None, Some(keyword)) => vec![keyword.clone()],
            (None, None) => Vec::new(),
        }
    }
}

impl TriggerManager {
    /// Import trigger definitions, merging into existing triggers.
    /// Schedule trigger definitions are skipped, their schedules do not
    /// survive export.
    pub async fn import_triggers(
        &self,
        org_id: OrgId,
        defs: &[TriggerDef],
    ) -> Result<Vec<Trigger>, TriggerError> {
        let mut imported = Vec::new();

        for def in defs {
            let trigger_type = TriggerType::from_str(&def.trigger_type).ok_or_else(|| {
                TriggerError::InvalidDefinition(format!("Unknown trigger type: {}", def.trigger_type))
            })?;

            if trigger_type == TriggerType::Schedule {
                continue;
            }

            let flow = self
                .flows_repo()
                .get_active(org_id, def.flow.uuid)
                .await?
                .ok_or(TriggerError::FlowNotFound)?;

            let scope = self.resolve_scope(org_id, trigger_type, def).await?;
            self.validate(org_id, trigger_type, flow.id, &scope).await?;

            // an equivalent active trigger starting the same flow means
            // the import has nothing to do
            let actives = self.conflict_precheck(org_id, trigger_type, scope.clone()).await?;
            if let Some(same) = actives.iter().find(|t| t.flow_id == flow.id) {
                imported.push(same.clone());
                continue;
            }

            // equivalent actives starting other flows lose to the import
            for conflict in &actives {
                self.triggers_repo().set_archived(conflict.id, true).await?;
                info!(trigger_id = %conflict.id, "Archived trigger replaced by import");
            }

            // an equivalent archived trigger starting the same flow is
            // brought back instead of duplicated
            let archived = self
                .triggers_repo()
                .list_archived_by_type(org_id, trigger_type)
                .await?;
            let restorable = archived.iter().find(|t| {
                t.flow_id == flow.id
                    && types::conflicts(
                        trigger_type,
                        &scope,
                        &TriggerScope::from_trigger(t).normalized(trigger_type),
                    )
            });
            if let Some(restorable) = restorable {
                imported.push(self.restore(org_id, restorable.id).await?);
                continue;
            }

            imported.push(self.create(org_id, trigger_type, flow.id, scope).await?);
        }

        Ok(imported)
    }

    /// Export a trigger as a definition
    pub async fn as_export_def(&self, trigger: &Trigger) -> Result<TriggerDef, TriggerError> {
        let trigger_type = trigger
            .trigger_type_enum()
            .ok_or_else(|| TriggerError::InvalidDefinition(trigger.trigger_type.clone()))?;

        let flow = self
            .flows_repo()
            .get(trigger.flow_id)
            .await?
            .ok_or(TriggerError::FlowNotFound)?;

        let channel = match trigger.channel_id {
            Some(id) => self
                .channels_repo()
                .get(id)
                .await?
                .map(|c| ChannelRef::Ref(ExportRef { uuid: c.id, name: c.name })),
            None => None,
        };

        let keywords = match trigger_type {
            TriggerType::Keyword => Some(trigger.keywords_vec()),
            _ => None,
        };

        Ok(TriggerDef {
            trigger_type: trigger.trigger_type.clone(),
            flow: ExportRef { uuid: flow.id, name: flow.name },
            channel,
            groups: self.group_refs(&trigger.group_ids_vec()).await?,
            exclude_groups: self.group_refs(&trigger.exclude_group_ids_vec()).await?,
            keywords,
            keyword: None,
            match_type: trigger.match_type.clone(),
            referrer_id: trigger.referrer_id.clone(),
        })
    }

    async fn resolve_scope(
        &self,
        org_id: OrgId,
        trigger_type: TriggerType,
        def: &TriggerDef,
    ) -> Result<TriggerScope, TriggerError> {
        let channel_id = match &def.channel {
            Some(channel) => Some(
                self.channels_repo()
                    .get_active(org_id, channel.uuid())
                    .await?
                    .ok_or(TriggerError::ChannelNotFound)?
                    .id,
            ),
            None => None,
        };

        let mut group_ids = Vec::new();
        for group in &def.groups {
            group_ids.push(
                self.groups
                    .get_or_create(org_id, &group.name, Some(group.uuid))
                    .await?
                    .id,
            );
        }

        let mut exclude_group_ids = Vec::new();
        for group in &def.exclude_groups {
            exclude_group_ids.push(
                self.groups
                    .get_or_create(org_id, &group.name, Some(group.uuid))
                    .await?
                    .id,
            );
        }

        let match_type = match &def.match_type {
            Some(s) => Some(MatchType::from_str(s).ok_or_else(|| {
                TriggerError::InvalidDefinition(format!("Unknown match type: {s}"))
            })?),
            // older exports omit match type on keyword triggers
            None if trigger_type == TriggerType::Keyword => Some(MatchType::FirstWord),
            None => None,
        };

        Ok(TriggerScope {
            keywords: def.keywords(),
            match_type,
            group_ids,
            exclude_group_ids,
            contact_ids: Vec::new(),
            channel_id,
            referrer_id: def.referrer_id.clone(),
            schedule_id: None,
        }
        .normalized(trigger_type))
    }

    async fn group_refs(&self, ids: &[Uuid]) -> Result<Vec<ExportRef>, TriggerError> {
        let mut refs = Vec::new();
        for id in ids {
            if let Some(group) = self.groups.get(*id).await? {
                refs.push(ExportRef { uuid: group.id, name: group.name });
            }
        }
        Ok(refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use startline_storage::db::DatabasePool;
    use startline_storage::repository::{ChannelRepository, FlowRepository};

    async fn setup() -> (DatabasePool, TriggerManager, OrgId) {
        let db = DatabasePool::connect_memory().await.unwrap();
        db.migrate().await.unwrap();
        let manager = TriggerManager::new(&db);
        (db, manager, Uuid::new_v4())
    }

    fn keyword_def(flow: ExportRef, keywords: &[&str]) -> TriggerDef {
        TriggerDef {
            trigger_type: "keyword".to_string(),
            flow,
            channel: None,
            groups: Vec::new(),
            exclude_groups: Vec::new(),
            keywords: Some(keywords.iter().map(|k| k.to_string()).collect()),
            keyword: None,
            match_type: Some("only_word".to_string()),
            referrer_id: None,
        }
    }

    #[tokio::test]
    async fn test_import_is_idempotent() {
        let (db, manager, org) = setup().await;
        let flows = FlowRepository::new(db.pool().clone());
        let flow = flows.create(org, "Survey").await.unwrap();

        let defs = vec![keyword_def(
            ExportRef { uuid: flow.id, name: flow.name.clone() },
            &["start"],
        )];

        let first = manager.import_triggers(org, &defs).await.unwrap();
        let second = manager.import_triggers(org, &defs).await.unwrap();

        assert_eq!(first[0].id, second[0].id);
        assert_eq!(1, manager.list(org).await.unwrap().len());
    }

    #[tokio::test]
    async fn test_import_replaces_conflicting_flow() {
        let (db, manager, org) = setup().await;
        let flows = FlowRepository::new(db.pool().clone());
        let old_flow = flows.create(org, "Old Survey").await.unwrap();
        let new_flow = flows.create(org, "New Survey").await.unwrap();

        let existing = manager
            .create(
                org,
                TriggerType::Keyword,
                old_flow.id,
                TriggerScope {
                    keywords: vec!["start".to_string()],
                    match_type: Some(MatchType::OnlyWord),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let defs = vec![keyword_def(
            ExportRef { uuid: new_flow.id, name: new_flow.name.clone() },
            &["start"],
        )];
        let imported = manager.import_triggers(org, &defs).await.unwrap();

        assert_ne!(existing.id, imported[0].id);
        assert_eq!(new_flow.id, imported[0].flow_id);

        let old = manager.get(org, existing.id).await.unwrap();
        assert!(old.is_archived);
    }

    #[tokio::test]
    async fn test_import_restores_archived_equivalent() {
        let (db, manager, org) = setup().await;
        let flows = FlowRepository::new(db.pool().clone());
        let flow = flows.create(org, "Survey").await.unwrap();

        let existing = manager
            .create(
                org,
                TriggerType::Keyword,
                flow.id,
                TriggerScope {
                    keywords: vec!["start".to_string()],
                    match_type: Some(MatchType::OnlyWord),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        manager.archive(org, existing.id).await.unwrap();

        let defs = vec![keyword_def(
            ExportRef { uuid: flow.id, name: flow.name.clone() },
            &["start"],
        )];
        let imported = manager.import_triggers(org, &defs).await.unwrap();

        assert_eq!(existing.id, imported[0].id);
        assert!(!imported[0].is_archived);
    }

    #[tokio::test]
    async fn test_import_legacy_single_keyword_and_bare_channel_uuid() {
        let (db, manager, org) = setup().await;
        let flows = FlowRepository::new(db.pool().clone());
        let channels = ChannelRepository::new(db.pool().clone());
        let flow = flows.create(org, "Survey").await.unwrap();
        let channel = channels.create(org, "Nexmo").await.unwrap();

        let def: TriggerDef = serde_json::from_value(serde_json::json!({
            "trigger_type": "keyword",
            "flow": {"uuid": flow.id, "name": "Survey"},
            "channel": channel.id,
            "keyword": "Join",
        }))
        .unwrap();

        let imported = manager.import_triggers(org, &[def]).await.unwrap();
        assert_eq!(vec!["join".to_string()], imported[0].keywords_vec());
        assert_eq!(Some(channel.id), imported[0].channel_id);
        // missing match type defaults for keyword triggers
        assert_eq!(Some(MatchType::FirstWord), imported[0].match_type_enum());
    }

    #[tokio::test]
    async fn test_import_skips_schedule_defs_and_rejects_bad_keywords() {
        let (db, manager, org) = setup().await;
        let flows = FlowRepository::new(db.pool().clone());
        let flow = flows.create(org, "Survey").await.unwrap();

        let schedule_def = TriggerDef {
            trigger_type: "schedule".to_string(),
            ..keyword_def(ExportRef { uuid: flow.id, name: flow.name.clone() }, &[])
        };
        let imported = manager.import_triggers(org, &[schedule_def]).await.unwrap();
        assert!(imported.is_empty());

        let bad = keyword_def(
            ExportRef { uuid: flow.id, name: flow.name.clone() },
            &["this is not a keyword"],
        );
        let result = manager.import_triggers(org, &[bad]).await;
        assert!(matches!(result, Err(TriggerError::InvalidKeyword(_))));
    }

    #[tokio::test]
    async fn test_export_round_trip_is_stable() {
        let (db, manager, org) = setup().await;
        let flows = FlowRepository::new(db.pool().clone());
        let flow = flows.create(org, "Survey").await.unwrap();

        let trigger = manager
            .create(
                org,
                TriggerType::Keyword,
                flow.id,
                TriggerScope {
                    keywords: vec!["start".to_string()],
                    match_type: Some(MatchType::OnlyWord),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let def = manager.as_export_def(&trigger).await.unwrap();
        assert_eq!("keyword", def.trigger_type);
        assert_eq!(Some(vec!["start".to_string()]), def.keywords);

        let imported = manager.import_triggers(org, &[def]).await.unwrap();
        assert_eq!(trigger.id, imported[0].id);
    }
}
