//! Campaign import and export
//!
//! Campaign import is a full replacement: the campaign itself is resolved
//! by UUID (same-site imports) or name, but its events are always released
//! and recreated from the definition, picking up fresh ids and fire
//! versions. Campaign event UUIDs carry no identity across imports.

use serde::{Deserialize, Serialize};
use startline_common::types::{
    CampaignId, EventType, ExportRef, OffsetUnit, OrgId, StartMode, UND_LANGUAGE,
};
use startline_storage::models::{Campaign, Translation};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

use super::manager::{CampaignError, CampaignManager};

/// An exported campaign definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignDef {
    pub uuid: CampaignId,
    pub name: String,
    pub group: ExportRef,
    pub events: Vec<EventDef>,
}

/// An exported campaign event definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,

    pub event_type: String,
    pub offset: i64,
    pub unit: String,

    #[serde(default = "default_delivery_hour")]
    pub delivery_hour: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_mode: Option<String>,

    pub relative_to: FieldRef,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<ExportRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageDef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_language: Option<String>,
}

fn default_delivery_hour() -> i64 {
    -1
}

/// A contact field reference in an export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRef {
    pub key: String,

    #[serde(default)]
    pub label: String,
}

/// Message content in an export, either translated or a bare string from
/// very old exports
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageDef {
    Text(String),
    Map(HashMap<String, String>),
}

impl CampaignManager {
    /// Import campaign definitions. `same_site` means the export came from
    /// this installation, so UUID references can be trusted.
    pub async fn import_campaigns(
        &self,
        org_id: OrgId,
        defs: &[CampaignDef],
        same_site: bool,
    ) -> Result<Vec<Campaign>, CampaignError> {
        let mut imported = Vec::new();

        for def in defs {
            let group = self
                .groups
                .get_or_create(org_id, &def.group.name, same_site.then_some(def.group.uuid))
                .await?;

            let campaign = self.resolve_campaign(org_id, def, group.id, same_site).await?;

            // imports replace events wholesale rather than merging
            for event in self.events_repo().list_active_by_campaign(campaign.id).await? {
                self.release_event(org_id, event.id).await?;
            }

            for event_def in &def.events {
                self.import_event(org_id, campaign.id, event_def).await?;
            }

            imported.push(campaign);
        }

        Ok(imported)
    }

    /// Export a campaign as a definition
    pub async fn as_export_def(
        &self,
        org_id: OrgId,
        campaign_id: CampaignId,
    ) -> Result<CampaignDef, CampaignError> {
        let campaign = self.get_campaign(org_id, campaign_id).await?;
        let group = self
            .groups
            .get(campaign.group_id)
            .await?
            .ok_or(CampaignError::GroupNotFound)?;

        let mut events = Vec::new();
        for event in self.events_repo().list_active_by_campaign(campaign_id).await? {
            let field = self
                .fields
                .get(event.relative_to_id)
                .await?
                .ok_or_else(|| {
                    CampaignError::InvalidDefinition("Unknown relative-to field".to_string())
                })?;

            let flow = match event.flow_id {
                Some(flow_id) => self
                    .flows
                    .get(flow_id)
                    .await?
                    .map(|f| ExportRef { uuid: f.id, name: f.name }),
                None => None,
            };

            let message = match event.event_type_enum() {
                Some(EventType::Message) => Some(MessageDef::Map(
                    event
                        .translations_map()
                        .into_iter()
                        .map(|(lang, t)| (lang, t.text))
                        .collect(),
                )),
                _ => None,
            };

            events.push(EventDef {
                uuid: Some(event.id),
                event_type: event.event_type.clone(),
                offset: event.offset,
                unit: event.unit.clone(),
                delivery_hour: event.delivery_hour,
                start_mode: Some(event.start_mode.clone()),
                relative_to: FieldRef { key: field.key, label: field.name },
                flow,
                message,
                base_language: event.base_language.clone(),
            });
        }

        Ok(CampaignDef {
            uuid: campaign.id,
            name: campaign.name,
            group: ExportRef { uuid: group.id, name: group.name },
            events,
        })
    }

    async fn resolve_campaign(
        &self,
        org_id: OrgId,
        def: &CampaignDef,
        group_id: Uuid,
        same_site: bool,
    ) -> Result<Campaign, CampaignError> {
        let mut existing = None;
        if same_site {
            existing = self.campaigns_repo().get_by_org(org_id, def.uuid).await?;
        }
        if existing.is_none() {
            existing = self.campaigns_repo().find_by_name(org_id, &def.name).await?;
        }

        match existing {
            Some(campaign) => {
                if campaign.is_archived {
                    self.campaigns_repo().set_archived(campaign.id, false).await?;
                }
                self.campaigns_repo()
                    .update_group(campaign.id, group_id)
                    .await?
                    .ok_or(CampaignError::CampaignNotFound)
            }
            // preserve the exported uuid when it isn't taken elsewhere
            None => {
                let id = match self.campaigns_repo().get(def.uuid).await? {
                    Some(_) => Uuid::new_v4(),
                    None => def.uuid,
                };
                Ok(self
                    .campaigns_repo()
                    .create_with_id(id, org_id, &def.name, group_id)
                    .await?)
            }
        }
    }

    async fn import_event(
        &self,
        org_id: OrgId,
        campaign_id: CampaignId,
        def: &EventDef,
    ) -> Result<(), CampaignError> {
        let event_type = EventType::from_str(&def.event_type).ok_or_else(|| {
            CampaignError::InvalidDefinition(format!("Unknown event type: {}", def.event_type))
        })?;
        let unit = OffsetUnit::from_str(&def.unit).ok_or_else(|| {
            CampaignError::InvalidDefinition(format!("Unknown offset unit: {}", def.unit))
        })?;
        let start_mode = match &def.start_mode {
            Some(s) => StartMode::from_str(s).ok_or_else(|| {
                CampaignError::InvalidDefinition(format!("Unknown start mode: {s}"))
            })?,
            None => StartMode::default(),
        };

        let label = if def.relative_to.label.is_empty() {
            &def.relative_to.key
        } else {
            &def.relative_to.label
        };
        let field = self
            .fields
            .get_or_create_datetime(org_id, &def.relative_to.key, label)
            .await?;

        match event_type {
            EventType::Flow => {
                let flow_ref = def.flow.as_ref().ok_or_else(|| {
                    CampaignError::InvalidDefinition("Flow event without a flow".to_string())
                })?;

                // the flow may not have survived to this installation
                let Some(flow) = self.flows.get_active(org_id, flow_ref.uuid).await? else {
                    warn!(flow_uuid = %flow_ref.uuid, "Skipping event for missing flow");
                    return Ok(());
                };

                self.create_flow_event(
                    org_id,
                    campaign_id,
                    field.id,
                    def.offset,
                    unit,
                    def.delivery_hour,
                    flow.id,
                    start_mode,
                )
                .await?;
            }
            EventType::Message => {
                let (translations, base_language) = normalize_message(def)?;
                self.create_message_event(
                    org_id,
                    campaign_id,
                    field.id,
                    def.offset,
                    unit,
                    def.delivery_hour,
                    translations,
                    &base_language,
                    start_mode,
                )
                .await?;
            }
        }

        Ok(())
    }
}

/// Normalize exported message content: bare strings and the legacy "base"
/// language key both become the wildcard language
fn normalize_message(
    def: &EventDef,
) -> Result<(HashMap<String, Translation>, String), CampaignError> {
    let raw = match &def.message {
        Some(MessageDef::Text(text)) => {
            HashMap::from([(UND_LANGUAGE.to_string(), text.clone())])
        }
        Some(MessageDef::Map(map)) => map
            .iter()
            .map(|(lang, text)| {
                let lang = if lang == "base" { UND_LANGUAGE } else { lang };
                (lang.to_string(), text.clone())
            })
            .collect(),
        None => {
            return Err(CampaignError::InvalidDefinition(
                "Message event without a message".to_string(),
            ))
        }
    };

    let base_language = match def.base_language.as_deref() {
        Some("base") | None => None,
        Some(lang) => Some(lang.to_string()),
    }
    .filter(|lang| raw.contains_key(lang));

    let base_language = match base_language {
        Some(lang) => lang,
        None if raw.contains_key(UND_LANGUAGE) => UND_LANGUAGE.to_string(),
        // fall back to any present language, deterministically
        None => raw
            .keys()
            .min()
            .cloned()
            .ok_or_else(|| {
                CampaignError::InvalidDefinition("Message event without content".to_string())
            })?,
    };

    let translations = raw
        .into_iter()
        .map(|(lang, text)| (lang, Translation { text }))
        .collect();

    Ok((translations, base_language))
}
