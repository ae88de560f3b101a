//! Database models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use startline_common::types::{
    CampaignId, ChannelId, ContactId, EventId, EventStatus, EventType, FieldId, FieldType, FlowId,
    GroupId, MatchType, OffsetUnit, OrgId, RepeatPeriod, ScheduleId, StartMode, TriggerId,
    TriggerType,
};
use std::collections::HashMap;
use uuid::Uuid;

/// Flow model (weak reference target, owned by the flow editor)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Flow {
    pub id: FlowId,
    pub org_id: OrgId,
    pub name: String,
    pub is_system: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Channel model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub org_id: OrgId,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Contact model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub org_id: OrgId,
    pub name: Option<String>,
    pub language: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Contact group model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ContactGroup {
    pub id: GroupId,
    pub org_id: OrgId,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Contact field model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ContactField {
    pub id: FieldId,
    pub org_id: OrgId,
    pub key: String,
    pub name: String,
    pub value_type: String,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContactField {
    /// Get value type enum
    pub fn value_type_enum(&self) -> Option<FieldType> {
        FieldType::from_str(&self.value_type)
    }
}

/// Schedule model, the minimal surface schedule-type triggers need
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub org_id: OrgId,
    pub repeat_period: String,
    pub next_fire: Option<DateTime<Utc>>,
    pub is_paused: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    /// Get repeat period enum
    pub fn repeat_period_enum(&self) -> Option<RepeatPeriod> {
        RepeatPeriod::from_str(&self.repeat_period)
    }
}

/// Trigger model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Trigger {
    pub id: TriggerId,
    pub org_id: OrgId,
    pub trigger_type: String,
    pub flow_id: FlowId,
    pub keywords: Option<serde_json::Value>,
    pub match_type: Option<String>,
    pub group_ids: serde_json::Value,
    pub exclude_group_ids: serde_json::Value,
    pub contact_ids: serde_json::Value,
    pub channel_id: Option<ChannelId>,
    pub referrer_id: Option<String>,
    pub schedule_id: Option<ScheduleId>,
    pub priority: i64,
    pub is_archived: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trigger {
    /// Get trigger type enum
    pub fn trigger_type_enum(&self) -> Option<TriggerType> {
        TriggerType::from_str(&self.trigger_type)
    }

    /// Get match type enum
    pub fn match_type_enum(&self) -> Option<MatchType> {
        self.match_type.as_deref().and_then(MatchType::from_str)
    }

    /// Get keywords as a vector
    pub fn keywords_vec(&self) -> Vec<String> {
        self.keywords
            .clone()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    /// Get included group ids as a vector
    pub fn group_ids_vec(&self) -> Vec<GroupId> {
        serde_json::from_value(self.group_ids.clone()).unwrap_or_default()
    }

    /// Get excluded group ids as a vector
    pub fn exclude_group_ids_vec(&self) -> Vec<GroupId> {
        serde_json::from_value(self.exclude_group_ids.clone()).unwrap_or_default()
    }

    /// Get contact ids as a vector
    pub fn contact_ids_vec(&self) -> Vec<ContactId> {
        serde_json::from_value(self.contact_ids.clone()).unwrap_or_default()
    }
}

/// Input for creating a trigger, scope already validated and normalized
#[derive(Debug, Clone)]
pub struct NewTrigger {
    pub org_id: OrgId,
    pub trigger_type: TriggerType,
    pub flow_id: FlowId,
    pub keywords: Vec<String>,
    pub match_type: Option<MatchType>,
    pub group_ids: Vec<GroupId>,
    pub exclude_group_ids: Vec<GroupId>,
    pub contact_ids: Vec<ContactId>,
    pub channel_id: Option<ChannelId>,
    pub referrer_id: Option<String>,
    pub schedule_id: Option<ScheduleId>,
    pub priority: i64,
}

/// Campaign model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub org_id: OrgId,
    pub name: String,
    pub group_id: GroupId,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single language rendering of a message event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub text: String,
}

/// Campaign event model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CampaignEvent {
    pub id: EventId,
    pub campaign_id: CampaignId,
    pub event_type: String,
    pub status: String,
    pub fire_version: i64,
    pub relative_to_id: FieldId,
    pub offset: i64,
    pub unit: String,
    pub delivery_hour: i64,
    pub flow_id: Option<FlowId>,
    pub translations: Option<serde_json::Value>,
    pub base_language: Option<String>,
    pub start_mode: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignEvent {
    /// Get event type enum
    pub fn event_type_enum(&self) -> Option<EventType> {
        EventType::from_str(&self.event_type)
    }

    /// Get status enum
    pub fn status_enum(&self) -> Option<EventStatus> {
        EventStatus::from_str(&self.status)
    }

    /// Get offset unit enum
    pub fn unit_enum(&self) -> Option<OffsetUnit> {
        OffsetUnit::from_str(&self.unit)
    }

    /// Get start mode enum
    pub fn start_mode_enum(&self) -> Option<StartMode> {
        StartMode::from_str(&self.start_mode)
    }

    /// Get translations as a language keyed map
    pub fn translations_map(&self) -> HashMap<String, Translation> {
        self.translations
            .clone()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    /// Converts offset and unit into a duration
    pub fn offset_duration(&self) -> Duration {
        match self.unit_enum().unwrap_or(OffsetUnit::Days) {
            OffsetUnit::Minutes => Duration::minutes(self.offset),
            OffsetUnit::Hours => Duration::hours(self.offset),
            OffsetUnit::Days => Duration::days(self.offset),
            OffsetUnit::Weeks => Duration::days(7 * self.offset),
        }
    }

    /// Returns the offset and unit as a human readable string
    pub fn offset_display(&self) -> String {
        let unit = self.unit_enum().unwrap_or(OffsetUnit::Days);
        let count = self.offset.abs();
        let noun = if count == 1 {
            unit.singular().to_string()
        } else {
            format!("{}s", unit.singular())
        };

        if self.offset < 0 {
            format!("{} {} before", count, noun)
        } else if self.offset > 0 {
            format!("{} {} after", count, noun)
        } else {
            "on".to_string()
        }
    }

    /// For message type events returns the translation for the given
    /// contact, falling back to the base language
    pub fn get_message(&self, contact: Option<&Contact>) -> Option<Translation> {
        let translations = self.translations_map();

        if let Some(lang) = contact.and_then(|c| c.language.as_deref()) {
            if let Some(t) = translations.get(lang) {
                return Some(t.clone());
            }
        }

        self.base_language
            .as_deref()
            .and_then(|lang| translations.get(lang).cloned())
    }

    /// Counter scope for this event at its current fire version
    pub fn fire_count_scope(&self) -> String {
        format!("campfires:{}:{}", self.id, self.fire_version)
    }

    /// Counter scope prefix covering every fire version of this event
    pub fn fire_count_scope_prefix(&self) -> String {
        format!("campfires:{}:", self.id)
    }
}

/// Input for creating a campaign event
#[derive(Debug, Clone)]
pub struct NewCampaignEvent {
    pub campaign_id: CampaignId,
    pub event_type: EventType,
    pub relative_to_id: FieldId,
    pub offset: i64,
    pub unit: OffsetUnit,
    pub delivery_hour: i64,
    pub flow_id: Option<FlowId>,
    pub translations: Option<HashMap<String, Translation>>,
    pub base_language: Option<String>,
    pub start_mode: StartMode,
}

/// An additive fire counter row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FireCount {
    pub id: i64,
    pub org_id: OrgId,
    pub scope: String,
    pub count: i64,
}

/// A raw recency index row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RecentFire {
    pub id: i64,
    pub event_id: EventId,
    pub member: String,
    pub fired_on: DateTime<Utc>,
}

impl RecentFire {
    /// Parses the contact id out of the `{disambiguator}|{contact_id}` member
    pub fn contact_id(&self) -> Option<ContactId> {
        let (_, contact) = self.member.split_once('|')?;
        Uuid::parse_str(contact).ok()
    }
}

/// A recency entry resolved against a still-existing contact
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedFire {
    pub contact: Contact,
    pub time: DateTime<Utc>,
}
