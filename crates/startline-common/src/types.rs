//! Common types for Startline

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for orgs (workspaces)
pub type OrgId = Uuid;

/// Unique identifier for flows
pub type FlowId = Uuid;

/// Unique identifier for channels
pub type ChannelId = Uuid;

/// Unique identifier for contacts
pub type ContactId = Uuid;

/// Unique identifier for contact groups
pub type GroupId = Uuid;

/// Unique identifier for contact fields
pub type FieldId = Uuid;

/// Unique identifier for triggers
pub type TriggerId = Uuid;

/// Unique identifier for schedules
pub type ScheduleId = Uuid;

/// Unique identifier for campaigns
pub type CampaignId = Uuid;

/// Unique identifier for campaign events
pub type EventId = Uuid;

/// The wildcard language code used for untranslated message content
pub const UND_LANGUAGE: &str = "und";

/// Trigger types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Keyword,
    Schedule,
    CatchAll,
    InboundCall,
    MissedCall,
    NewConversation,
    Referral,
    ClosedTicket,
    OptIn,
    OptOut,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::Keyword => "keyword",
            TriggerType::Schedule => "schedule",
            TriggerType::CatchAll => "catch_all",
            TriggerType::InboundCall => "inbound_call",
            TriggerType::MissedCall => "missed_call",
            TriggerType::NewConversation => "new_conversation",
            TriggerType::Referral => "referral",
            TriggerType::ClosedTicket => "closed_ticket",
            TriggerType::OptIn => "opt_in",
            TriggerType::OptOut => "opt_out",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "keyword" => Some(TriggerType::Keyword),
            "schedule" => Some(TriggerType::Schedule),
            "catch_all" => Some(TriggerType::CatchAll),
            "inbound_call" => Some(TriggerType::InboundCall),
            "missed_call" => Some(TriggerType::MissedCall),
            "new_conversation" => Some(TriggerType::NewConversation),
            "referral" => Some(TriggerType::Referral),
            "closed_ticket" => Some(TriggerType::ClosedTicket),
            "opt_in" => Some(TriggerType::OptIn),
            "opt_out" => Some(TriggerType::OptOut),
            _ => None,
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How keyword triggers match against inbound message text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    OnlyWord,
    FirstWord,
    Anywhere,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::OnlyWord => "only_word",
            MatchType::FirstWord => "first_word",
            MatchType::Anywhere => "anywhere",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "only_word" => Some(MatchType::OnlyWord),
            "first_word" => Some(MatchType::FirstWord),
            "anywhere" => Some(MatchType::Anywhere),
            _ => None,
        }
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Campaign event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Flow,
    Message,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Flow => "flow",
            EventType::Message => "message",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "flow" => Some(EventType::Flow),
            "message" => Some(EventType::Message),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Campaign event scheduling status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Ready,
    Scheduling,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Ready => "ready",
            EventStatus::Scheduling => "scheduling",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ready" => Some(EventStatus::Ready),
            "scheduling" => Some(EventStatus::Scheduling),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Campaign event offset units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl OffsetUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            OffsetUnit::Minutes => "minutes",
            OffsetUnit::Hours => "hours",
            OffsetUnit::Days => "days",
            OffsetUnit::Weeks => "weeks",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "minutes" => Some(OffsetUnit::Minutes),
            "hours" => Some(OffsetUnit::Hours),
            "days" => Some(OffsetUnit::Days),
            "weeks" => Some(OffsetUnit::Weeks),
            _ => None,
        }
    }

    /// Singular display name, e.g. "week"
    pub fn singular(&self) -> &'static str {
        match self {
            OffsetUnit::Minutes => "minute",
            OffsetUnit::Hours => "hour",
            OffsetUnit::Days => "day",
            OffsetUnit::Weeks => "week",
        }
    }
}

impl std::fmt::Display for OffsetUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens to a contact's other flow runs when a campaign event fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartMode {
    Interrupt,
    Skip,
    Passive,
}

impl StartMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StartMode::Interrupt => "interrupt",
            StartMode::Skip => "skip",
            StartMode::Passive => "passive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "interrupt" => Some(StartMode::Interrupt),
            "skip" => Some(StartMode::Skip),
            "passive" => Some(StartMode::Passive),
            _ => None,
        }
    }
}

impl std::fmt::Display for StartMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for StartMode {
    fn default() -> Self {
        StartMode::Interrupt
    }
}

/// Contact field value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Datetime,
    State,
    District,
    Ward,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Datetime => "datetime",
            FieldType::State => "state",
            FieldType::District => "district",
            FieldType::Ward => "ward",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "text" => Some(FieldType::Text),
            "number" => Some(FieldType::Number),
            "datetime" => Some(FieldType::Datetime),
            "state" => Some(FieldType::State),
            "district" => Some(FieldType::District),
            "ward" => Some(FieldType::Ward),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schedule repeat periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatPeriod {
    Never,
    Daily,
    Weekly,
    Monthly,
}

impl RepeatPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatPeriod::Never => "never",
            RepeatPeriod::Daily => "daily",
            RepeatPeriod::Weekly => "weekly",
            RepeatPeriod::Monthly => "monthly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "never" => Some(RepeatPeriod::Never),
            "daily" => Some(RepeatPeriod::Daily),
            "weekly" => Some(RepeatPeriod::Weekly),
            "monthly" => Some(RepeatPeriod::Monthly),
        _ => None,
        }
    }
}

impl std::fmt::Display for RepeatPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference to an exported object, resolved by UUID on the same site and
/// by name otherwise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRef {
    pub uuid: Uuid,
    pub name: String,
}
