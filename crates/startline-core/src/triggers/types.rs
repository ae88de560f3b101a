//! Trigger scope, keyword validity, equivalence and priority rules

use regex::Regex;
use startline_common::types::{
    ChannelId, ContactId, GroupId, MatchType, ScheduleId, TriggerType,
};
use startline_storage::models::Trigger;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Maximum keyword length in characters
pub const KEYWORD_MAX_LEN: usize = 16;

/// A valid keyword is 1-16 word characters in any script, or exactly one
/// emoji
fn keyword_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^(?:\w{1,16}|\p{Emoji_Presentation})$").unwrap_or_else(|_| unreachable!())
    })
}

/// Whether the given string can be used as a trigger keyword
pub fn is_valid_keyword(keyword: &str) -> bool {
    keyword_regex().is_match(keyword)
}

/// The scoping fields of a trigger, independent of which flow it starts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerScope {
    pub keywords: Vec<String>,
    pub match_type: Option<MatchType>,
    pub group_ids: Vec<GroupId>,
    pub exclude_group_ids: Vec<GroupId>,
    pub contact_ids: Vec<ContactId>,
    pub channel_id: Option<ChannelId>,
    pub referrer_id: Option<String>,
    pub schedule_id: Option<ScheduleId>,
}

/// Which scope fields each trigger type uses. Anything else is cleared at
/// creation so stray fields can never affect equivalence or priority.
struct AllowedFields {
    keywords: bool,
    groups: bool,
    exclude_groups: bool,
    contacts: bool,
    channel: bool,
    referrer: bool,
    schedule: bool,
}

fn allowed_fields(trigger_type: TriggerType) -> AllowedFields {
    let none = AllowedFields {
        keywords: false,
        groups: false,
        exclude_groups: false,
        contacts: false,
        channel: false,
        referrer: false,
        schedule: false,
    };

    match trigger_type {
        TriggerType::Keyword => AllowedFields {
            keywords: true,
            groups: true,
            exclude_groups: true,
            contacts: true,
            channel: true,
            ..none
        },
        TriggerType::Schedule => AllowedFields {
            groups: true,
            exclude_groups: true,
            contacts: true,
            schedule: true,
            ..none
        },
        TriggerType::CatchAll | TriggerType::InboundCall => AllowedFields {
            groups: true,
            exclude_groups: true,
            channel: true,
            ..none
        },
        TriggerType::ClosedTicket => AllowedFields {
            groups: true,
            exclude_groups: true,
            ..none
        },
        TriggerType::MissedCall => none,
        TriggerType::NewConversation | TriggerType::OptIn | TriggerType::OptOut => AllowedFields {
            channel: true,
            ..none
        },
        TriggerType::Referral => AllowedFields {
            channel: true,
            referrer: true,
            ..none
        },
    }
}

impl TriggerScope {
    /// Rebuild the scope of a stored trigger
    pub fn from_trigger(trigger: &Trigger) -> Self {
        Self {
            keywords: trigger.keywords_vec(),
            match_type: trigger.match_type_enum(),
            group_ids: trigger.group_ids_vec(),
            exclude_group_ids: trigger.exclude_group_ids_vec(),
            contact_ids: trigger.contact_ids_vec(),
            channel_id: trigger.channel_id,
            referrer_id: trigger.referrer_id.clone(),
            schedule_id: trigger.schedule_id,
        }
    }

    /// Lowercase keywords and referrer, and clear every field the trigger
    /// type does not use
    pub fn normalized(mut self, trigger_type: TriggerType) -> Self {
        let allowed = allowed_fields(trigger_type);

        if allowed.keywords {
            for keyword in &mut self.keywords {
                *keyword = keyword.to_lowercase();
            }
        } else {
            self.keywords.clear();
            self.match_type = None;
        }
        if !allowed.groups {
            self.group_ids.clear();
        }
        if !allowed.exclude_groups {
            self.exclude_group_ids.clear();
        }
        if !allowed.contacts {
            self.contact_ids.clear();
        }
        if !allowed.channel {
            self.channel_id = None;
        }
        if allowed.referrer {
            self.referrer_id = self
                .referrer_id
                .map(|r| r.to_lowercase())
                .filter(|r| !r.is_empty());
        } else {
            self.referrer_id = None;
        }
        if !allowed.schedule {
            self.schedule_id = None;
        }

        self
    }

    /// Priority of a trigger with this scope: more specific scopes win when
    /// multiple triggers of a type match the same incoming event. Channel
    /// outranks any combination of group conditions, inclusion outranks
    /// exclusion.
    pub fn priority(&self) -> i64 {
        let mut priority = 0;
        if self.channel_id.is_some() {
            priority += 4;
        }
        if !self.group_ids.is_empty() {
            priority += 2;
        }
        if !self.exclude_group_ids.is_empty() {
            priority += 1;
        }
        priority
    }
}

fn set_eq(a: &[GroupId], b: &[GroupId]) -> bool {
    a.iter().collect::<HashSet<_>>() == b.iter().collect::<HashSet<_>>()
}

fn intersects(a: &[String], b: &[String]) -> bool {
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    a.iter().any(|k| b.contains(k.as_str()))
}

/// Whether two normalized scopes of the same trigger type would claim the
/// same incoming events, meaning they cannot both be active
pub fn conflicts(trigger_type: TriggerType, a: &TriggerScope, b: &TriggerScope) -> bool {
    match trigger_type {
        // same keyword reachable with the same included groups, regardless
        // of how the keyword matches
        TriggerType::Keyword => {
            intersects(&a.keywords, &b.keywords) && set_eq(&a.group_ids, &b.group_ids)
        }
        TriggerType::CatchAll | TriggerType::InboundCall | TriggerType::ClosedTicket => {
            set_eq(&a.group_ids, &b.group_ids)
        }
        // only one missed call trigger per org
        TriggerType::MissedCall => true,
        TriggerType::NewConversation | TriggerType::OptIn | TriggerType::OptOut => {
            a.channel_id == b.channel_id
        }
        TriggerType::Referral => {
            a.channel_id == b.channel_id && a.referrer_id == b.referrer_id
        }
        // schedule triggers never conflict, every one has its own schedule
        TriggerType::Schedule => false,
    }
}
