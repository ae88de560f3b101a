//! Repository layer for data access

pub mod assets;
pub mod campaigns;
pub mod events;
pub mod fire_counts;
pub mod recent_fires;
pub mod schedules;
pub mod triggers;

pub use assets::{
    ChannelRepository, ContactFieldRepository, ContactGroupRepository, ContactRepository,
    FlowRepository,
};
pub use campaigns::CampaignRepository;
pub use events::CampaignEventRepository;
pub use fire_counts::FireCountRepository;
pub use recent_fires::RecentFireRepository;
pub use schedules::ScheduleRepository;
pub use triggers::TriggerRepository;
