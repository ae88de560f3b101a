//! Campaign event scheduling engine

pub mod import;
pub mod manager;

pub use import::CampaignDef;
pub use manager::{CampaignError, CampaignManager};
