//! Startline Core - Flow start decision engines
//!
//! This crate decides when flow executions start: the trigger conflict &
//! priority engine for reactive starts, and the campaign scheduling &
//! fire-versioning engine for proactive starts, plus the client and
//! dispatcher for the external flow execution engine.

pub mod campaigns;
pub mod engine;
pub mod triggers;

pub use campaigns::{CampaignError, CampaignManager};
pub use engine::{
    DispatchHandle, Dispatcher, FlowScheduler, HttpFlowScheduler, RecordingFlowScheduler,
    ScheduleNotification,
};
pub use triggers::{TriggerError, TriggerManager, TriggerScope};
