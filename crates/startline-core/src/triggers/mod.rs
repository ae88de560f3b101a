//! Trigger conflict and priority engine

pub mod import;
pub mod manager;
pub mod types;

pub use import::TriggerDef;
pub use manager::{TriggerError, TriggerManager};
pub use types::TriggerScope;
