//! External flow execution engine interface

pub mod client;
pub mod dispatch;

pub use client::{FlowScheduler, HttpFlowScheduler, RecordingFlowScheduler};
pub use dispatch::{DispatchHandle, Dispatcher, ScheduleNotification};
