//! Flow execution engine client
//!
//! The external engine owns fire scheduling and flow execution. This side
//! only tells it that an event needs (re)scheduling under a new fire
//! version; the engine flips the event back to ready when it is done.

use async_trait::async_trait;
use startline_common::config::EngineConfig;
use startline_common::types::{EventId, OrgId};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::dispatch::ScheduleNotification;

/// Client interface to the external flow execution engine
#[async_trait]
pub trait FlowScheduler: Send + Sync {
    /// Ask the engine to build fires for an event at the given fire version
    async fn schedule_event(
        &self,
        org_id: OrgId,
        event_id: EventId,
        fire_version: i64,
    ) -> anyhow::Result<()>;
}

/// HTTP implementation of [`FlowScheduler`]
pub struct HttpFlowScheduler {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFlowScheduler {
    /// Create a new engine client from configuration
    pub fn new(config: &EngineConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl FlowScheduler for HttpFlowScheduler {
    async fn schedule_event(
        &self,
        org_id: OrgId,
        event_id: EventId,
        fire_version: i64,
    ) -> anyhow::Result<()> {
        let url = format!("{}/campaignevent/schedule", self.base_url);
        let body = ScheduleNotification {
            org_id,
            event_id,
            fire_version,
        };

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            anyhow::bail!(
                "engine returned {} for schedule of event {}",
                response.status(),
                event_id
            );
        }

        Ok(())
    }
}

/// In-memory [`FlowScheduler`] that records calls instead of making them
#[derive(Default)]
pub struct RecordingFlowScheduler {
    calls: Mutex<Vec<ScheduleNotification>>,
}

impl RecordingFlowScheduler {
    /// Create a shared recorder
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The notifications received so far, in order
    pub fn calls(&self) -> Vec<ScheduleNotification> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl FlowScheduler for RecordingFlowScheduler {
    async fn schedule_event(
        &self,
        org_id: OrgId,
        event_id: EventId,
        fire_version: i64,
    ) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ScheduleNotification {
                org_id,
                event_id,
                fire_version,
            });
        Ok(())
    }
}
