//! Post-commit notification dispatch
//!
//! Schedule notifications are sent to the external engine only after the
//! local transaction commits, from a background worker so request paths
//! never block on the engine. Delivery is fire-and-forget: a failed
//! notification is logged and dropped, leaving the event parked in the
//! scheduling status until the next schedule attempt.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, warn};

use super::client::FlowScheduler;
use startline_common::types::{EventId, OrgId};

/// A request for the engine to build fires for one event version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleNotification {
    pub org_id: OrgId,
    pub event_id: EventId,
    pub fire_version: i64,
}

/// Spawns the background worker that forwards notifications to the engine
pub struct Dispatcher;

impl Dispatcher {
    /// Start the worker task and return a handle for queueing notifications
    pub fn spawn(scheduler: Arc<dyn FlowScheduler>) -> DispatchHandle {
        let (tx, mut rx) = mpsc::unbounded_channel::<ScheduleNotification>();
        let sent = Arc::new(AtomicU64::new(0));
        let processed = Arc::new(AtomicU64::new(0));

        let worker_processed = processed.clone();
        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                if let Err(err) = scheduler
                    .schedule_event(
                        notification.org_id,
                        notification.event_id,
                        notification.fire_version,
                    )
                    .await
                {
                    warn!(
                        event_id = %notification.event_id,
                        fire_version = notification.fire_version,
                        error = %err,
                        "Failed to notify engine of schedule, event stays in scheduling status"
                    );
                }
                worker_processed.fetch_add(1, Ordering::Release);
            }
        });

        DispatchHandle { tx, sent, processed }
    }
}

/// Handle for queueing notifications to the dispatch worker
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::UnboundedSender<ScheduleNotification>,
    sent: Arc<AtomicU64>,
    processed: Arc<AtomicU64>,
}

impl DispatchHandle {
    /// Queue a notification, never blocking the caller
    pub fn notify(&self, notification: ScheduleNotification) {
        if self.tx.send(notification).is_ok() {
            self.sent.fetch_add(1, Ordering::Release);
        } else {
            error!("Dispatch worker is gone, dropping schedule notification");
        }
    }

    /// Wait until every queued notification has been handed to the engine
    pub async fn drain(&self) {
        while self.processed.load(Ordering::Acquire) < self.sent.load(Ordering::Acquire) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}
