use std::collections::HashMap;
use std::time::Duration as StdDuration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tracing::debug;

use crate::backend::BoxStream;
use crate::types::{EventKind, OrchestratorEvent};

/// Fans out status-change events without coupling the Queue Engine to
/// transport details (§4.5). Durable events (job lifecycle, robot
/// lifecycle) and the lossy `robot.heartbeat` stream are separate
/// broadcast channels so a slow dashboard consumer only ever drops
/// heartbeats, never a lifecycle transition.
///
/// `tokio::sync::broadcast::Sender::send` never blocks the caller —
/// lagging receivers skip ahead and see a `Lagged` error instead of
/// stalling the writer. That is exactly the back-pressure-on-transport,
/// never-on-the-engine contract this bus must uphold.
pub struct NotificationBus {
    durable_tx: broadcast::Sender<OrchestratorEvent>,
    heartbeat_tx: broadcast::Sender<OrchestratorEvent>,
    sequences: Mutex<HashMap<String, u64>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        let (durable_tx, _) = broadcast::channel(4096);
        let (heartbeat_tx, _) = broadcast::channel(256);
        Self {
            durable_tx,
            heartbeat_tx,
            sequences: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate the next monotonic sequence number for a subject.
    pub fn next_sequence(&self, subject_key: &str) -> u64 {
        let mut sequences = self.sequences.lock();
        let entry = sequences.entry(subject_key.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Publish an event. Heartbeats go to the lossy channel; every
    /// other kind goes to the durable one.
    pub fn publish(&self, event: OrchestratorEvent) {
        let sent = if matches!(event.kind, EventKind::RobotHeartbeat) {
            self.heartbeat_tx.send(event).map(|_| ())
        } else {
            self.durable_tx.send(event).map(|_| ())
        };
        if sent.is_err() {
            debug!("no subscribers currently attached to the notification bus");
        }
    }

    /// Raw durable event stream (job + robot lifecycle events), all tenants.
    pub fn subscribe_durable(&self) -> BoxStream<OrchestratorEvent> {
        let stream = BroadcastStream::new(self.durable_tx.subscribe()).filter_map(|r| r.ok());
        Box::pin(stream)
    }

    /// Raw heartbeat stream, unsampled, all tenants.
    pub fn subscribe_heartbeats(&self) -> BoxStream<OrchestratorEvent> {
        let stream = BroadcastStream::new(self.heartbeat_tx.subscribe()).filter_map(|r| r.ok());
        Box::pin(stream)
    }

    /// Dashboard-facing stream (§4.5): durable + heartbeat events
    /// multiplexed and filtered to one tenant, with heartbeats sampled
    /// to at most one per `min_heartbeat_interval` per robot to bound
    /// bandwidth to a UI.
    pub fn subscribe_dashboard(&self, tenant_id: String, min_heartbeat_interval: StdDuration) -> BoxStream<OrchestratorEvent> {
        let durable = BroadcastStream::new(self.durable_tx.subscribe()).filter_map(|r| r.ok());
        let heartbeats = BroadcastStream::new(self.heartbeat_tx.subscribe()).filter_map(|r| r.ok());
        let merged = durable.merge(heartbeats);

        let tenant_id_for_filter = tenant_id.clone();
        let filtered = merged.filter(move |event| event.tenant_id == tenant_id_for_filter);

        let mut last_heartbeat_at: HashMap<String, std::time::Instant> = HashMap::new();
        let sampled = filtered.filter_map(move |event| {
            if !matches!(event.kind, EventKind::RobotHeartbeat) {
                return Some(event);
            }
            let key = format!("{:?}", event.subject_id);
            let now = std::time::Instant::now();
            let should_forward = match last_heartbeat_at.get(&key) {
                Some(prev) => now.duration_since(*prev) >= min_heartbeat_interval,
                None => true,
            };
            if should_forward {
                last_heartbeat_at.insert(key, now);
                Some(event)
            } else {
                None
            }
        });

        Box::pin(sampled)
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}
