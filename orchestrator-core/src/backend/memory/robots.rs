use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::backend::RobotStore;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::types::{JobId, RequestCtx, ResourceSample, RobotId, RobotRecord, RobotStatus};

/// In-memory Robot Registry (C2). Robots are global, not tenant-scoped
/// (a fleet is shared infrastructure serving many tenants' jobs), so
/// `ctx` is accepted for API symmetry with `JobStore` but not used to
/// filter.
pub struct MemoryRobotStore {
    robots: Arc<RwLock<HashMap<RobotId, RobotRecord>>>,
    by_machine: Arc<RwLock<HashMap<String, RobotId>>>,
    bus: Arc<crate::notify::NotificationBus>,
    metrics: Arc<crate::notify::LiveMetrics>,
}

impl MemoryRobotStore {
    pub fn new(bus: Arc<crate::notify::NotificationBus>, metrics: Arc<crate::notify::LiveMetrics>) -> Self {
        Self {
            robots: Arc::new(RwLock::new(HashMap::new())),
            by_machine: Arc::new(RwLock::new(HashMap::new())),
            bus,
            metrics,
        }
    }

    fn emit(&self, kind: crate::types::EventKind, tenant_id: &str, robot_id: &RobotId) {
        let subject_key = format!("robot:{robot_id}");
        let event = crate::types::OrchestratorEvent {
            kind,
            subject_id: crate::types::SubjectId::Robot(robot_id.clone()),
            tenant_id: tenant_id.to_string(),
            old_value: None,
            new_value: None,
            sequence: self.bus.next_sequence(&subject_key),
            at: Utc::now(),
        };
        self.bus.publish(event);
    }
}

#[async_trait]
impl RobotStore for MemoryRobotStore {
    async fn register(
        &self,
        ctx: &RequestCtx,
        machine_id: String,
        name: String,
        capabilities: Vec<String>,
        environment: String,
    ) -> OrchestratorResult<RobotId> {
        let now = Utc::now();

        // Re-registration from the same machine reuses its existing id
        // rather than minting a duplicate robot, matching the policy
        // that robot ids are never reused across *different* machines
        // but a machine's own restart shouldn't fork its identity.
        if let Some(existing_id) = self.by_machine.read().get(&machine_id).cloned() {
            let mut robots = self.robots.write();
            if let Some(record) = robots.get_mut(&existing_id) {
                record.name = name;
                record.capabilities = capabilities;
                record.environment = environment;
                record.status = RobotStatus::Idle;
                record.last_heartbeat = now;
                return Ok(existing_id);
            }
        }

        let robot_id = RobotId::new();
        let record = RobotRecord {
            robot_id: robot_id.clone(),
            machine_id: machine_id.clone(),
            name,
            capabilities,
            environment,
            status: RobotStatus::Idle,
            last_heartbeat: now,
            current_job_id: None,
            resource_sample: None,
            registered_at: now,
        };
        self.robots.write().insert(robot_id.clone(), record);
        self.by_machine.write().insert(machine_id, robot_id.clone());

        self.metrics.incr_robots_registered();
        self.emit(crate::types::EventKind::RobotRegistered, &ctx.tenant_id, &robot_id);
        Ok(robot_id)
    }

    async fn heartbeat(
        &self,
        ctx: &RequestCtx,
        robot_id: &RobotId,
        status: RobotStatus,
        resource_sample: Option<ResourceSample>,
        current_job_id: Option<JobId>,
    ) -> OrchestratorResult<()> {
        let now = Utc::now();
        let was_offline = {
            let robots = self.robots.read();
            let record = robots.get(robot_id).ok_or_else(|| OrchestratorError::NotFound(robot_id.to_string()))?;
            !record.is_alive(now, default_offline_threshold())
        };

        {
            let mut robots = self.robots.write();
            let record = robots.get_mut(robot_id).ok_or_else(|| OrchestratorError::NotFound(robot_id.to_string()))?;
            record.status = status;
            record.last_heartbeat = now;
            record.resource_sample = resource_sample;
            record.current_job_id = current_job_id;
        }

        if was_offline {
            self.emit(crate::types::EventKind::RobotOnline, &ctx.tenant_id, robot_id);
        }
        self.emit(crate::types::EventKind::RobotHeartbeat, &ctx.tenant_id, robot_id);
        Ok(())
    }

    async fn get(&self, _ctx: &RequestCtx, robot_id: &RobotId) -> OrchestratorResult<RobotRecord> {
        self.robots
            .read()
            .get(robot_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::NotFound(robot_id.to_string()))
    }

    async fn list(&self, _ctx: &RequestCtx) -> OrchestratorResult<Vec<RobotRecord>> {
        let mut robots: Vec<RobotRecord> = self.robots.read().values().cloned().collect();
        robots.sort_by(|a, b| a.registered_at.cmp(&b.registered_at));
        Ok(robots)
    }

    async fn is_alive(&self, _ctx: &RequestCtx, robot_id: &RobotId, now: DateTime<Utc>) -> OrchestratorResult<bool> {
        let robots = self.robots.read();
        let record = robots.get(robot_id).ok_or_else(|| OrchestratorError::NotFound(robot_id.to_string()))?;
        Ok(record.is_alive(now, default_offline_threshold()))
    }
}

/// Fallback used where a caller hasn't threaded the configured
/// threshold through (internal liveness checks like the online-flip
/// detection in `heartbeat`). `OrchestratorEngine` uses the configured
/// value from `Config` for all caller-facing liveness reads.
fn default_offline_threshold() -> chrono::Duration {
    chrono::Duration::seconds(90)
}
