use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{JobId, RobotId};

/// Status a robot self-reports on heartbeat. `Offline` is never
/// reported by a robot — it is a read-time derivation from staleness
/// of `last_heartbeat` (see `RobotRecord::is_alive`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotStatus {
    Idle,
    Busy,
    Offline,
    Failed,
}

impl RobotStatus {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Offline => "offline",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RobotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Optional point-in-time resource usage attached to a heartbeat.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceSample {
    pub cpu_percent: f32,
    pub mem_mb: u32,
}

/// A registered worker process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotRecord {
    pub robot_id: RobotId,
    pub machine_id: String,
    pub name: String,
    pub capabilities: Vec<String>,
    pub environment: String,
    pub status: RobotStatus,
    pub last_heartbeat: DateTime<Utc>,
    pub current_job_id: Option<JobId>,
    pub resource_sample: Option<ResourceSample>,
    pub registered_at: DateTime<Utc>,
}

impl RobotRecord {
    /// Derived liveness predicate. Never persisted as authoritative —
    /// a heartbeat arriving after a "cached offline" read reverts to
    /// the reported status with no extra ceremony, because this is
    /// recomputed on every read rather than cached in `status`.
    pub fn is_alive(&self, now: DateTime<Utc>, offline_threshold: chrono::Duration) -> bool {
        now - self.last_heartbeat <= offline_threshold
    }

    /// The status to report to callers, folding in the derived
    /// offline transition over whatever the robot last self-reported.
    pub fn effective_status(&self, now: DateTime<Utc>, offline_threshold: chrono::Duration) -> RobotStatus {
        if !self.is_alive(now, offline_threshold) {
            RobotStatus::Offline
        } else {
            self.status
        }
    }

    /// A robot serves a job requiring capability set `required` iff
    /// `required ⊆ self.capabilities`.
    pub fn satisfies_capabilities(&self, required: &[String]) -> bool {
        required.iter().all(|r| self.capabilities.iter().any(|c| c == r))
    }

    /// A robot in environment `self.environment` serves a job tagged
    /// `job_env` iff either side is the wildcard `"default"` tag or
    /// they match exactly.
    pub fn serves_environment(&self, job_env: &str) -> bool {
        job_env == "default" || self.environment == "default" || self.environment == job_env
    }
}
