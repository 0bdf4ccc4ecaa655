use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{IdempotencyKey, JobId, LeaseToken, Priority, RobotId};

/// Job lifecycle status. `Failed` is deliberately absent: a `fail` call
/// is a transition, not a resting state — it always resolves
/// immediately into either `Queued` (retry) or `DeadLetter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Claimed,
    Completed,
    Cancelled,
    DeadLetter,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::DeadLetter)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Claimed => "claimed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::DeadLetter => "dead_letter",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Specification a submitter hands to the Dispatcher. Everything here
/// except `workflow_ref`/`payload` may be left unset and resolved by
/// dispatch policy (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub workflow_ref: String,
    pub payload: Vec<u8>,
    pub tenant_id: String,
    pub environment: Option<String>,
    pub priority: Option<Priority>,
    pub max_retries: Option<u32>,
    pub input: Value,
    pub scheduled_delay_secs: Option<i64>,
    pub idempotency_key: Option<IdempotencyKey>,
    pub required_capabilities: Vec<String>,
}

/// The durable row. Mutated only through Queue Engine transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub tenant_id: String,
    pub workflow_ref: String,
    pub payload: Vec<u8>,
    pub environment: String,
    pub priority: Priority,
    pub required_capabilities: Vec<String>,
    pub input: Value,
    pub result: Option<Value>,
    pub error_message: Option<String>,
    pub status: JobStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub visible_after: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub robot_id: Option<RobotId>,
    pub lease_token: Option<LeaseToken>,
    /// Set when a `cancel` arrives while the job is `claimed`. The
    /// holder discovers this on its next `extend_lease` call.
    pub cancel_requested: bool,
    pub idempotency_key: Option<IdempotencyKey>,
}

impl JobRecord {
    pub fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Claimed && self.visible_after < now
    }
}
