use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{JobId, RobotId};

/// What the event is about — a job row or a robot row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Job,
    Robot,
}

/// The closed set of event kinds the bus may emit (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    JobCreated,
    JobClaimed,
    JobCompleted,
    JobFailed,
    JobCancelled,
    JobDeadLettered,
    JobRetryScheduled,
    RobotRegistered,
    RobotOnline,
    RobotOffline,
    RobotHeartbeat,
}

impl EventKind {
    pub fn subject_kind(self) -> SubjectKind {
        match self {
            Self::JobCreated
            | Self::JobClaimed
            | Self::JobCompleted
            | Self::JobFailed
            | Self::JobCancelled
            | Self::JobDeadLettered
            | Self::JobRetryScheduled => SubjectKind::Job,
            Self::RobotRegistered | Self::RobotOnline | Self::RobotOffline | Self::RobotHeartbeat => {
                SubjectKind::Robot
            }
        }
    }
}

/// Identifies the row an event is about, independent of subject kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SubjectId {
    Job(JobId),
    Robot(RobotId),
}

/// An immutable record of a status change, fanned out by the
/// Notification Bus. Ordering is per-subject monotonically
/// non-decreasing in `sequence`; cross-subject ordering is not
/// guaranteed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorEvent {
    pub kind: EventKind,
    pub subject_id: SubjectId,
    pub tenant_id: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub sequence: u64,
    pub at: DateTime<Utc>,
}

impl OrchestratorEvent {
    pub fn subject_kind(&self) -> SubjectKind {
        self.kind.subject_kind()
    }
}
