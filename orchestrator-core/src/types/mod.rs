pub mod ctx;
pub mod event;
pub mod ids;
pub mod job;
pub mod priority;
pub mod robot;

pub use ctx::RequestCtx;
pub use event::{EventKind, OrchestratorEvent, SubjectId, SubjectKind};
pub use ids::{IdempotencyKey, JobId, LeaseToken, RobotId};
pub use job::{JobRecord, JobSpec, JobStatus};
pub use priority::Priority;
pub use robot::{ResourceSample, RobotRecord, RobotStatus};
