pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_core::Stream;
use std::pin::Pin;

use crate::error::OrchestratorResult;
use crate::types::{JobId, JobRecord, JobSpec, RequestCtx, RobotId, RobotRecord, RobotStatus};

/// Type alias for boxed streams (stable Rust compatible).
pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send + 'static>>;

/// Pagination/status filter for `list`.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<crate::types::JobStatus>,
    pub environment: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

/// Storage contract for the Queue Engine (C1). A single source of
/// truth — every other component reads or mutates jobs only through
/// these operations.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job in `queued`, or return the prior job id if an
    /// unexpired idempotency key matches the same payload hash.
    async fn submit(&self, ctx: &RequestCtx, spec: JobSpec) -> OrchestratorResult<JobId>;

    /// Atomically claim up to `batch_size` eligible jobs for `robot_id`
    /// in `environment`, applying the required-capability post-select
    /// predicate. See the claim protocol note on `memory::jobs`.
    #[allow(clippy::too_many_arguments)]
    async fn claim(
        &self,
        ctx: &RequestCtx,
        environment: &str,
        robot_id: &RobotId,
        robot_capabilities: &[String],
        batch_size: usize,
        visibility_timeout: chrono::Duration,
    ) -> OrchestratorResult<Vec<JobRecord>>;

    /// Extend `visible_after` by `additional` iff `status = claimed`
    /// and the lease token matches. Returns `(extended, cancel_requested)`.
    async fn extend_lease(
        &self,
        ctx: &RequestCtx,
        job_id: &JobId,
        lease_token: &str,
        additional: chrono::Duration,
    ) -> OrchestratorResult<(bool, bool)>;

    /// `claimed -> completed`, iff the lease matches.
    async fn complete(
        &self,
        ctx: &RequestCtx,
        job_id: &JobId,
        lease_token: &str,
        result: serde_json::Value,
    ) -> OrchestratorResult<()>;

    /// Apply the retry/DLQ decision (§4.4) to a claimed job, iff the
    /// lease matches.
    async fn fail(
        &self,
        ctx: &RequestCtx,
        job_id: &JobId,
        lease_token: &str,
        error: String,
        hint: crate::error::FailureHint,
    ) -> OrchestratorResult<()>;

    /// `queued -> cancelled` immediately; `claimed -> cancel_requested`
    /// cooperatively; no-op on terminal jobs.
    async fn cancel(&self, ctx: &RequestCtx, job_id: &JobId) -> OrchestratorResult<bool>;

    /// Scan for `claimed` jobs whose lease has expired and apply the
    /// retry/DLQ policy to each, as if their holder called `fail`
    /// with a synthetic "visibility timeout" error.
    async fn recover_expired(&self, now: DateTime<Utc>) -> OrchestratorResult<Vec<JobId>>;

    /// Permanently remove terminal jobs older than `max_age`.
    async fn sweep_retention(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> OrchestratorResult<usize>;

    async fn get(&self, ctx: &RequestCtx, job_id: &JobId) -> OrchestratorResult<JobRecord>;
    async fn list(&self, ctx: &RequestCtx, filter: JobFilter) -> OrchestratorResult<Vec<JobRecord>>;
}

/// Storage contract for the Robot Registry (C2).
#[async_trait]
pub trait RobotStore: Send + Sync {
    async fn register(
        &self,
        ctx: &RequestCtx,
        machine_id: String,
        name: String,
        capabilities: Vec<String>,
        environment: String,
    ) -> OrchestratorResult<RobotId>;

    async fn heartbeat(
        &self,
        ctx: &RequestCtx,
        robot_id: &RobotId,
        status: RobotStatus,
        resource_sample: Option<crate::types::ResourceSample>,
        current_job_id: Option<JobId>,
    ) -> OrchestratorResult<()>;

    async fn get(&self, ctx: &RequestCtx, robot_id: &RobotId) -> OrchestratorResult<RobotRecord>;
    async fn list(&self, ctx: &RequestCtx) -> OrchestratorResult<Vec<RobotRecord>>;

    /// Derived liveness predicate (§4.2): `now - last_heartbeat <= offline_threshold`.
    async fn is_alive(&self, ctx: &RequestCtx, robot_id: &RobotId, now: DateTime<Utc>) -> OrchestratorResult<bool>;
}
