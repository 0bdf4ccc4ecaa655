use std::sync::Arc;

use chrono::Duration;

use crate::backend::memory::reaper::Reaper;
use crate::backend::memory::{MemoryJobStore, MemoryRobotStore};
use crate::backend::{JobFilter, JobStore, RobotStore};
use crate::config::Config;
use crate::dispatch::{Dispatcher, SubmitRequest};
use crate::error::{FailureHint, OrchestratorResult};
use crate::notify::{LiveMetrics, MetricsSnapshot, NotificationBus};
use crate::types::{JobId, JobRecord, RequestCtx, ResourceSample, RobotId, RobotRecord, RobotStatus};
use crate::workflow::WorkflowDocument;

#[async_trait::async_trait]
impl JobStore for Arc<MemoryJobStore> {
    async fn submit(&self, ctx: &RequestCtx, spec: crate::types::JobSpec) -> OrchestratorResult<JobId> {
        (**self).submit(ctx, spec).await
    }

    async fn claim(
        &self,
        ctx: &RequestCtx,
        environment: &str,
        robot_id: &RobotId,
        robot_capabilities: &[String],
        batch_size: usize,
        visibility_timeout: Duration,
    ) -> OrchestratorResult<Vec<JobRecord>> {
        (**self).claim(ctx, environment, robot_id, robot_capabilities, batch_size, visibility_timeout).await
    }

    async fn extend_lease(
        &self,
        ctx: &RequestCtx,
        job_id: &JobId,
        lease_token: &str,
        additional: Duration,
    ) -> OrchestratorResult<(bool, bool)> {
        (**self).extend_lease(ctx, job_id, lease_token, additional).await
    }

    async fn complete(&self, ctx: &RequestCtx, job_id: &JobId, lease_token: &str, result: serde_json::Value) -> OrchestratorResult<()> {
        (**self).complete(ctx, job_id, lease_token, result).await
    }

    async fn fail(&self, ctx: &RequestCtx, job_id: &JobId, lease_token: &str, error: String, hint: FailureHint) -> OrchestratorResult<()> {
        (**self).fail(ctx, job_id, lease_token, error, hint).await
    }

    async fn cancel(&self, ctx: &RequestCtx, job_id: &JobId) -> OrchestratorResult<bool> {
        (**self).cancel(ctx, job_id).await
    }

    async fn recover_expired(&self, now: chrono::DateTime<chrono::Utc>) -> OrchestratorResult<Vec<JobId>> {
        (**self).recover_expired(now).await
    }

    async fn sweep_retention(&self, now: chrono::DateTime<chrono::Utc>, max_age: Duration) -> OrchestratorResult<usize> {
        (**self).sweep_retention(now, max_age).await
    }

    async fn get(&self, ctx: &RequestCtx, job_id: &JobId) -> OrchestratorResult<JobRecord> {
        (**self).get(ctx, job_id).await
    }

    async fn list(&self, ctx: &RequestCtx, filter: JobFilter) -> OrchestratorResult<Vec<JobRecord>> {
        (**self).list(ctx, filter).await
    }
}

/// The facade a C6 API surface is built over: wires the Queue Engine,
/// Robot Registry, Dispatcher, and Notification Bus together and owns
/// the two background loops (lease recovery, retention sweep).
///
/// The bus is deliberately not owned by the backend itself — backend
/// trait methods return data, and `OrchestratorEngine` publishes to
/// `NotificationBus` once a mutation is durable. This keeps the Queue
/// Engine a plain state machine and the Notification Bus a separable
/// fan-out stage, matching their independent listing as components.
pub struct OrchestratorEngine {
    jobs: Arc<MemoryJobStore>,
    robots: Arc<MemoryRobotStore>,
    dispatcher: Dispatcher<Arc<MemoryJobStore>>,
    pub bus: Arc<NotificationBus>,
    pub metrics: Arc<LiveMetrics>,
    config: Config,
    _recovery_handle: tokio::task::JoinHandle<()>,
    _retention_handle: tokio::task::JoinHandle<()>,
}

impl OrchestratorEngine {
    pub fn new(config: Config) -> Self {
        let bus = Arc::new(NotificationBus::new());
        let metrics = Arc::new(LiveMetrics::new());
        let jobs = Arc::new(MemoryJobStore::new(bus.clone(), metrics.clone()));
        let robots = Arc::new(MemoryRobotStore::new(bus.clone(), metrics.clone()));

        let reaper = Reaper::new(
            jobs.clone(),
            config.recovery_interval,
            std::time::Duration::from_secs(24 * 3600),
            Duration::days(config.retention_days),
        );
        let (recovery_handle, retention_handle) = reaper.spawn();

        let dispatcher = Dispatcher::new(jobs.clone()).with_defaults(crate::dispatch::DispatchDefaults {
            environment: "default".to_string(),
            max_retries: config.max_retries_default,
        });

        Self {
            jobs,
            robots,
            dispatcher,
            bus,
            metrics,
            config,
            _recovery_handle: recovery_handle,
            _retention_handle: retention_handle,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Submit a job. Documents submitted with a `workflow_ref` of the
    /// form `inline:*` carry their workflow body in `payload` and are
    /// structurally validated (§6) before being handed to the
    /// Dispatcher; all other references point at a workflow already
    /// known (and validated) to the external workflow store.
    pub async fn submit(&self, ctx: &RequestCtx, request: SubmitRequest) -> OrchestratorResult<JobId> {
        if request.workflow_ref.starts_with("inline:") {
            let doc = WorkflowDocument::parse(&request.payload)?;
            doc.validate()?;
        }
        self.dispatcher.submit(ctx, request).await
    }

    pub async fn claim(&self, ctx: &RequestCtx, environment: &str, robot_id: &RobotId, batch_size: usize) -> OrchestratorResult<Vec<JobRecord>> {
        let robot = self.robots.get(ctx, robot_id).await?;
        self.jobs
            .claim(ctx, environment, robot_id, &robot.capabilities, batch_size, self.config.visibility_timeout)
            .await
    }

    pub async fn extend_lease(&self, ctx: &RequestCtx, job_id: &JobId, lease_token: &str) -> OrchestratorResult<(bool, bool)> {
        self.jobs.extend_lease(ctx, job_id, lease_token, self.config.visibility_timeout).await
    }

    pub async fn complete(&self, ctx: &RequestCtx, job_id: &JobId, lease_token: &str, result: serde_json::Value) -> OrchestratorResult<()> {
        self.jobs.complete(ctx, job_id, lease_token, result).await
    }

    pub async fn fail(&self, ctx: &RequestCtx, job_id: &JobId, lease_token: &str, error: String, hint: FailureHint) -> OrchestratorResult<()> {
        self.jobs.fail(ctx, job_id, lease_token, error, hint).await
    }

    pub async fn cancel(&self, ctx: &RequestCtx, job_id: &JobId) -> OrchestratorResult<bool> {
        self.jobs.cancel(ctx, job_id).await
    }

    pub async fn get_job(&self, ctx: &RequestCtx, job_id: &JobId) -> OrchestratorResult<JobRecord> {
        self.jobs.get(ctx, job_id).await
    }

    pub async fn list_jobs(&self, ctx: &RequestCtx, filter: JobFilter) -> OrchestratorResult<Vec<JobRecord>> {
        self.jobs.list(ctx, filter).await
    }

    pub async fn register_robot(
        &self,
        ctx: &RequestCtx,
        machine_id: String,
        name: String,
        capabilities: Vec<String>,
        environment: String,
    ) -> OrchestratorResult<RobotId> {
        self.robots.register(ctx, machine_id, name, capabilities, environment).await
    }

    pub async fn heartbeat(
        &self,
        ctx: &RequestCtx,
        robot_id: &RobotId,
        status: RobotStatus,
        resource_sample: Option<ResourceSample>,
        current_job_id: Option<JobId>,
    ) -> OrchestratorResult<()> {
        self.robots.heartbeat(ctx, robot_id, status, resource_sample, current_job_id).await
    }

    pub async fn get_robot(&self, ctx: &RequestCtx, robot_id: &RobotId) -> OrchestratorResult<RobotRecord> {
        self.robots.get(ctx, robot_id).await
    }

    pub async fn list_robots(&self, ctx: &RequestCtx) -> OrchestratorResult<Vec<RobotRecord>> {
        self.robots.list(ctx).await
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl Drop for OrchestratorEngine {
    fn drop(&mut self) {
        self._recovery_handle.abort();
        self._retention_handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;

    #[tokio::test]
    async fn submit_claim_complete_round_trip() {
        let engine = OrchestratorEngine::new(Config::from_env());
        let ctx = RequestCtx::new("tenant_a");

        let robot_id = engine
            .register_robot(&ctx, "machine-1".into(), "robot-1".into(), vec![], "default".into())
            .await
            .unwrap();

        let job_id = engine
            .submit(
                &ctx,
                SubmitRequest {
                    workflow_ref: "wf_1".into(),
                    payload: b"{}".to_vec(),
                    priority: Some(Priority::new(10).unwrap()),
                    input: serde_json::json!({}),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let claimed = engine.claim(&ctx, "default", &robot_id, 1).await.unwrap();
        assert_eq!(claimed[0].job_id, job_id);

        let lease = claimed[0].lease_token.clone().unwrap();
        engine.complete(&ctx, &job_id, lease.as_str(), serde_json::json!({"ok": true})).await.unwrap();

        let record = engine.get_job(&ctx, &job_id).await.unwrap();
        assert_eq!(record.status, crate::types::JobStatus::Completed);

        let snapshot = engine.metrics_snapshot();
        assert_eq!(snapshot.jobs_submitted, 1);
        assert_eq!(snapshot.jobs_completed, 1);
    }

    #[tokio::test]
    async fn inline_workflow_payload_is_structurally_validated() {
        let engine = OrchestratorEngine::new(Config::from_env());
        let ctx = RequestCtx::new("tenant_a");

        let bad_doc = serde_json::json!({
            "nodes": [{"id": "n1", "type": "Action", "position": {}, "config": {}}],
            "connections": []
        });

        let result = engine
            .submit(
                &ctx,
                SubmitRequest {
                    workflow_ref: "inline:ad-hoc".into(),
                    payload: serde_json::to_vec(&bad_doc).unwrap(),
                    input: serde_json::json!({}),
                    ..Default::default()
                },
            )
            .await;
        assert!(result.is_err());
    }
}
