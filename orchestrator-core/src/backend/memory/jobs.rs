use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::backend::{JobFilter, JobStore};
use crate::error::{FailureHint, OrchestratorError, OrchestratorResult};
use crate::policy::retry;
use crate::types::{JobId, JobRecord, JobSpec, JobStatus, LeaseToken, RequestCtx, RobotId};

/// Idempotency entries expire after this long regardless of whether
/// the job they point to is still live. Not one of the spec's named
/// environment variables, so it is a fixed constant rather than
/// configurable.
const IDEMPOTENCY_TTL: chrono::Duration = chrono::Duration::hours(24);

struct IdempotencyEntry {
    job_id: JobId,
    payload_hash: [u8; 32],
    expires_at: DateTime<Utc>,
}

/// In-memory implementation of the Queue Engine (C1).
///
/// **Claim protocol.** The spec's two-stage skip-locked claim is
/// simulated with a single critical section over the whole job table:
/// candidates are gathered and sorted by `(priority DESC, created_at
/// ASC, job_id ASC)`, then claimed one at a time with a re-check that
/// the row is still `queued` immediately before the write. The re-check
/// plays the role the "skip-locked" discipline plays in a relational
/// backend — a row already taken by a concurrent claimant (impossible
/// here, since the whole scan-and-claim happens under one write lock,
/// but preserved for the case this backend is later sharded) is
/// skipped rather than blocked on.
pub struct MemoryJobStore {
    pub(crate) jobs: Arc<RwLock<HashMap<JobId, JobRecord>>>,
    idempotency: Arc<RwLock<HashMap<(String, String), IdempotencyEntry>>>,
    pub(crate) bus: Arc<crate::notify::NotificationBus>,
    pub(crate) metrics: Arc<crate::notify::LiveMetrics>,
}

impl MemoryJobStore {
    pub fn new(bus: Arc<crate::notify::NotificationBus>, metrics: Arc<crate::notify::LiveMetrics>) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            idempotency: Arc::new(RwLock::new(HashMap::new())),
            bus,
            metrics,
        }
    }

    fn emit(&self, kind: crate::types::EventKind, tenant_id: &str, job_id: &JobId) {
        let subject_key = format!("job:{job_id}");
        let event = crate::types::OrchestratorEvent {
            kind,
            subject_id: crate::types::SubjectId::Job(job_id.clone()),
            tenant_id: tenant_id.to_string(),
            old_value: None,
            new_value: None,
            sequence: self.bus.next_sequence(&subject_key),
            at: Utc::now(),
        };
        self.bus.publish(event);
    }

    /// Apply the §4.4 retry/DLQ decision to a claimed job whose lease
    /// is gone (either `fail` was called or its lease expired).
    /// Shared by `fail` and `recover_expired`.
    fn apply_retry_decision(&self, record: &mut JobRecord, error: String, hint: FailureHint, now: DateTime<Utc>) -> crate::types::EventKind {
        match retry::decide(record.retry_count, record.max_retries, hint) {
            retry::RetryDecision::Retry { retry_count, backoff } => {
                record.retry_count = retry_count;
                record.status = JobStatus::Queued;
                record.visible_after = now + backoff;
                record.robot_id = None;
                record.lease_token = None;
                record.error_message = Some(error);
                self.metrics.record_tenant_retried(&record.tenant_id);
                crate::types::EventKind::JobRetryScheduled
            }
            retry::RetryDecision::DeadLetter => {
                record.status = JobStatus::DeadLetter;
                record.completed_at = Some(now);
                record.error_message = Some(error);
                record.robot_id = None;
                record.lease_token = None;
                self.metrics.record_tenant_dead_lettered(&record.tenant_id);
                crate::types::EventKind::JobDeadLettered
            }
        }
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn submit(&self, ctx: &RequestCtx, spec: JobSpec) -> OrchestratorResult<JobId> {
        if spec.max_retries.unwrap_or(0) > 1000 {
            return Err(OrchestratorError::InvalidArgument("max_retries unreasonably large".into()));
        }
        let priority = spec.priority.unwrap_or_default();
        let environment = spec.environment.unwrap_or_else(|| "default".to_string());
        let max_retries = spec.max_retries.unwrap_or(3);
        let now = Utc::now();
        let visible_after = now
            + spec
                .scheduled_delay_secs
                .map(chrono::Duration::seconds)
                .unwrap_or_else(chrono::Duration::zero);

        let payload_hash: [u8; 32] = Sha256::digest(&spec.payload).into();

        if let Some(ref key) = spec.idempotency_key {
            let scope = (ctx.tenant_id.clone(), key.as_str().to_string());
            let mut idempotency = self.idempotency.write();
            if let Some(entry) = idempotency.get(&scope) {
                if entry.expires_at > now {
                    if entry.payload_hash != payload_hash {
                        return Err(OrchestratorError::Conflict(
                            "idempotency key reused with a different payload".to_string(),
                        ));
                    }
                    return Ok(entry.job_id.clone());
                }
            }
            let job_id = JobId::new();
            idempotency.insert(
                scope,
                IdempotencyEntry {
                    job_id: job_id.clone(),
                    payload_hash,
                    expires_at: now + IDEMPOTENCY_TTL,
                },
            );
            drop(idempotency);
            self.insert_record(ctx, job_id.clone(), spec, priority, environment, max_retries, visible_after, now, Some(key.clone()));
            return Ok(job_id);
        }

        let job_id = JobId::new();
        self.insert_record(ctx, job_id.clone(), spec, priority, environment, max_retries, visible_after, now, None);
        Ok(job_id)
    }

    async fn claim(
        &self,
        ctx: &RequestCtx,
        environment: &str,
        robot_id: &RobotId,
        robot_capabilities: &[String],
        batch_size: usize,
        visibility_timeout: chrono::Duration,
    ) -> OrchestratorResult<Vec<JobRecord>> {
        if batch_size == 0 {
            return Ok(Vec::new());
        }
        let now = Utc::now();
        let mut jobs = self.jobs.write();

        let mut candidate_ids: Vec<JobId> = jobs
            .values()
            .filter(|r| {
                r.tenant_id == ctx.tenant_id
                    && r.status == JobStatus::Queued
                    && r.visible_after <= now
                    && (environment == "default" || r.environment == "default" || r.environment == environment)
                    && r.required_capabilities.iter().all(|c| robot_capabilities.contains(c))
            })
            .map(|r| r.job_id.clone())
            .collect();

        candidate_ids.sort_by(|a, b| {
            let ra = &jobs[a];
            let rb = &jobs[b];
            rb.priority
                .cmp(&ra.priority)
                .then(ra.created_at.cmp(&rb.created_at))
                .then(ra.job_id.as_str().cmp(rb.job_id.as_str()))
        });
        candidate_ids.truncate(batch_size);

        let mut claimed = Vec::with_capacity(candidate_ids.len());
        for id in &candidate_ids {
            let record = jobs.get_mut(id).expect("candidate collected under the same lock");
            // Skip-locked discipline: re-verify eligibility immediately
            // before the write, in case a prior candidate's claim
            // changed shared state this one depended on.
            if record.status != JobStatus::Queued || record.visible_after > now {
                continue;
            }
            record.status = JobStatus::Claimed;
            record.robot_id = Some(robot_id.clone());
            record.started_at = Some(now);
            record.visible_after = now + visibility_timeout;
            record.lease_token = Some(LeaseToken::new());
            record.cancel_requested = false;
            claimed.push(record.clone());
        }
        drop(jobs);

        for record in &claimed {
            self.metrics.incr_jobs_claimed();
            self.emit(crate::types::EventKind::JobClaimed, &record.tenant_id, &record.job_id);
        }

        Ok(claimed)
    }

    async fn extend_lease(
        &self,
        ctx: &RequestCtx,
        job_id: &JobId,
        lease_token: &str,
        additional: chrono::Duration,
    ) -> OrchestratorResult<(bool, bool)> {
        let now = Utc::now();
        let mut jobs = self.jobs.write();
        let record = jobs.get_mut(job_id).ok_or_else(|| OrchestratorError::NotFound(job_id.to_string()))?;
        check_tenant(record, ctx)?;

        if record.status != JobStatus::Claimed {
            return Ok((false, false));
        }
        match &record.lease_token {
            Some(held) if held.as_str() == lease_token => {}
            _ => return Ok((false, false)),
        }
        if record.visible_after < now {
            return Ok((false, false));
        }

        record.visible_after += additional;
        Ok((true, record.cancel_requested))
    }

    async fn complete(
        &self,
        ctx: &RequestCtx,
        job_id: &JobId,
        lease_token: &str,
        result: serde_json::Value,
    ) -> OrchestratorResult<()> {
        let now = Utc::now();
        let mut jobs = self.jobs.write();
        let record = jobs.get_mut(job_id).ok_or_else(|| OrchestratorError::NotFound(job_id.to_string()))?;
        check_tenant(record, ctx)?;

        if record.status.is_terminal() {
            return Err(OrchestratorError::PreconditionFailed("job already in a terminal state".into()));
        }
        match &record.lease_token {
            Some(held) if held.as_str() == lease_token => {}
            _ => return Err(OrchestratorError::StaleLease),
        }

        record.status = JobStatus::Completed;
        record.result = Some(result);
        record.completed_at = Some(now);
        record.robot_id = None;
        record.lease_token = None;
        let tenant_id = record.tenant_id.clone();
        drop(jobs);

        self.metrics.record_tenant_completed(&tenant_id);
        self.emit(crate::types::EventKind::JobCompleted, &tenant_id, job_id);
        Ok(())
    }

    async fn fail(
        &self,
        ctx: &RequestCtx,
        job_id: &JobId,
        lease_token: &str,
        error: String,
        hint: FailureHint,
    ) -> OrchestratorResult<()> {
        let now = Utc::now();
        let mut jobs = self.jobs.write();
        let record = jobs.get_mut(job_id).ok_or_else(|| OrchestratorError::NotFound(job_id.to_string()))?;
        check_tenant(record, ctx)?;

        if record.status.is_terminal() {
            return Err(OrchestratorError::PreconditionFailed("job already in a terminal state".into()));
        }
        match &record.lease_token {
            Some(held) if held.as_str() == lease_token => {}
            _ => return Err(OrchestratorError::StaleLease),
        }

        let kind = self.apply_retry_decision(record, error, hint, now);
        let tenant_id = record.tenant_id.clone();
        drop(jobs);

        self.emit(kind, &tenant_id, job_id);
        Ok(())
    }

    async fn cancel(&self, ctx: &RequestCtx, job_id: &JobId) -> OrchestratorResult<bool> {
        let now = Utc::now();
        let mut jobs = self.jobs.write();
        let record = jobs.get_mut(job_id).ok_or_else(|| OrchestratorError::NotFound(job_id.to_string()))?;
        check_tenant(record, ctx)?;

        match record.status {
            JobStatus::Queued => {
                record.status = JobStatus::Cancelled;
                record.completed_at = Some(now);
                let tenant_id = record.tenant_id.clone();
                drop(jobs);
                self.metrics.record_tenant_cancelled(&tenant_id);
                self.emit(crate::types::EventKind::JobCancelled, &tenant_id, job_id);
                Ok(true)
            }
            JobStatus::Claimed => {
                // Cooperative: the holder discovers this on its next
                // extend_lease call and must wind down.
                record.cancel_requested = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn recover_expired(&self, now: DateTime<Utc>) -> OrchestratorResult<Vec<JobId>> {
        let mut jobs = self.jobs.write();
        let expired_ids: Vec<JobId> = jobs
            .values()
            .filter(|r| r.lease_expired(now))
            .map(|r| r.job_id.clone())
            .collect();

        let mut recovered = Vec::with_capacity(expired_ids.len());
        for id in &expired_ids {
            let record = jobs.get_mut(id).expect("collected under the same lock");
            if !record.lease_expired(now) {
                continue;
            }
            let kind = self.apply_retry_decision(record, "visibility timeout".to_string(), FailureHint::Retryable, now);
            let tenant_id = record.tenant_id.clone();
            recovered.push((tenant_id, id.clone(), kind));
        }
        drop(jobs);

        for (tenant_id, job_id, kind) in &recovered {
            self.emit(*kind, tenant_id, job_id);
        }
        Ok(recovered.into_iter().map(|(_, id, _)| id).collect())
    }

    async fn sweep_retention(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> OrchestratorResult<usize> {
        let mut jobs = self.jobs.write();
        let to_remove: Vec<JobId> = jobs
            .values()
            .filter(|r| {
                r.status.is_terminal()
                    && r.completed_at.map(|at| now - at > max_age).unwrap_or(false)
            })
            .map(|r| r.job_id.clone())
            .collect();
        for id in &to_remove {
            jobs.remove(id);
        }
        Ok(to_remove.len())
    }

    async fn get(&self, ctx: &RequestCtx, job_id: &JobId) -> OrchestratorResult<JobRecord> {
        let jobs = self.jobs.read();
        let record = jobs.get(job_id).ok_or_else(|| OrchestratorError::NotFound(job_id.to_string()))?;
        check_tenant(record, ctx)?;
        Ok(record.clone())
    }

    async fn list(&self, ctx: &RequestCtx, filter: JobFilter) -> OrchestratorResult<Vec<JobRecord>> {
        let jobs = self.jobs.read();
        let mut matching: Vec<JobRecord> = jobs
            .values()
            .filter(|r| r.tenant_id == ctx.tenant_id)
            .filter(|r| filter.status.map(|s| s == r.status).unwrap_or(true))
            .filter(|r| filter.environment.as_ref().map(|e| *e == r.environment).unwrap_or(true))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let limit = if filter.limit == 0 { matching.len() } else { filter.limit };
        Ok(matching.into_iter().skip(filter.offset).take(limit).collect())
    }
}

fn check_tenant(record: &JobRecord, ctx: &RequestCtx) -> OrchestratorResult<()> {
    if record.tenant_id != ctx.tenant_id {
        return Err(OrchestratorError::NotFound(record.job_id.to_string()));
    }
    Ok(())
}

impl MemoryJobStore {
    #[allow(clippy::too_many_arguments)]
    fn insert_record(
        &self,
        ctx: &RequestCtx,
        job_id: JobId,
        spec: JobSpec,
        priority: crate::types::Priority,
        environment: String,
        max_retries: u32,
        visible_after: DateTime<Utc>,
        now: DateTime<Utc>,
        idempotency_key: Option<crate::types::IdempotencyKey>,
    ) {
        let record = JobRecord {
            job_id: job_id.clone(),
            tenant_id: ctx.tenant_id.clone(),
            workflow_ref: spec.workflow_ref,
            payload: spec.payload,
            environment,
            priority,
            required_capabilities: spec.required_capabilities,
            input: spec.input,
            result: None,
            error_message: None,
            status: JobStatus::Queued,
            retry_count: 0,
            max_retries,
            visible_after,
            created_at: now,
            started_at: None,
            completed_at: None,
            robot_id: None,
            lease_token: None,
            cancel_requested: false,
            idempotency_key,
        };
        self.jobs.write().insert(job_id.clone(), record);
        self.metrics.record_tenant_submitted(&ctx.tenant_id);
        self.emit(crate::types::EventKind::JobCreated, &ctx.tenant_id, &job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;

    fn store() -> MemoryJobStore {
        MemoryJobStore::new(
            Arc::new(crate::notify::NotificationBus::new()),
            Arc::new(crate::notify::LiveMetrics::new()),
        )
    }

    fn ctx() -> RequestCtx {
        RequestCtx::new("tenant_a")
    }

    fn spec(priority: u8) -> JobSpec {
        JobSpec {
            workflow_ref: "wf_1".to_string(),
            payload: b"{}".to_vec(),
            tenant_id: "tenant_a".to_string(),
            environment: Some("default".to_string()),
            priority: Some(Priority::new(priority).unwrap()),
            max_retries: Some(3),
            input: serde_json::json!({}),
            scheduled_delay_secs: None,
            idempotency_key: None,
            required_capabilities: Vec::new(),
        }
    }

    #[tokio::test]
    async fn submit_then_claim_then_complete() {
        let store = store();
        let ctx = ctx();
        let job_id = store.submit(&ctx, spec(5)).await.unwrap();

        let claimed = store
            .claim(&ctx, "default", &RobotId::new(), &[], 1, chrono::Duration::seconds(120))
            .await
            .unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].job_id, job_id);

        let lease = claimed[0].lease_token.clone().unwrap();
        store.complete(&ctx, &job_id, lease.as_str(), serde_json::json!({"output": 42})).await.unwrap();

        let record = store.get(&ctx, &job_id).await.unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.result, Some(serde_json::json!({"output": 42})));
    }

    #[tokio::test]
    async fn claim_preserves_priority_then_fifo() {
        let store = store();
        let ctx = ctx();
        let j1 = store.submit(&ctx, spec(1)).await.unwrap();
        let j2 = store.submit(&ctx, spec(10)).await.unwrap();
        let j3 = store.submit(&ctx, spec(5)).await.unwrap();

        let claimed = store
            .claim(&ctx, "default", &RobotId::new(), &[], 3, chrono::Duration::seconds(120))
            .await
            .unwrap();
        let ids: Vec<_> = claimed.iter().map(|r| r.job_id.clone()).collect();
        assert_eq!(ids, vec![j2, j3, j1]);
    }

    #[tokio::test]
    async fn stale_lease_rejected() {
        let store = store();
        let ctx = ctx();
        let job_id = store.submit(&ctx, spec(5)).await.unwrap();
        let claimed = store
            .claim(&ctx, "default", &RobotId::new(), &[], 1, chrono::Duration::seconds(120))
            .await
            .unwrap();
        let real_lease = claimed[0].lease_token.clone().unwrap();

        let result = store.complete(&ctx, &job_id, "not-the-real-token", serde_json::json!({})).await;
        assert!(matches!(result, Err(OrchestratorError::StaleLease)));

        store.complete(&ctx, &job_id, real_lease.as_str(), serde_json::json!({})).await.unwrap();
    }

    #[tokio::test]
    async fn idempotent_submit_returns_same_job() {
        let store = store();
        let ctx = ctx();
        let mut s = spec(5);
        s.idempotency_key = Some("req-1".into());

        let job_id1 = store.submit(&ctx, s.clone()).await.unwrap();
        let job_id2 = store.submit(&ctx, s).await.unwrap();
        assert_eq!(job_id1, job_id2);
    }

    #[tokio::test]
    async fn idempotency_key_conflict_on_different_payload() {
        let store = store();
        let ctx = ctx();
        let mut s1 = spec(5);
        s1.idempotency_key = Some("req-1".into());
        let mut s2 = spec(5);
        s2.idempotency_key = Some("req-1".into());
        s2.payload = b"{\"different\":true}".to_vec();

        store.submit(&ctx, s1).await.unwrap();
        let result = store.submit(&ctx, s2).await;
        assert!(matches!(result, Err(OrchestratorError::Conflict(_))));
    }

    #[tokio::test]
    async fn cancel_wins_over_extend_lease() {
        let store = store();
        let ctx = ctx();
        let job_id = store.submit(&ctx, spec(5)).await.unwrap();
        let claimed = store
            .claim(&ctx, "default", &RobotId::new(), &[], 1, chrono::Duration::seconds(120))
            .await
            .unwrap();
        let lease = claimed[0].lease_token.clone().unwrap();

        store.cancel(&ctx, &job_id).await.unwrap();
        let (extended, cancel_requested) = store
            .extend_lease(&ctx, &job_id, lease.as_str(), chrono::Duration::seconds(30))
            .await
            .unwrap();
        assert!(extended);
        assert!(cancel_requested);
    }

    #[tokio::test]
    async fn claim_batch_size_zero_returns_empty() {
        let store = store();
        let ctx = ctx();
        store.submit(&ctx, spec(5)).await.unwrap();
        let claimed = store
            .claim(&ctx, "default", &RobotId::new(), &[], 0, chrono::Duration::seconds(120))
            .await
            .unwrap();
        assert!(claimed.is_empty());
    }
}
