use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tokio_stream::StreamExt;

use orchestrator_core::backend::memory::{MemoryJobStore, MemoryRobotStore};
use orchestrator_core::backend::{JobFilter, JobStore, RobotStore};
use orchestrator_core::error::{FailureHint, OrchestratorError};
use orchestrator_core::notify::{LiveMetrics, NotificationBus};
use orchestrator_core::types::{EventKind, JobSpec, JobStatus, Priority, RequestCtx, RobotId};

fn ctx(tenant: &str) -> RequestCtx {
    RequestCtx::new(tenant)
}

fn spec(priority: u8) -> JobSpec {
    JobSpec {
        workflow_ref: "wf_invoice_ocr".to_string(),
        payload: b"{}".to_vec(),
        tenant_id: "test_tenant".to_string(),
        environment: Some("default".to_string()),
        priority: Some(Priority::new(priority).unwrap()),
        max_retries: Some(3),
        input: serde_json::json!({}),
        scheduled_delay_secs: None,
        idempotency_key: None,
        required_capabilities: Vec::new(),
    }
}

fn store() -> Arc<MemoryJobStore> {
    Arc::new(MemoryJobStore::new(Arc::new(NotificationBus::new()), Arc::new(LiveMetrics::new())))
}

/// A1. Claim leases atomically and the returned record reflects it.
#[tokio::test]
async fn claim_leases_atomically() {
    let store = store();
    let ctx = ctx("test_tenant");
    let job_id = store.submit(&ctx, spec(5)).await.unwrap();

    let claimed = store.claim(&ctx, "default", &RobotId::new(), &[], 1, chrono::Duration::seconds(120)).await.unwrap();
    let leased = &claimed[0];

    assert_eq!(leased.job_id, job_id);
    assert!(leased.lease_token.is_some());
    assert!(leased.visible_after > Utc::now());

    let record = store.get(&ctx, &job_id).await.unwrap();
    assert_eq!(record.status, JobStatus::Claimed);
    assert_eq!(record.lease_token, leased.lease_token);
}

/// A2. Only the lease holder may complete.
#[tokio::test]
async fn only_lease_holder_can_complete() {
    let store = store();
    let ctx = ctx("test_tenant");
    store.submit(&ctx, spec(5)).await.unwrap();
    let claimed = store.claim(&ctx, "default", &RobotId::new(), &[], 1, chrono::Duration::seconds(120)).await.unwrap();
    let job_id = claimed[0].job_id.clone();

    let result = store.complete(&ctx, &job_id, "not-the-real-token", serde_json::json!({})).await;
    assert!(matches!(result, Err(OrchestratorError::StaleLease)));
}

/// A4. A recovered (expired) lease is re-queued with an incremented retry count.
#[tokio::test]
async fn expired_lease_recovers_with_retry_increment() {
    let store = store();
    let ctx = ctx("test_tenant");
    let job_id = store.submit(&ctx, spec(5)).await.unwrap();
    store.claim(&ctx, "default", &RobotId::new(), &[], 1, chrono::Duration::milliseconds(1)).await.unwrap();

    tokio::time::sleep(StdDuration::from_millis(5)).await;
    let recovered = store.recover_expired(Utc::now()).await.unwrap();
    assert_eq!(recovered, vec![job_id.clone()]);

    let record = store.get(&ctx, &job_id).await.unwrap();
    assert_eq!(record.status, JobStatus::Queued);
    assert_eq!(record.retry_count, 1);
    assert!(record.robot_id.is_none());

    // The recovered job is claimable again.
    let reclaimed = store.claim(&ctx, "default", &RobotId::new(), &[], 1, chrono::Duration::seconds(120)).await.unwrap();
    assert_eq!(reclaimed[0].job_id, job_id);
}

/// B1. Completion is a one-way terminal transition.
#[tokio::test]
async fn completion_is_terminal() {
    let store = store();
    let ctx = ctx("test_tenant");
    store.submit(&ctx, spec(5)).await.unwrap();
    let claimed = store.claim(&ctx, "default", &RobotId::new(), &[], 1, chrono::Duration::seconds(120)).await.unwrap();
    let job_id = claimed[0].job_id.clone();
    let lease = claimed[0].lease_token.clone().unwrap();

    store.complete(&ctx, &job_id, lease.as_str(), serde_json::json!({})).await.unwrap();
    let result = store.complete(&ctx, &job_id, lease.as_str(), serde_json::json!({})).await;
    assert!(matches!(result, Err(OrchestratorError::PreconditionFailed(_))));
}

/// C1. Cancel wins over a subsequent complete call once the holder discovers it.
#[tokio::test]
async fn cancel_wins_over_complete() {
    let store = store();
    let ctx = ctx("test_tenant");
    store.submit(&ctx, spec(5)).await.unwrap();
    let claimed = store.claim(&ctx, "default", &RobotId::new(), &[], 1, chrono::Duration::seconds(120)).await.unwrap();
    let job_id = claimed[0].job_id.clone();
    let lease = claimed[0].lease_token.clone().unwrap();

    assert!(store.cancel(&ctx, &job_id).await.unwrap());
    let (extended, cancel_requested) = store.extend_lease(&ctx, &job_id, lease.as_str(), chrono::Duration::seconds(30)).await.unwrap();
    assert!(extended);
    assert!(cancel_requested);
}

/// C2. Cancel on a queued job is immediate.
#[tokio::test]
async fn cancel_on_queued_job_is_immediate() {
    let store = store();
    let ctx = ctx("test_tenant");
    let job_id = store.submit(&ctx, spec(5)).await.unwrap();

    assert!(store.cancel(&ctx, &job_id).await.unwrap());
    let record = store.get(&ctx, &job_id).await.unwrap();
    assert_eq!(record.status, JobStatus::Cancelled);

    // Terminal: no-op on a second cancel.
    assert!(!store.cancel(&ctx, &job_id).await.unwrap());
}

/// D1. A retryable failure schedules a retry with backoff applied to `visible_after`.
#[tokio::test]
async fn retryable_failure_schedules_retry() {
    let store = store();
    let ctx = ctx("test_tenant");
    store.submit(&ctx, spec(5)).await.unwrap();
    let claimed = store.claim(&ctx, "default", &RobotId::new(), &[], 1, chrono::Duration::seconds(120)).await.unwrap();
    let job_id = claimed[0].job_id.clone();
    let lease = claimed[0].lease_token.clone().unwrap();

    store.fail(&ctx, &job_id, lease.as_str(), "transient glitch".into(), FailureHint::Retryable).await.unwrap();

    let record = store.get(&ctx, &job_id).await.unwrap();
    assert_eq!(record.status, JobStatus::Queued);
    assert_eq!(record.retry_count, 1);
    assert!(record.visible_after > Utc::now());

    // Not yet claimable since visible_after is in the future.
    let early_claim = store.claim(&ctx, "default", &RobotId::new(), &[], 1, chrono::Duration::seconds(120)).await.unwrap();
    assert!(early_claim.is_empty());
}

/// D2. A permanent failure always dead-letters, even with retries remaining.
#[tokio::test]
async fn permanent_failure_dead_letters_immediately() {
    let store = store();
    let ctx = ctx("test_tenant");
    store.submit(&ctx, spec(5)).await.unwrap();
    let claimed = store.claim(&ctx, "default", &RobotId::new(), &[], 1, chrono::Duration::seconds(120)).await.unwrap();
    let job_id = claimed[0].job_id.clone();
    let lease = claimed[0].lease_token.clone().unwrap();

    store.fail(&ctx, &job_id, lease.as_str(), "selector invalid".into(), FailureHint::Permanent).await.unwrap();

    let record = store.get(&ctx, &job_id).await.unwrap();
    assert_eq!(record.status, JobStatus::DeadLetter);
    assert_eq!(record.retry_count, 0);
}

/// E1. Idempotency returns the same job id for a repeated submission.
#[tokio::test]
async fn idempotency_returns_same_job_id() {
    let store = store();
    let ctx = ctx("test_tenant");
    let mut s = spec(5);
    s.idempotency_key = Some("test_key".into());

    let job_id1 = store.submit(&ctx, s.clone()).await.unwrap();
    let job_id2 = store.submit(&ctx, s).await.unwrap();
    assert_eq!(job_id1, job_id2);
}

/// E2. Idempotency keys are scoped per tenant.
#[tokio::test]
async fn idempotency_scope_is_per_tenant() {
    let store = store();
    let ctx_a = ctx("test_tenant");
    let ctx_b = ctx("different_tenant");
    let mut s = spec(5);
    s.idempotency_key = Some("same_key".into());

    let job_id1 = store.submit(&ctx_a, s.clone()).await.unwrap();
    let mut s_b = s.clone();
    s_b.tenant_id = "different_tenant".to_string();
    let job_id2 = store.submit(&ctx_b, s_b).await.unwrap();

    assert_ne!(job_id1, job_id2);
}

/// F1. Claim preserves priority, then FIFO within a priority.
#[tokio::test]
async fn priority_then_fifo_ordering() {
    let store = store();
    let ctx = ctx("test_tenant");

    let low = store.submit(&ctx, spec(1)).await.unwrap();
    tokio::time::sleep(StdDuration::from_millis(5)).await;
    let high_first = store.submit(&ctx, spec(15)).await.unwrap();
    tokio::time::sleep(StdDuration::from_millis(5)).await;
    let high_second = store.submit(&ctx, spec(15)).await.unwrap();

    let claimed = store.claim(&ctx, "default", &RobotId::new(), &[], 3, chrono::Duration::seconds(120)).await.unwrap();
    let ids: Vec<_> = claimed.iter().map(|r| r.job_id.clone()).collect();
    assert_eq!(ids, vec![high_first, high_second, low]);
}

/// G1. submit emits a JobCreated event; claim emits JobClaimed.
#[tokio::test]
async fn emits_lifecycle_events_in_order() {
    let bus = Arc::new(NotificationBus::new());
    let metrics = Arc::new(LiveMetrics::new());
    let store = MemoryJobStore::new(bus.clone(), metrics);
    let ctx = ctx("test_tenant");

    let mut events = bus.subscribe_durable();

    let job_id = store.submit(&ctx, spec(5)).await.unwrap();
    let created = tokio::time::timeout(StdDuration::from_secs(1), events.next()).await.unwrap().unwrap();
    assert_eq!(created.kind, EventKind::JobCreated);

    store.claim(&ctx, "default", &RobotId::new(), &[], 1, chrono::Duration::seconds(120)).await.unwrap();
    let claimed = tokio::time::timeout(StdDuration::from_secs(1), events.next()).await.unwrap().unwrap();
    assert_eq!(claimed.kind, EventKind::JobClaimed);
    match claimed.subject_id {
        orchestrator_core::types::SubjectId::Job(id) => assert_eq!(id, job_id),
        _ => panic!("expected a job subject"),
    }
}

/// Robot registry: capability matching excludes unqualified robots from a claim.
#[tokio::test]
async fn claim_respects_required_capabilities() {
    let bus = Arc::new(NotificationBus::new());
    let metrics = Arc::new(LiveMetrics::new());
    let jobs = Arc::new(MemoryJobStore::new(bus.clone(), metrics.clone()));
    let robots = MemoryRobotStore::new(bus, metrics);
    let ctx = ctx("test_tenant");

    let mut needs_ocr = spec(5);
    needs_ocr.required_capabilities = vec!["ocr".to_string()];
    jobs.submit(&ctx, needs_ocr).await.unwrap();

    let plain_robot = robots.register(&ctx, "machine-1".into(), "robot-1".into(), vec![], "default".into()).await.unwrap();
    let claimed = jobs.claim(&ctx, "default", &plain_robot, &[], 1, chrono::Duration::seconds(120)).await.unwrap();
    assert!(claimed.is_empty());

    let ocr_robot = robots
        .register(&ctx, "machine-2".into(), "robot-2".into(), vec!["ocr".to_string()], "default".into())
        .await
        .unwrap();
    let claimed = jobs.claim(&ctx, "default", &ocr_robot, &["ocr".to_string()], 1, chrono::Duration::seconds(120)).await.unwrap();
    assert_eq!(claimed.len(), 1);
}

/// Retention sweep removes only terminal jobs past the configured age.
#[tokio::test]
async fn retention_sweep_removes_only_old_terminal_jobs() {
    let store = store();
    let ctx = ctx("test_tenant");

    let job_id = store.submit(&ctx, spec(5)).await.unwrap();
    let claimed = store.claim(&ctx, "default", &RobotId::new(), &[], 1, chrono::Duration::seconds(120)).await.unwrap();
    let lease = claimed[0].lease_token.clone().unwrap();
    store.complete(&ctx, &job_id, lease.as_str(), serde_json::json!({})).await.unwrap();

    let still_queued = store.submit(&ctx, spec(5)).await.unwrap();

    let removed = store.sweep_retention(Utc::now() + chrono::Duration::days(31), chrono::Duration::days(30)).await.unwrap();
    assert_eq!(removed, 1);

    assert!(store.get(&ctx, &job_id).await.is_err());
    assert!(store.get(&ctx, &still_queued).await.is_ok());
}

/// list() filters by status and scopes to the caller's tenant.
#[tokio::test]
async fn list_filters_by_status_and_tenant() {
    let store = store();
    let ctx_a = ctx("test_tenant");
    let ctx_b = ctx("different_tenant");

    store.submit(&ctx_a, spec(5)).await.unwrap();
    let mut other_tenant_spec = spec(5);
    other_tenant_spec.tenant_id = "different_tenant".to_string();
    store.submit(&ctx_b, other_tenant_spec).await.unwrap();

    let tenant_a_jobs = store.list(&ctx_a, JobFilter { status: Some(JobStatus::Queued), ..Default::default() }).await.unwrap();
    assert_eq!(tenant_a_jobs.len(), 1);
}
