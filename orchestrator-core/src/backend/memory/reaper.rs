use std::sync::Arc;
use std::time::Duration as StdDuration;

use tracing::{debug, warn};

use super::MemoryJobStore;

/// Two independent background loops the engine owns alongside the
/// in-memory backend: lease recovery (finds expired claims and applies
/// the retry/DLQ policy to them, §4.4) and retention sweeping (drops
/// old terminal rows so the in-memory table doesn't grow unbounded,
/// per the ambient retention requirement this backend otherwise has no
/// way to honor).
pub struct Reaper {
    jobs: Arc<MemoryJobStore>,
    recovery_interval: StdDuration,
    retention_interval: StdDuration,
    retention_max_age: chrono::Duration,
}

impl Reaper {
    pub fn new(
        jobs: Arc<MemoryJobStore>,
        recovery_interval: StdDuration,
        retention_interval: StdDuration,
        retention_max_age: chrono::Duration,
    ) -> Self {
        Self {
            jobs,
            recovery_interval,
            retention_interval,
            retention_max_age,
        }
    }

    /// Spawn both loops, returning their handles so callers can await
    /// or abort them (e.g. on graceful shutdown).
    pub fn spawn(self) -> (tokio::task::JoinHandle<()>, tokio::task::JoinHandle<()>) {
        let recovery_jobs = self.jobs.clone();
        let recovery_interval = self.recovery_interval;
        let recovery = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(recovery_interval);
            loop {
                ticker.tick().await;
                let now = chrono::Utc::now();
                match recovery_jobs.recover_expired(now).await {
                    Ok(recovered) if !recovered.is_empty() => {
                        debug!(count = recovered.len(), "recovered expired leases");
                    }
                    Ok(_) => {}
                    Err(err) => warn!(%err, "lease recovery sweep failed"),
                }
            }
        });

        let retention_jobs = self.jobs.clone();
        let retention_interval = self.retention_interval;
        let retention_max_age = self.retention_max_age;
        let retention = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(retention_interval);
            loop {
                ticker.tick().await;
                let now = chrono::Utc::now();
                match retention_jobs.sweep_retention(now, retention_max_age).await {
                    Ok(removed) if removed > 0 => {
                        debug!(count = removed, "swept terminal jobs past retention");
                    }
                    Ok(_) => {}
                    Err(err) => warn!(%err, "retention sweep failed"),
                }
            }
        });

        (recovery, retention)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::JobStore;
    use crate::types::{JobSpec, Priority, RequestCtx, RobotId};

    #[tokio::test]
    async fn recovery_loop_reclaims_expired_lease() {
        let bus = Arc::new(crate::notify::NotificationBus::new());
        let metrics = Arc::new(crate::notify::LiveMetrics::new());
        let store = Arc::new(MemoryJobStore::new(bus, metrics));
        let ctx = RequestCtx::new("tenant_a");

        let job_id = store
            .submit(
                &ctx,
                JobSpec {
                    workflow_ref: "wf_1".into(),
                    payload: b"{}".to_vec(),
                    tenant_id: "tenant_a".into(),
                    environment: Some("default".into()),
                    priority: Some(Priority::normal()),
                    max_retries: Some(3),
                    input: serde_json::json!({}),
                    scheduled_delay_secs: None,
                    idempotency_key: None,
                    required_capabilities: vec![],
                },
            )
            .await
            .unwrap();

        store
            .claim(&ctx, "default", &RobotId::new(), &[], 1, chrono::Duration::milliseconds(1))
            .await
            .unwrap();

        tokio::time::sleep(StdDuration::from_millis(5)).await;

        let reaper = Reaper::new(
            store.clone(),
            StdDuration::from_millis(5),
            StdDuration::from_secs(3600),
            chrono::Duration::days(30),
        );
        let (recovery, _retention) = reaper.spawn();
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        recovery.abort();

        let record = store.get(&ctx, &job_id).await.unwrap();
        assert_eq!(record.status, crate::types::JobStatus::Queued);
        assert_eq!(record.retry_count, 1);
    }
}
