use crate::backend::JobStore;
use crate::error::OrchestratorResult;
use crate::types::{IdempotencyKey, JobId, JobSpec, Priority, RequestCtx};

/// Input to the Dispatcher (C3): what a submitter actually supplies,
/// before policy fills in the rest.
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub workflow_ref: String,
    pub payload: Vec<u8>,
    pub environment: Option<String>,
    pub priority: Option<Priority>,
    pub max_retries: Option<u32>,
    pub scheduled_delay_secs: Option<i64>,
    pub idempotency_key: Option<IdempotencyKey>,
    pub required_capabilities: Vec<String>,
    pub input: serde_json::Value,
    /// Environment/priority defaults declared by the referenced
    /// workflow itself, consulted only when the request leaves the
    /// corresponding field unset.
    pub workflow_default_environment: Option<String>,
    pub workflow_default_priority: Option<Priority>,
}

/// Policy-side defaults the Dispatcher falls back to once neither the
/// request nor the workflow supplies a value.
#[derive(Debug, Clone)]
pub struct DispatchDefaults {
    pub environment: String,
    pub max_retries: u32,
}

impl Default for DispatchDefaults {
    fn default() -> Self {
        Self {
            environment: "default".to_string(),
            max_retries: 3,
        }
    }
}

/// Translates a submission request into a correctly routed queued job
/// (§4.3). A thin layer: its value is in the resolution order below,
/// not in any mechanism of its own — persistence is delegated straight
/// through to the Queue Engine's `submit`.
pub struct Dispatcher<S: JobStore> {
    store: S,
    defaults: DispatchDefaults,
}

impl<S: JobStore> Dispatcher<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            defaults: DispatchDefaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: DispatchDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Apply the five dispatch decisions in order, then submit.
    /// Returns as soon as the job is durable — it never waits on or
    /// knows about the workflow's eventual execution.
    pub async fn submit(&self, ctx: &RequestCtx, request: SubmitRequest) -> OrchestratorResult<JobId> {
        let environment = request
            .environment
            .or(request.workflow_default_environment)
            .unwrap_or_else(|| self.defaults.environment.clone());

        let priority = request
            .priority
            .or(request.workflow_default_priority)
            .unwrap_or_default();

        let max_retries = request.max_retries.unwrap_or(self.defaults.max_retries);

        let spec = JobSpec {
            workflow_ref: request.workflow_ref,
            payload: request.payload,
            tenant_id: ctx.tenant_id.clone(),
            environment: Some(environment),
            priority: Some(priority),
            max_retries: Some(max_retries),
            input: request.input,
            scheduled_delay_secs: request.scheduled_delay_secs,
            idempotency_key: request.idempotency_key,
            required_capabilities: request.required_capabilities,
        };

        self.store.submit(ctx, spec).await
    }
}
