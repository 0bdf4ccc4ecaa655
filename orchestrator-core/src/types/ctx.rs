use serde::{Deserialize, Serialize};

/// Per-request context carried through every operation: tenant scoping
/// plus the tracing identifiers that get echoed back and propagated
/// into emitted events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestCtx {
    pub tenant_id: String,
    pub request_id: Option<String>,
    pub trace_id: Option<String>,
}

impl RequestCtx {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            request_id: None,
            trace_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}
