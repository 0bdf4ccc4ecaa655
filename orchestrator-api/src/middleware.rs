use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use orchestrator_core::{OrchestratorError, RequestCtx};
use uuid::Uuid;

const TENANT_HEADER: &str = "x-tenant-id";
const REQUEST_ID_HEADER: &str = "x-request-id";
const TRACE_ID_HEADER: &str = "x-trace-id";

/// Every call carries a tenant id and a request id (§4.6). The request
/// id is generated when the caller omits one and echoed back on the
/// response so it always appears in both the request and its trace.
pub async fn ensure_request_id(req: Request<Body>, next: Next) -> Response {
    let header = HeaderName::from_static(REQUEST_ID_HEADER);
    let mut req = req;
    let request_id = req
        .headers()
        .get(&header)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert(header.clone(), value);
    }

    let mut res = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        res.headers_mut().insert(header, value);
    }
    res
}

/// Build a `RequestCtx` from the tenant/request/trace headers a caller
/// sends. Missing tenant id is an `invalid_argument` — tenancy
/// enforcement beyond carrying the identifier through is out of scope
/// here, but a request with no tenant at all is simply malformed.
pub fn ctx_from_headers(headers: &HeaderMap) -> Result<RequestCtx, OrchestratorError> {
    let tenant_id = headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| OrchestratorError::InvalidArgument(format!("missing {TENANT_HEADER} header")))?;

    let mut ctx = RequestCtx::new(tenant_id);
    if let Some(request_id) = headers.get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()) {
        ctx = ctx.with_request_id(request_id);
    }
    if let Some(trace_id) = headers.get(TRACE_ID_HEADER).and_then(|v| v.to_str().ok()) {
        ctx = ctx.with_trace_id(trace_id);
    }
    Ok(ctx)
}
