use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use orchestrator_core::dispatch::SubmitRequest;
use orchestrator_core::{FailureHint, JobFilter, JobId, JobRecord, JobStatus};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::middleware::ctx_from_headers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs", post(submit).get(list))
        .route("/jobs/claim", post(claim))
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/cancel", post(cancel))
        .route("/jobs/:id/extend", post(extend))
        .route("/jobs/:id/complete", post(complete))
        .route("/jobs/:id/fail", post(fail))
}

#[derive(Debug, Deserialize)]
struct SubmitBody {
    workflow_ref: String,
    payload: String,
    environment: Option<String>,
    priority: Option<u8>,
    max_retries: Option<u32>,
    scheduled_delay_secs: Option<i64>,
    idempotency_key: Option<String>,
    #[serde(default)]
    required_capabilities: Vec<String>,
    #[serde(default)]
    input: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct JobIdBody {
    job_id: JobId,
}

async fn submit(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Json(body): Json<SubmitBody>,
) -> Result<Json<JobIdBody>, ApiError> {
    let ctx = ctx_from_headers(&headers)?;
    let priority = body.priority.map(orchestrator_core::Priority::new).transpose()?;

    let job_id = state
        .engine
        .submit(
            &ctx,
            SubmitRequest {
                workflow_ref: body.workflow_ref,
                payload: body.payload.into_bytes(),
                environment: body.environment,
                priority,
                max_retries: body.max_retries,
                scheduled_delay_secs: body.scheduled_delay_secs,
                idempotency_key: body.idempotency_key.map(Into::into),
                required_capabilities: body.required_capabilities,
                input: body.input,
                workflow_default_environment: None,
                workflow_default_priority: None,
            },
        )
        .await?;

    Ok(Json(JobIdBody { job_id }))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
    environment: Option<String>,
    #[serde(default)]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

async fn list(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<JobRecord>>, ApiError> {
    let ctx = ctx_from_headers(&headers)?;
    let status = query
        .status
        .map(|s| parse_status(&s))
        .transpose()?;

    let records = state
        .engine
        .list_jobs(
            &ctx,
            JobFilter {
                status,
                environment: query.environment,
                limit: query.limit,
                offset: query.offset,
            },
        )
        .await?;
    Ok(Json(records))
}

fn parse_status(raw: &str) -> Result<JobStatus, ApiError> {
    match raw {
        "queued" => Ok(JobStatus::Queued),
        "claimed" => Ok(JobStatus::Claimed),
        "completed" => Ok(JobStatus::Completed),
        "cancelled" => Ok(JobStatus::Cancelled),
        "dead_letter" => Ok(JobStatus::DeadLetter),
        other => Err(orchestrator_core::OrchestratorError::InvalidArgument(format!("unknown status {other}")).into()),
    }
}

async fn get_job(State(state): State<AppState>, headers: axum::http::HeaderMap, Path(id): Path<String>) -> Result<Json<JobRecord>, ApiError> {
    let ctx = ctx_from_headers(&headers)?;
    let record = state.engine.get_job(&ctx, &JobId::from(id)).await?;
    Ok(Json(record))
}

#[derive(Debug, Serialize)]
struct CancelBody {
    cancelled: bool,
}

async fn cancel(State(state): State<AppState>, headers: axum::http::HeaderMap, Path(id): Path<String>) -> Result<Json<CancelBody>, ApiError> {
    let ctx = ctx_from_headers(&headers)?;
    let cancelled = state.engine.cancel(&ctx, &JobId::from(id)).await?;
    Ok(Json(CancelBody { cancelled }))
}

#[derive(Debug, Deserialize)]
struct ClaimBody {
    environment: String,
    robot_id: String,
    #[serde(default = "default_batch_size")]
    batch_size: usize,
}

fn default_batch_size() -> usize {
    1
}

async fn claim(State(state): State<AppState>, headers: axum::http::HeaderMap, Json(body): Json<ClaimBody>) -> Result<Json<Vec<JobRecord>>, ApiError> {
    let ctx = ctx_from_headers(&headers)?;
    let robot_id = orchestrator_core::RobotId::from(body.robot_id);
    let records = state.engine.claim(&ctx, &body.environment, &robot_id, body.batch_size).await?;
    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
struct LeaseBody {
    lease_token: String,
}

#[derive(Debug, Serialize)]
struct ExtendBody {
    extended: bool,
    cancel_requested: bool,
}

async fn extend(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<LeaseBody>,
) -> Result<Json<ExtendBody>, ApiError> {
    let ctx = ctx_from_headers(&headers)?;
    let (extended, cancel_requested) = state.engine.extend_lease(&ctx, &JobId::from(id), &body.lease_token).await?;
    Ok(Json(ExtendBody { extended, cancel_requested }))
}

#[derive(Debug, Deserialize)]
struct CompleteBody {
    lease_token: String,
    #[serde(default)]
    result: serde_json::Value,
}

async fn complete(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<CompleteBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ctx = ctx_from_headers(&headers)?;
    state.engine.complete(&ctx, &JobId::from(id), &body.lease_token, body.result).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
struct FailBody {
    lease_token: String,
    error: String,
    #[serde(default)]
    permanent: bool,
}

async fn fail(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<FailBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ctx = ctx_from_headers(&headers)?;
    let hint = FailureHint::from_permanent_flag(body.permanent);
    state.engine.fail(&ctx, &JobId::from(id), &body.lease_token, body.error, hint).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
