use axum::extract::{Path, State};
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::middleware::ctx_from_headers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/robots", post(register).get(list))
        .route("/robots/:id/heartbeat", post(heartbeat))
}

#[derive(Debug, Deserialize)]
struct RegisterBody {
    machine_id: String,
    name: String,
    #[serde(default)]
    capabilities: Vec<String>,
    #[serde(default = "default_environment")]
    environment: String,
}

fn default_environment() -> String {
    "default".to_string()
}

#[derive(Debug, Serialize)]
struct RobotIdBody {
    robot_id: orchestrator_core::RobotId,
}

async fn register(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    axum::Json(body): axum::Json<RegisterBody>,
) -> Result<axum::Json<RobotIdBody>, ApiError> {
    let ctx = ctx_from_headers(&headers)?;
    let robot_id = state
        .engine
        .register_robot(&ctx, body.machine_id, body.name, body.capabilities, body.environment)
        .await?;
    Ok(axum::Json(RobotIdBody { robot_id }))
}

async fn list(State(state): State<AppState>, headers: axum::http::HeaderMap) -> Result<axum::Json<Vec<orchestrator_core::RobotRecord>>, ApiError> {
    let ctx = ctx_from_headers(&headers)?;
    let robots = state.engine.list_robots(&ctx).await?;
    Ok(axum::Json(robots))
}

#[derive(Debug, Deserialize)]
struct HeartbeatBody {
    status: String,
    resource_sample: Option<orchestrator_core::ResourceSample>,
    current_job_id: Option<String>,
}

async fn heartbeat(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Path(id): Path<String>,
    axum::Json(body): axum::Json<HeartbeatBody>,
) -> Result<axum::Json<serde_json::Value>, ApiError> {
    let ctx = ctx_from_headers(&headers)?;
    let status = parse_status(&body.status)?;
    let robot_id = orchestrator_core::RobotId::from(id);
    state
        .engine
        .heartbeat(
            &ctx,
            &robot_id,
            status,
            body.resource_sample,
            body.current_job_id.map(orchestrator_core::JobId::from),
        )
        .await?;
    Ok(axum::Json(serde_json::json!({ "ok": true })))
}

fn parse_status(raw: &str) -> Result<orchestrator_core::RobotStatus, ApiError> {
    use orchestrator_core::RobotStatus;
    match raw {
        "idle" => Ok(RobotStatus::Idle),
        "busy" => Ok(RobotStatus::Busy),
        "offline" => Ok(RobotStatus::Offline),
        "failed" => Ok(RobotStatus::Failed),
        other => Err(orchestrator_core::OrchestratorError::InvalidArgument(format!("unknown robot status {other}")).into()),
    }
}
