use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio_stream::StreamExt;

use crate::error::ApiError;
use crate::middleware::ctx_from_headers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/events", get(stream_events))
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    #[serde(default = "default_min_heartbeat_ms")]
    min_heartbeat_interval_ms: u64,
}

fn default_min_heartbeat_ms() -> u64 {
    1000
}

/// Long-lived SSE subscription (§4.6, `GET /events`): the dashboard-
/// facing stream from the Notification Bus, scoped to the caller's
/// tenant.
async fn stream_events(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    axum::extract::Query(query): axum::extract::Query<EventsQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>>, ApiError> {
    let ctx = ctx_from_headers(&headers)?;
    let raw = state
        .engine
        .bus
        .subscribe_dashboard(ctx.tenant_id, Duration::from_millis(query.min_heartbeat_interval_ms));

    let stream = raw.map(|event| {
        let payload = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().event(event_name(&event)).data(payload))
    });

    Ok(Sse::new(stream))
}

fn event_name(event: &orchestrator_core::OrchestratorEvent) -> &'static str {
    use orchestrator_core::EventKind::*;
    match event.kind {
        JobCreated => "job.created",
        JobClaimed => "job.claimed",
        JobCompleted => "job.completed",
        JobFailed => "job.failed",
        JobCancelled => "job.cancelled",
        JobDeadLettered => "job.dead_lettered",
        JobRetryScheduled => "job.retry_scheduled",
        RobotRegistered => "robot.registered",
        RobotOnline => "robot.online",
        RobotOffline => "robot.offline",
        RobotHeartbeat => "robot.heartbeat",
    }
}
