use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics))
}

/// `GET /metrics` (§4.6, Observer audience): a snapshot of the live
/// counters, no auth beyond the usual tenant header.
async fn metrics(State(state): State<AppState>) -> Json<orchestrator_core::MetricsSnapshot> {
    Json(state.engine.metrics_snapshot())
}
