//! HTTP request-level contract (§4.6) over `orchestrator-core`: the
//! Submitter, Robot, and Observer audiences each get a route group,
//! all sharing one `AppState` and one set of default layers.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::middleware as axum_middleware;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::AppState;

fn layer_defaults(router: Router<AppState>) -> Router<AppState> {
    router
        .layer(axum_middleware::from_fn(middleware::ensure_request_id))
        .layer(TraceLayer::new_for_http())
}

/// Build the full router: every route group plus the standard layers.
pub fn build_router(state: AppState) -> Router {
    let router = routes::router();
    layer_defaults(router).with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use orchestrator_core::{Config, OrchestratorEngine};
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn router_rejects_missing_tenant_header() {
        let engine = Arc::new(OrchestratorEngine::new(Config::default()));
        let app = build_router(AppState::new(engine));

        let request = axum::http::Request::builder()
            .method("GET")
            .uri("/jobs")
            .body(axum::body::Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn metrics_route_needs_no_tenant() {
        let engine = Arc::new(OrchestratorEngine::new(Config::default()));
        let app = build_router(AppState::new(engine));

        let request = axum::http::Request::builder()
            .method("GET")
            .uri("/metrics")
            .body(axum::body::Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
