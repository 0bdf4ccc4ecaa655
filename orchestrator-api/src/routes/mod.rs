mod events;
mod jobs;
mod metrics;
mod robots;

use axum::Router;

use crate::state::AppState;

/// Assembles every route group (§4.6: Submitters, Robots, Observers)
/// onto one router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(jobs::router())
        .merge(robots::router())
        .merge(events::router())
        .merge(metrics::router())
}
