use std::sync::Arc;

use orchestrator_core::OrchestratorEngine;

/// Shared application state handed to every handler. Cloning is cheap:
/// it is just an `Arc` bump.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<OrchestratorEngine>,
}

impl AppState {
    pub fn new(engine: Arc<OrchestratorEngine>) -> Self {
        Self { engine }
    }
}
