use std::sync::Arc;

use crate::automation::orchestrator::Orchestrator;
use crate::automation::store::ApplicationStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ApplicationStore>,
    /// Schedules automation runs as background tasks.
    pub engine: Arc<Orchestrator>,
}
