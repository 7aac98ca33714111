pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::automation::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Automation API
        .route(
            "/api/v1/applications/:id/automation",
            post(handlers::handle_start_automation).get(handlers::handle_get_automation),
        )
        .route(
            "/api/v1/applications/:id/provide-fields",
            post(handlers::handle_provide_fields),
        )
        .route(
            "/api/v1/applications/:id/events",
            get(handlers::handle_get_events),
        )
        .with_state(state)
}
