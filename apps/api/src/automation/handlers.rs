use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::automation::store::AutomationView;
use crate::errors::AppError;
use crate::models::application::{ApplicationRow, ApplicationStatus, StatusEventRow};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProvideFieldsRequest {
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct AutomationAccepted {
    pub application_id: Uuid,
    pub status: ApplicationStatus,
}

/// POST /api/v1/applications/:id/automation
pub async fn handle_start_automation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<AutomationAccepted>), AppError> {
    let row = load(&state, id).await?;
    let status = require_status(&row, ApplicationStatus::PendingAutomation)?;

    state.engine.start(id);
    info!("Automation scheduled for application {id}");
    Ok((
        StatusCode::ACCEPTED,
        Json(AutomationAccepted {
            application_id: id,
            status,
        }),
    ))
}

/// POST /api/v1/applications/:id/provide-fields
pub async fn handle_provide_fields(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ProvideFieldsRequest>,
) -> Result<(StatusCode, Json<AutomationAccepted>), AppError> {
    if req.fields.values().all(|v| v.trim().is_empty()) {
        return Err(AppError::Validation(
            "fields must contain at least one non-empty value".to_string(),
        ));
    }

    let row = load(&state, id).await?;
    let status = require_status(&row, ApplicationStatus::UserInputNeeded)?;

    info!(
        "Resume scheduled for application {id} with fields {:?}",
        req.fields.keys().collect::<Vec<_>>()
    );
    state.engine.start_resume(id, req.fields);
    Ok((
        StatusCode::ACCEPTED,
        Json(AutomationAccepted {
            application_id: id,
            status,
        }),
    ))
}

/// GET /api/v1/applications/:id/automation
pub async fn handle_get_automation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AutomationView>, AppError> {
    let row = load(&state, id).await?;
    Ok(Json(AutomationView::from_row(&row)?))
}

/// GET /api/v1/applications/:id/events
pub async fn handle_get_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<StatusEventRow>>, AppError> {
    load(&state, id).await?;
    Ok(Json(state.store.status_events(id).await?))
}

async fn load(state: &AppState, id: Uuid) -> Result<ApplicationRow, AppError> {
    state
        .store
        .load_application(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))
}

fn require_status(
    row: &ApplicationRow,
    expected: ApplicationStatus,
) -> Result<ApplicationStatus, AppError> {
    let status = row.parsed_status()?;
    if status != expected {
        return Err(AppError::Conflict(format!(
            "Application {} is {status}, expected {expected}",
            row.id
        )));
    }
    Ok(status)
}
