//! HTTP handlers for costing records

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{validate_costing_input, CostingInput, Pagination},
    services::costing::{apply_target_changes, CostingRecord, CostingView, UpsertCostingInput},
    AppState,
};

/// Create a costing record
pub async fn create_costing(
    State(state): State<AppState>,
    Json(input): Json<UpsertCostingInput>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let record = state.costing_service().create(input).await?;
    Ok((StatusCode::CREATED, Json(CostingView::new(record, false))))
}

/// List costing records
pub async fn list_costings(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> AppResult<impl IntoResponse> {
    let records = state.costing_service().list(&pagination).await?;
    Ok(Json(records))
}

/// Get a costing record with its calculation, including any unsaved draft
pub async fn get_costing(
    State(state): State<AppState>,
    Path(costing_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let record = state.costing_service().get(costing_id).await?;
    Ok(Json(current_view(&state, record).await))
}

/// Replace a costing record's inputs and persist them immediately
pub async fn update_costing(
    State(state): State<AppState>,
    Path(costing_id): Path<Uuid>,
    Json(mut input): Json<UpsertCostingInput>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let service = state.costing_service();

    let stored = service.get(costing_id).await?;
    let previous = previous_input(&state, costing_id, stored).await;
    apply_target_changes(&previous, &mut input.input);

    // drop the draft first so no autosave lands after the replacement
    state.autosaver.discard(costing_id).await;
    let record = service.update(costing_id, &input).await?;
    Ok(Json(CostingView::new(record, false)))
}

/// Stage an edit for autosave and return its recalculation right away
pub async fn save_draft(
    State(state): State<AppState>,
    Path(costing_id): Path<Uuid>,
    Json(mut draft): Json<UpsertCostingInput>,
) -> AppResult<impl IntoResponse> {
    draft.validate()?;

    let stored = state.costing_service().get(costing_id).await?;
    let previous = previous_input(&state, costing_id, stored.clone()).await;
    if apply_target_changes(&previous, &mut draft.input) {
        tracing::debug!(costing_id = %costing_id, "Product targets redistributed");
    }

    state.autosaver.stage(costing_id, draft.clone()).await;
    let view = CostingView::new(stored.with_draft(draft), true);
    Ok((StatusCode::ACCEPTED, Json(view)))
}

/// Persist a pending draft now
pub async fn flush_costing(
    State(state): State<AppState>,
    Path(costing_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let flushed = state.autosaver.flush(costing_id).await?;
    if !flushed {
        tracing::debug!(costing_id = %costing_id, "No pending draft to flush");
    }

    let record = state.costing_service().get(costing_id).await?;
    Ok(Json(current_view(&state, record).await))
}

/// Delete a costing record and any pending draft
pub async fn delete_costing(
    State(state): State<AppState>,
    Path(costing_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    state.autosaver.discard(costing_id).await;
    state.costing_service().delete(costing_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Calculate a costing without storing it
pub async fn calculate_costing(Json(input): Json<CostingInput>) -> AppResult<impl IntoResponse> {
    validate_costing_input(&input).map_err(|e| AppError::ValidationError(e.to_string()))?;
    Ok(Json(input.calculate()))
}

async fn current_view(state: &AppState, record: CostingRecord) -> CostingView {
    match state.autosaver.pending(record.id).await {
        Some(draft) => CostingView::new(record.with_draft(draft), true),
        None => CostingView::new(record, false),
    }
}

async fn previous_input(state: &AppState, costing_id: Uuid, stored: CostingRecord) -> CostingInput {
    match state.autosaver.pending(costing_id).await {
        Some(draft) => draft.input,
        None => stored.input,
    }
}
