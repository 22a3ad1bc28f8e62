// Read-only views derived from the current profile snapshot

use crate::alerts::evaluator::evaluate_session;
use crate::core::error::ApiError;
use crate::core::state::AppState;
use crate::reports::export::{to_csv, to_workbook, CSV_FILENAME};
use crate::reports::usage::{daily_usage, level_overview, usage_summary};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

/// Low cylinders under the user's own threshold
///
/// GET /users/{user_id}/alerts
pub async fn alerts_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Response, ApiError> {
    let profile = state.store.get(&user_id)?;
    Ok((StatusCode::OK, Json(evaluate_session(&profile))).into_response())
}

/// GET /users/{user_id}/levels
pub async fn levels_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Response, ApiError> {
    let profile = state.store.get(&user_id)?;
    let levels = level_overview(&profile.gas_cylinders)?;
    Ok((StatusCode::OK, Json(levels)).into_response())
}

/// GET /users/{user_id}/report/summary
pub async fn summary_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Response, ApiError> {
    let profile = state.store.get(&user_id)?;
    let summary = usage_summary(&profile.gas_cylinders)?;
    Ok((StatusCode::OK, Json(summary)).into_response())
}

/// GET /users/{user_id}/report/daily
pub async fn daily_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Response, ApiError> {
    let profile = state.store.get(&user_id)?;
    Ok((StatusCode::OK, Json(daily_usage(&profile.gas_cylinders))).into_response())
}

/// GET /users/{user_id}/report/export.csv
pub async fn csv_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Response, ApiError> {
    let profile = state.store.get(&user_id)?;
    let csv = to_csv(&profile.gas_cylinders)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", CSV_FILENAME),
            ),
        ],
        csv,
    )
        .into_response())
}

/// GET /users/{user_id}/report/workbook
pub async fn workbook_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Response, ApiError> {
    let profile = state.store.get(&user_id)?;
    let workbook = to_workbook(&profile.gas_cylinders)?;
    Ok((StatusCode::OK, Json(workbook)).into_response())
}
