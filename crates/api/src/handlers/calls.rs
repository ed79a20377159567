//! Read-only views over reconciled calls.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use crm_core::error::CoreError;
use crm_core::pagination::{clamp_limit, clamp_offset, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crm_core::types::DbId;
use crm_db::repositories::CallRepo;

use crate::error::{AppError, AppResult};
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/calls
///
/// Calls, newest first.
pub async fn list_calls(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    let limit = clamp_limit(params.limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT);
    let offset = clamp_offset(params.offset);
    let calls = CallRepo::list(&state.pool, limit, offset).await?;

    Ok(Json(DataResponse { data: calls }))
}

/// GET /api/v1/calls/{id}
pub async fn get_call(
    State(state): State<AppState>,
    Path(call_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let call = CallRepo::find_by_id(&state.pool, call_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Call",
            id: call_id,
        }))?;

    Ok(Json(DataResponse { data: call }))
}
