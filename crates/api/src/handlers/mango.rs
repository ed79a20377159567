//! Handlers for the Mango Office integration.
//!
//! - sync trigger (manual pass over the lookback window),
//! - pushed call summaries,
//! - a diagnostic recording download.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::json;

use crm_core::error::CoreError;
use crm_mango::webhook::{parse_summary_event, verify_push, WebhookForm};
use crm_sync::config::lookback_minutes_to_duration;
use crm_sync::SyncError;

use crate::error::{AppError, AppResult};
use crate::query::SyncParams;
use crate::response::SyncResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Sync trigger
// ---------------------------------------------------------------------------

/// GET|POST /api/v1/mango/sync
///
/// Run one sync pass. `?minutes=N` overrides the configured lookback.
pub async fn sync_calls(
    State(state): State<AppState>,
    params: Result<Query<SyncParams>, QueryRejection>,
) -> Response {
    let params = match params {
        Ok(Query(params)) => params,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(SyncResponse::failed("Invalid sync parameters", rejection.body_text())),
            )
                .into_response();
        }
    };
    let lookback = params.minutes.map(lookback_minutes_to_duration);

    match state.sync.run_pass(lookback).await {
        Ok(summary) => {
            tracing::info!(
                synced = summary.synced,
                recordings_updated = summary.recordings_updated,
                total = summary.total,
                "Manual Mango sync finished"
            );
            Json(SyncResponse::completed(
                summary.synced,
                summary.recordings_updated,
                summary.total,
            ))
            .into_response()
        }
        Err(SyncError::Busy) => (
            StatusCode::CONFLICT,
            Json(SyncResponse::failed(
                "Sync already in progress",
                SyncError::Busy.to_string(),
            )),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Manual Mango sync failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SyncResponse::failed("Mango sync failed", e.to_string())),
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Pushed events
// ---------------------------------------------------------------------------

/// POST /api/v1/mango/events/summary
///
/// Reconcile a call summary pushed by Mango.
pub async fn receive_summary(
    State(state): State<AppState>,
    Form(form): Form<WebhookForm>,
) -> AppResult<impl IntoResponse> {
    if !verify_push(&state.mango, &form) {
        tracing::warn!("Rejected Mango push with invalid signature");
        return Err(AppError::Core(CoreError::Unauthorized(
            "invalid signature".into(),
        )));
    }

    let record =
        parse_summary_event(&form.json).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let report = state.sync.ingest(std::slice::from_ref(&record)).await?;

    tracing::info!(
        entry_id = record.entry_id.as_deref().unwrap_or("-"),
        synced = report.synced,
        "Mango summary event ingested"
    );

    Ok(Json(json!({
        "success": true,
        "synced": report.synced,
        "outcome": report.outcomes.first(),
    })))
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TestRecordingRequest {
    pub recording: String,
    pub entry_id: Option<String>,
}

/// POST /api/v1/mango/test-recording
///
/// Attempt a single recording download and report every stage.
pub async fn test_recording(
    State(state): State<AppState>,
    Json(input): Json<TestRecordingRequest>,
) -> AppResult<impl IntoResponse> {
    if input.recording.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "recording must not be empty".into(),
        )));
    }

    let probe = state
        .sync
        .probe_recording(input.entry_id.as_deref(), &input.recording)
        .await;

    Ok(Json(json!({
        "success": probe.public_url.is_some(),
        "probe": probe,
    })))
}
