//! Shared response envelope types for API handlers.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// Envelope of the sync trigger: `{ success, message, synced, recordingsUpdated, total }`
/// on success, `{ success: false, message, error }` on failure.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synced: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recordings_updated: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncResponse {
    pub fn completed(synced: usize, recordings_updated: usize, total: usize) -> Self {
        Self {
            success: true,
            message: format!("Synced {synced} of {total} calls"),
            synced: Some(synced),
            recordings_updated: Some(recordings_updated),
            total: Some(total),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            synced: None,
            recordings_updated: None,
            total: None,
            error: Some(error.into()),
        }
    }
}
