//! Shared query parameter types for API handlers.

use serde::Deserialize;

/// Generic pagination parameters (`?limit=&offset=`).
///
/// Clamped in the handler via `crm_core::pagination`.
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `?minutes=` override of the sync lookback window.
#[derive(Debug, Deserialize)]
pub struct SyncParams {
    pub minutes: Option<u64>,
}
