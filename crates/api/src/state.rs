use std::sync::Arc;

use crm_mango::{MangoConfig, RecordingStorageConfig};
use crm_sync::SyncService;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone; everything heavy sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: crm_db::DbPool,
    /// Mango credentials, used to verify pushed events.
    pub mango: Arc<MangoConfig>,
    /// Where recordings are stored and served from.
    pub recordings: Arc<RecordingStorageConfig>,
    pub sync: Arc<SyncService>,
}
