//! Route definitions for the Mango Office integration, mounted at `/mango`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::mango;
use crate::state::AppState;

/// ```text
/// GET|POST /sync              -> sync_calls
/// POST     /events/summary    -> receive_summary
/// POST     /test-recording    -> test_recording
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sync", get(mango::sync_calls).post(mango::sync_calls))
        .route("/events/summary", post(mango::receive_summary))
        .route("/test-recording", post(mango::test_recording))
}
