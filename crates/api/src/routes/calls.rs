use axum::routing::get;
use axum::Router;

use crate::handlers::calls;
use crate::state::AppState;

/// Call routes mounted at `/calls`.
///
/// ```text
/// GET /          -> list_calls
/// GET /{id}      -> get_call
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(calls::list_calls))
        .route("/{id}", get(calls::get_call))
}
