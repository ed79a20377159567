pub mod calls;
pub mod health;
pub mod mango;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /mango/sync                  trigger a sync pass (GET, POST)
/// /mango/events/summary        pushed call summaries (POST)
/// /mango/test-recording        diagnostic recording download (POST)
///
/// /calls                       list calls (GET)
/// /calls/{id}                  get call (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/mango", mango::router())
        .nest("/calls", calls::router())
}
