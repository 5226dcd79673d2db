pub mod health;
pub mod workflow;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /workflow/graph                  build graph (POST)
/// /workflow/parameters             infer parameters (POST)
/// /workflow/inspect                memoized graph + parameters + tags (POST)
/// /workflow/cache                  cache stats (GET), clear (DELETE)
/// /workflow/cache/{hash}           invalidate one entry (DELETE)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/workflow", workflow::router())
}
