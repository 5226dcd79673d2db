//! Route definitions for workflow document views.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::workflow;
use crate::state::AppState;

/// Workflow routes mounted at `/workflow`.
///
/// ```text
/// POST   /graph          -> build_graph
/// POST   /parameters     -> infer_parameters
/// POST   /inspect        -> inspect
/// GET    /cache          -> cache_stats
/// DELETE /cache          -> clear_cache
/// DELETE /cache/{hash}   -> invalidate_cache_entry
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/graph", post(workflow::build_graph))
        .route("/parameters", post(workflow::infer_parameters))
        .route("/inspect", post(workflow::inspect))
        .route(
            "/cache",
            get(workflow::cache_stats).delete(workflow::clear_cache),
        )
        .route("/cache/{hash}", delete(workflow::invalidate_cache_entry))
}
