//! Handlers for workflow document views.
//!
//! Every endpoint accepts a `{ "document": ... }` body where the document is
//! an image's metadata: a node graph, flat key/value metadata, or either one
//! serialized as a JSON string. Unusable documents are not request errors;
//! they yield the empty graph and the all-sentinel parameters.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use galleryflow_core::hashing::document_hash;
use galleryflow_core::metadata_inference;
use galleryflow_core::DerivedView;
use galleryflow_core::workflow_document::decode_embedded_document;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body carrying a metadata document.
#[derive(Debug, Deserialize)]
pub struct DocumentRequest {
    /// Missing and `null` documents both mean "no document".
    #[serde(default)]
    pub document: Value,
}

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub cleared: usize,
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub removed: bool,
}

// ---------------------------------------------------------------------------
// Derived views
// ---------------------------------------------------------------------------

/// POST /api/v1/workflow/graph
///
/// Positioned nodes and deduplicated edges of the document's workflow.
pub async fn build_graph(
    State(state): State<AppState>,
    Json(input): Json<DocumentRequest>,
) -> AppResult<impl IntoResponse> {
    let builder = Arc::clone(&state.graph_builder);
    let graph = tokio::task::spawn_blocking(move || {
        let document = decode_embedded_document(&input.document);
        builder.build(document.as_ref())
    })
    .await
    .map_err(|e| AppError::InternalError(format!("Graph build task failed: {e}")))?;

    tracing::debug!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "Workflow graph requested",
    );

    Ok(Json(DataResponse { data: graph }))
}

/// POST /api/v1/workflow/parameters
///
/// Canonical generation parameters of the document.
pub async fn infer_parameters(Json(input): Json<DocumentRequest>) -> AppResult<impl IntoResponse> {
    let document = decode_embedded_document(&input.document);
    let parameters = metadata_inference::infer_parameters(document.as_ref());

    Ok(Json(DataResponse { data: parameters }))
}

/// POST /api/v1/workflow/inspect
///
/// Graph, parameters and prompt tags in one memoized response.
///
/// The cache lock is only held for the lookup and the insert; derivation
/// runs on the blocking pool so a large document stalls neither the async
/// workers nor other cache users.
pub async fn inspect(
    State(state): State<AppState>,
    Json(input): Json<DocumentRequest>,
) -> AppResult<impl IntoResponse> {
    let hash = document_hash(&input.document);
    let cached = state.cache.lock().await.get(&hash);

    let view = match cached {
        Some(view) => {
            tracing::debug!(hash = %hash, "Derived view cache hit");
            view
        }
        None => {
            let builder = Arc::clone(&state.graph_builder);
            let view = tokio::task::spawn_blocking(move || {
                DerivedView::derive_keyed(&builder, &input.document, hash)
            })
            .await
            .map_err(|e| AppError::InternalError(format!("Derive task failed: {e}")))?;

            let view = Arc::new(view);
            state.cache.lock().await.insert(Arc::clone(&view));
            view
        }
    };

    Ok(Json(DataResponse {
        data: view.as_ref().clone(),
    }))
}

// ---------------------------------------------------------------------------
// Cache management
// ---------------------------------------------------------------------------

/// GET /api/v1/workflow/cache
pub async fn cache_stats(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let stats = state.cache.lock().await.stats();

    Ok(Json(DataResponse { data: stats }))
}

/// DELETE /api/v1/workflow/cache
///
/// Drop every memoized view.
pub async fn clear_cache(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let cleared = state.cache.lock().await.clear();

    tracing::info!(cleared, "Derived view cache cleared");

    Ok(Json(DataResponse {
        data: ClearCacheResponse { cleared },
    }))
}

/// DELETE /api/v1/workflow/cache/{hash}
///
/// Drop the memoized view of one document. `hash` is the `hash` field of an
/// inspect response.
pub async fn invalidate_cache_entry(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> AppResult<impl IntoResponse> {
    if !is_sha256_hex(&hash) {
        return Err(AppError::BadRequest(format!(
            "'{hash}' is not a SHA-256 hex digest"
        )));
    }

    let removed = state.cache.lock().await.invalidate(&hash);

    tracing::info!(hash = %hash, removed, "Derived view invalidated");

    Ok(Json(DataResponse {
        data: InvalidateResponse { removed },
    }))
}

fn is_sha256_hex(hash: &str) -> bool {
    hash.len() == 64
        && hash
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
