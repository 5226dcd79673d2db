use std::sync::Arc;

use galleryflow_core::{DerivedViewCache, WorkflowGraphBuilder};
use tokio::sync::Mutex;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Graph builder configured with the layout settings.
    pub graph_builder: Arc<WorkflowGraphBuilder>,
    /// Memoized derived views, keyed by document content hash.
    pub cache: Arc<Mutex<DerivedViewCache>>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let graph_builder = config.layout.graph_builder();
        let cache = DerivedViewCache::new(config.cache_capacity);

        Self {
            config: Arc::new(config),
            graph_builder: Arc::new(graph_builder),
            cache: Arc::new(Mutex::new(cache)),
        }
    }
}
