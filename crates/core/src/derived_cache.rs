//! Memoized derived views of metadata documents.
//!
//! A [`DerivedView`] bundles everything a details panel renders for one
//! document. [`DerivedViewCache`] keeps recently derived views keyed by the
//! document's content hash. The cache is a plain value: whoever owns it
//! decides its lifetime and synchronization.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use ts_rs::TS;

use crate::generation_params::CanonicalParameters;
use crate::graph_layout::GraphLayout;
use crate::hashing::document_hash;
use crate::metadata_inference::infer_parameters;
use crate::workflow_document::{decode_embedded_document, is_node_graph};
use crate::workflow_graph::{WorkflowGraph, WorkflowGraphBuilder};

/// Default number of retained views.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Graph, parameters and prompt tags derived from one document.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct DerivedView {
    /// Content hash of the source document; the cache key.
    pub hash: String,
    pub is_node_graph: bool,
    pub graph: WorkflowGraph,
    pub parameters: CanonicalParameters,
    pub tags: Vec<String>,
}

impl DerivedView {
    /// Derive the view of a document as received. String documents are
    /// decoded first; anything undecodable derives the empty view.
    pub fn derive<L: GraphLayout>(builder: &WorkflowGraphBuilder<L>, document: &Value) -> Self {
        Self::derive_keyed(builder, document, document_hash(document))
    }

    /// [`derive`](Self::derive) for a caller that already holds the
    /// document's hash.
    pub fn derive_keyed<L: GraphLayout>(
        builder: &WorkflowGraphBuilder<L>,
        document: &Value,
        hash: String,
    ) -> Self {
        let decoded = decode_embedded_document(document);
        let decoded = decoded.as_ref();

        let graph = builder.build(decoded);
        let parameters = infer_parameters(decoded);
        let tags = parameters.prompt_tags();

        Self {
            hash,
            is_node_graph: decoded.is_some_and(is_node_graph),
            graph,
            parameters,
            tags,
        }
    }
}

/// Hit/miss counters and current size of a [`DerivedViewCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Bounded memo map from document hash to [`DerivedView`].
///
/// Eviction is first-in first-out: when full, the oldest inserted entry is
/// dropped. A capacity of zero retains nothing.
#[derive(Debug)]
pub struct DerivedViewCache {
    capacity: usize,
    entries: HashMap<String, Arc<DerivedView>>,
    insertion_order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

impl Default for DerivedViewCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl DerivedViewCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            capacity: self.capacity,
            hits: self.hits,
            misses: self.misses,
        }
    }

    /// Look up a view by hash, counting a hit or a miss.
    pub fn get(&mut self, hash: &str) -> Option<Arc<DerivedView>> {
        match self.entries.get(hash) {
            Some(view) => {
                self.hits += 1;
                Some(Arc::clone(view))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Return the cached view of `document`, deriving and storing it on a
    /// miss.
    pub fn get_or_derive<L: GraphLayout>(
        &mut self,
        builder: &WorkflowGraphBuilder<L>,
        document: &Value,
    ) -> Arc<DerivedView> {
        let hash = document_hash(document);
        if let Some(view) = self.get(&hash) {
            tracing::debug!(hash = %hash, "Derived view cache hit");
            return view;
        }

        let view = Arc::new(DerivedView::derive_keyed(builder, document, hash));
        self.insert(Arc::clone(&view));
        view
    }

    /// Store a view under its own hash, evicting the oldest entries when
    /// over capacity. Replacing an existing entry keeps its queue slot.
    pub fn insert(&mut self, view: Arc<DerivedView>) {
        if self.capacity == 0 {
            return;
        }

        let hash = view.hash.clone();
        if self.entries.insert(hash.clone(), view).is_some() {
            return;
        }
        self.insertion_order.push_back(hash);

        while self.entries.len() > self.capacity {
            let Some(oldest) = self.insertion_order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            tracing::debug!(hash = %oldest, "Evicted derived view");
        }
    }

    /// Drop one entry. Returns whether it was present.
    pub fn invalidate(&mut self, hash: &str) -> bool {
        if self.entries.remove(hash).is_none() {
            return false;
        }
        self.insertion_order.retain(|queued| queued != hash);
        true
    }

    /// Drop every entry, returning how many were removed. Counters are kept.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        self.insertion_order.clear();
        removed
    }
}
