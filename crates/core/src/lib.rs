//! Galleryflow core: workflow graphs and generation parameters from image
//! metadata.
//!
//! - [`workflow_graph`] turns a node-graph document into positioned nodes
//!   and deduplicated edges, laid out by [`graph_layout`].
//! - [`metadata_inference`] derives [`CanonicalParameters`] from either a
//!   node graph or flat key/value metadata.
//! - [`derived_cache`] memoizes both per document content hash.

pub mod derived_cache;
pub mod error;
pub mod generation_params;
pub mod graph_layout;
pub mod hashing;
pub mod metadata_inference;
pub mod node_kind;
pub mod workflow_document;
pub mod workflow_graph;

pub use derived_cache::{DerivedView, DerivedViewCache};
pub use generation_params::{prompt_tags, CanonicalParameters, HiresFix, LoraEntry};
pub use graph_layout::{Footprint, GraphLayout, LayeredLayout, Point};
pub use metadata_inference::infer_parameters;
pub use workflow_document::{decode_embedded_document, WorkflowDocument};
pub use workflow_graph::{build_graph, WorkflowGraph, WorkflowGraphBuilder};
