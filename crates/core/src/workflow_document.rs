//! Workflow document parsing.
//!
//! A workflow document is a JSON object mapping node ids to nodes:
//!
//! ```json
//! {
//!   "3": {
//!     "class_type": "KSampler",
//!     "inputs": { "seed": 42, "positive": ["6", 0] }
//!   }
//! }
//! ```
//!
//! Only entries whose key is a non-negative integer string and whose value
//! is an object carrying `class_type` are nodes; any other top-level key is
//! metadata riding along and is ignored. Input values are classified once,
//! here, into [`InputValue::Link`] or [`InputValue::Scalar`].

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::error::CoreError;
use crate::node_kind::NodeKind;

/// Key carrying a node's type tag.
const CLASS_TYPE_KEY: &str = "class_type";

/// Key carrying a node's input map.
const INPUTS_KEY: &str = "inputs";

/// Key carrying node display metadata (`{"title": ...}`).
const META_KEY: &str = "_meta";

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// A reference from an input slot to another node's output.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// Id of the node producing the value. Always present in the document.
    pub source_id: String,
    /// Output slot on the source node, when numeric.
    pub output_index: Option<u64>,
}

/// A classified node input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    /// `[source_id, output_index]` where `source_id` names a node in the
    /// same document.
    Link(Link),
    /// Anything else, including link-shaped arrays whose source is missing.
    Scalar(Value),
}

impl InputValue {
    pub fn as_link(&self) -> Option<&Link> {
        match self {
            InputValue::Link(link) => Some(link),
            InputValue::Scalar(_) => None,
        }
    }

    /// The scalar as a string, when it is a JSON string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            InputValue::Scalar(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// The scalar as a number, when it is a JSON number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            InputValue::Scalar(Value::Number(n)) => n.as_f64(),
            _ => None,
        }
    }

    /// The scalar as a displayable JSON value (string, number or boolean).
    pub fn as_display_scalar(&self) -> Option<&Value> {
        match self {
            InputValue::Scalar(v @ (Value::String(_) | Value::Number(_) | Value::Bool(_))) => {
                Some(v)
            }
            _ => None,
        }
    }
}

/// A single node of a workflow document.
#[derive(Debug, Clone)]
pub struct WorkflowNode {
    /// Node id (the numeric string key).
    pub id: String,
    /// Type tag. Empty when the document carries a non-string `class_type`.
    pub class_type: String,
    /// Role derived from `class_type`.
    pub kind: NodeKind,
    /// `_meta.title`, when present.
    pub title: Option<String>,
    /// The node's raw JSON, passed through to renderers untouched.
    pub raw: Value,
    inputs: Vec<(String, InputValue)>,
}

impl WorkflowNode {
    /// Look up an input by name.
    pub fn input(&self, name: &str) -> Option<&InputValue> {
        self.inputs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// All inputs in document order.
    pub fn inputs(&self) -> impl Iterator<Item = (&str, &InputValue)> {
        self.inputs.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// All link inputs in document order.
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.inputs.iter().filter_map(|(_, value)| value.as_link())
    }

    /// First of `names` whose input is a string.
    pub fn first_str(&self, names: &[&str]) -> Option<&str> {
        names
            .iter()
            .find_map(|name| self.input(name).and_then(InputValue::as_str))
    }

    /// First of `names` whose input is a number.
    pub fn first_f64(&self, names: &[&str]) -> Option<f64> {
        names
            .iter()
            .find_map(|name| self.input(name).and_then(InputValue::as_f64))
    }
}

/// A parsed workflow document: its nodes in document order.
#[derive(Debug, Clone, Default)]
pub struct WorkflowDocument {
    nodes: Vec<WorkflowNode>,
    index: HashMap<String, usize>,
    dangling_links: usize,
}

impl WorkflowDocument {
    /// Parse a workflow document.
    ///
    /// Non-node entries are skipped. Fails only when the root is not a JSON
    /// object.
    pub fn from_value(json: &Value) -> Result<Self, CoreError> {
        let obj = json.as_object().ok_or_else(|| {
            CoreError::Validation("Workflow document must be a JSON object".to_string())
        })?;

        // Link detection needs the full id set before any inputs are read.
        let node_ids: HashSet<&str> = obj
            .iter()
            .filter(|(key, value)| is_node_entry(key, value))
            .map(|(key, _)| key.as_str())
            .collect();

        let mut document = WorkflowDocument::default();

        for (node_id, node_value) in obj {
            if !node_ids.contains(node_id.as_str()) {
                continue;
            }

            let class_type = node_value
                .get(CLASS_TYPE_KEY)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            let title = node_value
                .get(META_KEY)
                .and_then(|meta| meta.get("title"))
                .and_then(Value::as_str)
                .map(str::to_string);

            let mut inputs = Vec::new();
            if let Some(input_obj) = node_value.get(INPUTS_KEY).and_then(Value::as_object) {
                for (input_name, input_val) in input_obj {
                    let classified = classify_input(input_val, &node_ids);
                    if classified.is_none() {
                        document.dangling_links += 1;
                        tracing::debug!(
                            node_id = %node_id,
                            input = %input_name,
                            "Ignoring link to a node missing from the document",
                        );
                    }
                    inputs.push((
                        input_name.clone(),
                        classified.unwrap_or_else(|| InputValue::Scalar(input_val.clone())),
                    ));
                }
            }

            document
                .index
                .insert(node_id.clone(), document.nodes.len());
            document.nodes.push(WorkflowNode {
                id: node_id.clone(),
                kind: NodeKind::classify(&class_type),
                class_type,
                title,
                raw: node_value.clone(),
                inputs,
            });
        }

        Ok(document)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes in document order.
    pub fn nodes(&self) -> &[WorkflowNode] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.position(id).map(|i| &self.nodes[i])
    }

    /// Index of a node within [`nodes`](Self::nodes).
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Follow a link to its source node.
    pub fn resolve(&self, link: &Link) -> Option<&WorkflowNode> {
        self.node(&link.source_id)
    }

    /// First node, in document order, matching `predicate`.
    pub fn find(&self, predicate: impl Fn(&WorkflowNode) -> bool) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|node| predicate(node))
    }

    /// Number of link-shaped inputs whose source is missing.
    pub fn dangling_links(&self) -> usize {
        self.dangling_links
    }
}

// ---------------------------------------------------------------------------
// Public helpers
// ---------------------------------------------------------------------------

/// Whether `key` is a node id: a non-empty string of ASCII digits.
pub fn is_node_id(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}

/// Whether a top-level entry is a workflow node.
pub fn is_node_entry(key: &str, value: &Value) -> bool {
    is_node_id(key)
        && value
            .as_object()
            .is_some_and(|obj| obj.contains_key(CLASS_TYPE_KEY))
}

/// Whether a document contains at least one workflow node.
pub fn is_node_graph(json: &Value) -> bool {
    json.as_object()
        .is_some_and(|obj| obj.iter().any(|(key, value)| is_node_entry(key, value)))
}

/// Decode a document that may have been stored as a serialized string.
///
/// Objects pass through; strings are parsed as JSON and kept when they
/// yield an object. Everything else is treated as "no document".
pub fn decode_embedded_document(json: &Value) -> Option<Value> {
    match json {
        Value::Object(_) => Some(json.clone()),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(parsed @ Value::Object(_)) => Some(parsed),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "Embedded document is not valid JSON");
                None
            }
        },
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Classify one input value.
///
/// Returns `None` for a link-shaped value whose source node is missing so
/// the caller can count it; the caller then keeps it as an opaque scalar.
fn classify_input(value: &Value, node_ids: &HashSet<&str>) -> Option<InputValue> {
    let Some([first, second]) = value.as_array().map(Vec::as_slice) else {
        return Some(InputValue::Scalar(value.clone()));
    };
    let Some(source_id) = first.as_str() else {
        return Some(InputValue::Scalar(value.clone()));
    };
    if !node_ids.contains(source_id) {
        return None;
    }
    Some(InputValue::Link(Link {
        source_id: source_id.to_string(),
        output_index: second.as_u64(),
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn sample_document() -> Value {
        json!({
            "1": {
                "class_type": "CheckpointLoaderSimple",
                "inputs": { "ckpt_name": "sdxl.safetensors" }
            },
            "2": {
                "class_type": "CLIPTextEncode",
                "_meta": { "title": "Positive Prompt" },
                "inputs": { "text": "a cat", "clip": ["1", 1] }
            },
            "3": {
                "class_type": "KSampler",
                "inputs": {
                    "seed": 42,
                    "positive": ["2", 0],
                    "negative": ["99", 0],
                    "model": ["1", 0]
                }
            },
            "seed": 42,
            "workflow": { "class_type": "not a node" }
        })
    }

    // -- Node graph detection ------------------------------------------------

    #[test]
    fn node_ids_are_ascii_digit_strings() {
        assert!(is_node_id("0"));
        assert!(is_node_id("42"));
        assert!(!is_node_id(""));
        assert!(!is_node_id("-1"));
        assert!(!is_node_id("+1"));
        assert!(!is_node_id("1.5"));
        assert!(!is_node_id("seed"));
    }

    #[test]
    fn detects_node_graph() {
        assert!(is_node_graph(&sample_document()));
    }

    #[test]
    fn flat_metadata_is_not_a_node_graph() {
        assert!(!is_node_graph(&json!({"seed": 7, "positive_prompt": "hello"})));
        assert!(!is_node_graph(&json!("not an object")));
        assert!(!is_node_graph(&json!({"workflow": {"class_type": "KSampler"}})));
    }

    // -- Parsing ---------------------------------------------------------------

    #[test]
    fn parse_keeps_only_numeric_node_entries() {
        let doc = WorkflowDocument::from_value(&sample_document()).unwrap();
        let ids: Vec<_> = doc.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn parse_non_object_returns_error() {
        let result = WorkflowDocument::from_value(&json!([1, 2, 3]));
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn parse_classifies_links_and_scalars() {
        let doc = WorkflowDocument::from_value(&sample_document()).unwrap();
        let sampler = doc.node("3").unwrap();

        assert_matches!(sampler.input("seed"), Some(InputValue::Scalar(v)) if v == &json!(42));
        assert_eq!(
            sampler.input("positive").and_then(InputValue::as_link),
            Some(&Link {
                source_id: "2".to_string(),
                output_index: Some(0),
            })
        );
    }

    #[test]
    fn dangling_link_becomes_scalar() {
        let doc = WorkflowDocument::from_value(&sample_document()).unwrap();
        let sampler = doc.node("3").unwrap();

        assert_matches!(sampler.input("negative"), Some(InputValue::Scalar(_)));
        assert_eq!(doc.dangling_links(), 1);
    }

    #[test]
    fn arrays_of_other_arity_are_scalars() {
        let doc = WorkflowDocument::from_value(&json!({
            "1": { "class_type": "A", "inputs": {} },
            "2": { "class_type": "B", "inputs": { "x": ["1", 0, 3], "y": ["1"] } }
        }))
        .unwrap();
        let node = doc.node("2").unwrap();
        assert_eq!(node.links().count(), 0);
    }

    #[test]
    fn missing_or_invalid_inputs_are_empty() {
        let doc = WorkflowDocument::from_value(&json!({
            "1": { "class_type": "SaveImage" },
            "2": { "class_type": "SaveImage", "inputs": "bogus" }
        }))
        .unwrap();
        assert_eq!(doc.node("1").unwrap().inputs().count(), 0);
        assert_eq!(doc.node("2").unwrap().inputs().count(), 0);
    }

    #[test]
    fn non_string_class_type_is_kept_as_other() {
        let doc = WorkflowDocument::from_value(&json!({"1": {"class_type": 5}})).unwrap();
        let node = doc.node("1").unwrap();
        assert_eq!(node.class_type, "");
        assert_eq!(node.kind, NodeKind::Other);
    }

    #[test]
    fn title_is_read_from_meta() {
        let doc = WorkflowDocument::from_value(&sample_document()).unwrap();
        assert_eq!(doc.node("2").unwrap().title.as_deref(), Some("Positive Prompt"));
        assert_eq!(doc.node("1").unwrap().title, None);
    }

    #[test]
    fn resolve_follows_links() {
        let doc = WorkflowDocument::from_value(&sample_document()).unwrap();
        let link = doc.node("3").unwrap().input("model").and_then(InputValue::as_link).unwrap();
        assert_eq!(doc.resolve(link).map(|n| n.class_type.as_str()), Some("CheckpointLoaderSimple"));
    }

    // -- Embedded documents ----------------------------------------------------

    #[test]
    fn decode_passes_objects_through() {
        let doc = json!({"seed": 1});
        assert_eq!(decode_embedded_document(&doc), Some(doc));
    }

    #[test]
    fn decode_parses_serialized_objects() {
        let raw = json!(r#"{"1": {"class_type": "KSampler"}}"#);
        let decoded = decode_embedded_document(&raw).unwrap();
        assert!(is_node_graph(&decoded));
    }

    #[test]
    fn decode_rejects_garbage_and_non_objects() {
        assert_eq!(decode_embedded_document(&json!("{not json")), None);
        assert_eq!(decode_embedded_document(&json!("[1, 2]")), None);
        assert_eq!(decode_embedded_document(&json!(null)), None);
        assert_eq!(decode_embedded_document(&json!(12)), None);
    }
}
