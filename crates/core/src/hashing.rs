//! Shared SHA-256 hex digest utility.
//!
//! Used by the derived-view cache to key documents by content.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Content hash of a JSON document.
///
/// Serializes in the document's own key order: two documents that differ
/// only in key order hash differently, which is intended because the
/// inference rules are first-match in document order.
pub fn document_hash(document: &serde_json::Value) -> String {
    // Serializing a `Value` cannot fail (all keys are strings).
    let canonical = serde_json::to_string(document).unwrap_or_default();
    sha256_hex(canonical.as_bytes())
}
