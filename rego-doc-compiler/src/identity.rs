//! Content-derived identity for generated policies

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of the rendered Rego.
///
/// Identical text always maps to the same identifier, so re-applying an
/// unchanged document never looks like a change to the caller.
pub fn derive_id(rego: &str) -> String {
    hex::encode(Sha256::digest(rego.as_bytes()))
}
