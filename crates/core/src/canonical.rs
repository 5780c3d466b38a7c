//! Content hashing for agent definitions.
//!
//! The `.p` parser/emitter (external collaborator) is responsible for
//! producing a canonical, whitespace-stable definition string. This module
//! only computes the hash over that string; it never second-guesses
//! whether the input is "canonical enough".

use sha2::{Digest, Sha256};

/// Compute the content-addressed identity hash of a canonical definition
/// string, rendered as lowercase hex.
pub fn content_hash(definition: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(definition.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
#[path = "canonical_tests.rs"]
mod tests;
