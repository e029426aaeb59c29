//! Deterministic fingerprints and cache keys.
//!
//! The cache key is derived from `(agent type, context fingerprint)`. When a
//! caller has no richer context to fingerprint, [`context_fingerprint`] over
//! the prompt itself is the fallback.

use sha2::{Digest, Sha256};

use sift_core::agents::AgentType;

fn sha256_hex(input: &[u8]) -> String {
    let digest = Sha256::digest(input);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Fingerprint of assembled context (or, as a fallback, the prompt itself).
#[must_use]
pub fn context_fingerprint(context: &str) -> String {
    sha256_hex(context.as_bytes())
}

/// Cache key for one `(agent, context fingerprint)` pair.
#[must_use]
pub fn cache_key(agent: AgentType, fingerprint: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(agent.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(fingerprint.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
