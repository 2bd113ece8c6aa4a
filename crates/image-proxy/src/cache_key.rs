//! Cache key derivation

use base64::Engine;
use sha2::{Digest, Sha256};

/// Derive the on-disk cache key for a logical path.
///
/// SHA-256 over namespace, cache-format version and path, base64 encoded
/// with `/` remapped to `-` so the key is a single path component.
pub fn derive_cache_key(namespace: &str, cache_version: u32, path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(cache_version.to_string().as_bytes());
    hasher.update(path.as_bytes());

    base64::engine::general_purpose::STANDARD
        .encode(hasher.finalize())
        .replace('/', "-")
}
