//! Content fingerprints for caller-side caches and dedup.
//!
//! SHA-256, encoded URL-safe base64 without padding (43 characters). Stable
//! across processes and releases: changing the encoding invalidates every cache.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};

/// Digest of `input`.
pub fn hash_key(input: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(input.as_bytes()))
}

/// Digest of an ordered list of fields. Each field is length-prefixed, so
/// `["ab", "c"]` and `["a", "bc"]` never collide.
pub fn hash_parts(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_key_is_deterministic() {
        assert_eq!(hash_key("abc"), hash_key("abc"));
    }

    #[test]
    fn test_hash_key_differs_for_different_input() {
        assert_ne!(hash_key("abc"), hash_key("abd"));
    }

    #[test]
    fn test_hash_key_known_vector() {
        // SHA-256("abc") = ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad
        assert_eq!(
            hash_key("abc"),
            "ungWv48Bz-pBQUDeXa4iI7ADYaOWF3qctBD_YfIAFa0"
        );
    }

    #[test]
    fn test_hash_key_is_url_safe_and_unpadded() {
        let key = hash_key("Rewrite this bullet for a staff engineer role");
        assert_eq!(key.len(), 43);
        assert!(key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_hash_parts_field_boundaries_matter() {
        assert_ne!(hash_parts(&["ab", "c"]), hash_parts(&["a", "bc"]));
        assert_eq!(hash_parts(&["a", "b"]), hash_parts(&["a", "b"]));
    }
}
