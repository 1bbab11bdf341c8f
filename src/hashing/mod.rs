//! Keyed hashing for API-key credentials.
//!
//! API keys are looked up by hash only; the plaintext never touches storage
//! or logs. The hash is a keyed BLAKE3 derivation seeded by the deployment
//! secret, so a leaked database dump cannot be brute-forced offline without
//! the secret as well.

use blake3::Hasher;

/// Domain-separation context for API-key derivation.
const API_KEY_CONTEXT: &str = "visage 2024-11-02 api key v1";

/// Hashes a plaintext API key under the deployment secret.
///
/// Returns the lowercase hex form stored in `api_keys.key_hash`.
pub fn hash_api_key(secret: &str, plaintext: &str) -> String {
    let derived = blake3::derive_key(API_KEY_CONTEXT, secret.as_bytes());
    let mut hasher = Hasher::new_keyed(&derived);
    hasher.update(plaintext.as_bytes());
    hex::encode(hasher.finalize().as_bytes())
}

/// Computes a 64-bit fingerprint of arbitrary bytes, truncated from BLAKE3.
///
/// Used for log-safe identifiers (e.g. fingerprinting an image payload in
/// provider audit events). Not used for authentication.
#[inline]
pub fn fingerprint(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    let bytes: [u8; 8] = hash.as_bytes()[0..8]
        .try_into()
        .expect("BLAKE3 always produces at least 8 bytes");
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_same_secret_is_stable() {
        let a = hash_api_key("secret", "vk_live_abc123");
        let b = hash_api_key("secret", "vk_live_abc123");
        assert_eq!(a, b);
    }

    #[test]
    fn different_secret_changes_hash() {
        let a = hash_api_key("secret-one", "vk_live_abc123");
        let b = hash_api_key("secret-two", "vk_live_abc123");
        assert_ne!(a, b);
    }

    #[test]
    fn different_key_changes_hash() {
        let a = hash_api_key("secret", "vk_live_abc123");
        let b = hash_api_key("secret", "vk_live_abc124");
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_hex_of_32_bytes() {
        let h = hash_api_key("secret", "anything");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_differs_by_content() {
        assert_ne!(fingerprint(b"image-a"), fingerprint(b"image-b"));
    }
}
