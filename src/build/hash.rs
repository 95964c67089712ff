//! Content hashing for build provenance.

use sha2::{Digest, Sha256};

/// Hasher for declaration sources recorded in the build manifest.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentHasher;

impl ContentHasher {
    /// Creates a new content hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Hex-encoded SHA-256 of `content`.
    #[must_use]
    pub fn hash_content(&self, content: &[u8]) -> String {
        hex::encode(Sha256::digest(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        let hasher = ContentHasher::new();
        assert_eq!(
            hasher.hash_content(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hash_is_deterministic_and_content_sensitive() {
        let hasher = ContentHasher::new();
        let a = hasher.hash_content(b"externalId: ds_1\n");
        assert_eq!(a, hasher.hash_content(b"externalId: ds_1\n"));
        assert_ne!(a, hasher.hash_content(b"externalId: ds_2\n"));
    }
}
