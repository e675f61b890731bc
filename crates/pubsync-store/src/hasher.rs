use pubsync_types::ContentAddress;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so an uploaded file and a structured manifest with identical
/// bytes produce different addresses.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for opaque uploaded files (assets, stylesheets, templates).
    pub const BLOB: Self = Self {
        domain: "pubsync-blob-v1",
    };
    /// Hasher for structured values (template sets, manifests).
    pub const STRUCTURED: Self = Self {
        domain: "pubsync-structured-v1",
    };

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ContentAddress {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ContentAddress::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected address.
    pub fn verify(&self, data: &[u8], expected: &ContentAddress) -> bool {
        self.hash(data) == *expected
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}
