use async_trait::async_trait;
use bytes::Bytes;
use pubsync_types::ContentAddress;
use serde_json::Value;

use crate::error::StoreResult;
use crate::hasher::ContentHasher;

/// Content-addressed store as seen by the synchronizer.
///
/// All implementations must satisfy these invariants:
/// - `hash` has no durability side effect and is deterministic.
/// - `put` returns the same address `hash` returns for identical bytes.
/// - Writing an object that already exists is a no-op (idempotent).
/// - Failures are surfaced as errors, never as hangs or silent drops.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Dry-run address of `bytes`.
    ///
    /// Default implementation hashes locally with [`ContentHasher::BLOB`].
    /// Remote backends whose addressing scheme is computed server side
    /// override this with a "hash only" request.
    async fn hash(&self, bytes: &[u8]) -> StoreResult<ContentAddress> {
        Ok(ContentHasher::BLOB.hash(bytes))
    }

    /// Durably upload `bytes` and return their address.
    async fn put(&self, bytes: Bytes) -> StoreResult<ContentAddress>;

    /// Durably store a structured value and return its address.
    async fn put_structured(&self, value: &Value) -> StoreResult<ContentAddress>;

    /// Read a structured value back. `Ok(None)` if it is not stored.
    async fn get_structured(&self, address: &ContentAddress) -> StoreResult<Option<Value>>;
}
