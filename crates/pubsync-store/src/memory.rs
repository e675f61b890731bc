use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use pubsync_types::ContentAddress;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::hasher::ContentHasher;
use crate::object::{ObjectKind, StoredObject};
use crate::traits::ContentStore;

/// In-memory, HashMap-based content store.
///
/// Intended for tests and embedding. Besides the objects it keeps a log of
/// every durable blob upload, so callers can assert how many uploads a
/// synchronization pass actually paid for.
pub struct InMemoryContentStore {
    objects: RwLock<HashMap<ContentAddress, StoredObject>>,
    put_log: Mutex<Vec<ContentAddress>>,
    structured_puts: AtomicUsize,
    hashes: AtomicUsize,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            put_log: Mutex::new(Vec::new()),
            structured_puts: AtomicUsize::new(0),
            hashes: AtomicUsize::new(0),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Addresses of every `put` call, in call order (duplicates included).
    pub fn put_log(&self) -> Vec<ContentAddress> {
        self.put_log.lock().expect("lock poisoned").clone()
    }

    /// Number of `put` calls so far.
    pub fn put_count(&self) -> usize {
        self.put_log.lock().expect("lock poisoned").len()
    }

    /// Number of `put_structured` calls so far.
    pub fn structured_put_count(&self) -> usize {
        self.structured_puts.load(Ordering::SeqCst)
    }

    /// Number of dry-run `hash` calls so far.
    pub fn hash_count(&self) -> usize {
        self.hashes.load(Ordering::SeqCst)
    }

    /// Forget the call counters, keeping stored objects.
    pub fn reset_counters(&self) {
        self.put_log.lock().expect("lock poisoned").clear();
        self.structured_puts.store(0, Ordering::SeqCst);
        self.hashes.store(0, Ordering::SeqCst);
    }

    /// Raw bytes of a stored blob.
    pub fn blob(&self, address: &ContentAddress) -> Option<Vec<u8>> {
        let map = self.objects.read().expect("lock poisoned");
        map.get(address)
            .filter(|obj| obj.kind == ObjectKind::Blob)
            .map(|obj| obj.data.clone())
    }

    pub fn contains(&self, address: &ContentAddress) -> bool {
        self.objects
            .read()
            .expect("lock poisoned")
            .contains_key(address)
    }

    fn insert(&self, object: StoredObject) -> StoreResult<ContentAddress> {
        let address = object.compute_address();
        if address.is_null() {
            return Err(StoreError::NullAddress);
        }
        let mut map = self.objects.write().expect("lock poisoned");
        map.entry(address).or_insert(object);
        Ok(address)
    }
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn hash(&self, bytes: &[u8]) -> StoreResult<ContentAddress> {
        self.hashes.fetch_add(1, Ordering::SeqCst);
        Ok(ContentHasher::BLOB.hash(bytes))
    }

    async fn put(&self, bytes: Bytes) -> StoreResult<ContentAddress> {
        let address = self.insert(StoredObject::new(ObjectKind::Blob, bytes.to_vec()))?;
        self.put_log.lock().expect("lock poisoned").push(address);
        Ok(address)
    }

    async fn put_structured(&self, value: &Value) -> StoreResult<ContentAddress> {
        let address = self.insert(StoredObject::structured(value)?)?;
        self.structured_puts.fetch_add(1, Ordering::SeqCst);
        Ok(address)
    }

    async fn get_structured(&self, address: &ContentAddress) -> StoreResult<Option<Value>> {
        let map = self.objects.read().expect("lock poisoned");
        match map.get(address) {
            Some(obj) => obj.to_value().map(Some),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for InMemoryContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryContentStore")
            .field("object_count", &self.len())
            .field("put_count", &self.put_count())
            .finish()
    }
}
