use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use pubsync_types::ContentAddress;
use serde_json::Value;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectKind, StoredObject};
use crate::traits::ContentStore;

/// Filesystem-backed content store.
///
/// On-disk layout:
/// ```text
/// <root>/blob/<2 hex>/<62 hex>
/// <root>/structured/<2 hex>/<62 hex>
/// ```
/// Objects are written to a temporary file in the root and renamed into
/// place, so a reader never observes a partially written object.
#[derive(Clone, Debug)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, kind: ObjectKind, address: &ContentAddress) -> PathBuf {
        let hex = address.to_hex();
        self.root.join(kind.as_str()).join(&hex[..2]).join(&hex[2..])
    }

    async fn write(&self, object: StoredObject) -> StoreResult<ContentAddress> {
        let address = object.compute_address();
        if address.is_null() {
            return Err(StoreError::NullAddress);
        }
        let path = self.object_path(object.kind, &address);
        if tokio::fs::try_exists(&path).await? {
            return Ok(address);
        }
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || -> StoreResult<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut tmp = tempfile::NamedTempFile::new_in(&root)?;
            tmp.write_all(&object.data)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))??;
        debug!(address = %address.short_hex(), "object written");
        Ok(address)
    }

    async fn read(&self, kind: ObjectKind, address: &ContentAddress) -> StoreResult<Option<StoredObject>> {
        let path = self.object_path(kind, address);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let object = StoredObject::new(kind, data);
        let computed = object.compute_address();
        if computed != *address {
            return Err(StoreError::HashMismatch {
                address: *address,
                computed,
            });
        }
        Ok(Some(object))
    }

    /// Raw bytes of a stored blob.
    pub async fn read_blob(&self, address: &ContentAddress) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.read(ObjectKind::Blob, address).await?.map(|o| o.data))
    }
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn put(&self, bytes: Bytes) -> StoreResult<ContentAddress> {
        self.write(StoredObject::new(ObjectKind::Blob, bytes.to_vec()))
            .await
    }

    async fn put_structured(&self, value: &Value) -> StoreResult<ContentAddress> {
        self.write(StoredObject::structured(value)?).await
    }

    async fn get_structured(&self, address: &ContentAddress) -> StoreResult<Option<Value>> {
        match self.read(ObjectKind::Structured, address).await? {
            Some(object) => object.to_value().map(Some),
            None => Ok(None),
        }
    }
}
