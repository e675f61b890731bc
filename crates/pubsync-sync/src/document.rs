use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{DocumentError, DocumentResult};

/// Open field map of a publication document.
pub type DocumentFields = BTreeMap<String, Value>;

/// Key-value documents holding publication descriptors.
///
/// The synchronizer only ever reads whole documents and writes single
/// fields; `update_field` is a scoped read-modify-write.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn read(&self, doc: &str) -> DocumentResult<DocumentFields>;
    async fn update_field(&self, doc: &str, key: &str, value: Value) -> DocumentResult<()>;
    async fn create(&self, doc: &str, fields: DocumentFields) -> DocumentResult<()>;

    /// Take the exclusive writer lock of `doc`. Fails with
    /// [`DocumentError::Locked`] while another holder has it.
    async fn lock(&self, doc: &str) -> DocumentResult<DocumentLock>;
}

/// Exclusive writer lock on one document, released on drop.
#[derive(Debug)]
pub struct DocumentLock {
    release: Release,
}

#[derive(Debug)]
enum Release {
    Memory {
        held: Arc<Mutex<HashSet<String>>>,
        doc: String,
    },
    File(PathBuf),
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        match &self.release {
            Release::Memory { held, doc } => {
                if let Ok(mut held) = held.lock() {
                    held.remove(doc);
                }
            }
            Release::File(path) => {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!(path = %path.display(), error = %e, "could not remove lock file");
                }
            }
        }
    }
}

/// In-memory document store for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    docs: RwLock<HashMap<String, DocumentFields>>,
    locked: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of one field.
    pub fn field(&self, doc: &str, key: &str) -> Option<Value> {
        self.docs
            .read()
            .expect("lock poisoned")
            .get(doc)
            .and_then(|fields| fields.get(key).cloned())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn read(&self, doc: &str) -> DocumentResult<DocumentFields> {
        self.docs
            .read()
            .expect("lock poisoned")
            .get(doc)
            .cloned()
            .ok_or_else(|| DocumentError::NotFound(doc.to_string()))
    }

    async fn update_field(&self, doc: &str, key: &str, value: Value) -> DocumentResult<()> {
        let mut docs = self.docs.write().expect("lock poisoned");
        let fields = docs
            .get_mut(doc)
            .ok_or_else(|| DocumentError::NotFound(doc.to_string()))?;
        fields.insert(key.to_string(), value);
        Ok(())
    }

    async fn create(&self, doc: &str, fields: DocumentFields) -> DocumentResult<()> {
        let mut docs = self.docs.write().expect("lock poisoned");
        if docs.contains_key(doc) {
            return Err(DocumentError::AlreadyExists(doc.to_string()));
        }
        docs.insert(doc.to_string(), fields);
        Ok(())
    }

    async fn lock(&self, doc: &str) -> DocumentResult<DocumentLock> {
        if !self.locked.lock().expect("lock poisoned").insert(doc.to_string()) {
            return Err(DocumentError::Locked(doc.to_string()));
        }
        Ok(DocumentLock {
            release: Release::Memory {
                held: self.locked.clone(),
                doc: doc.to_string(),
            },
        })
    }
}

/// One pretty-printed JSON object per document: `<root>/<doc>.json`.
///
/// Writes go through a temporary file renamed into place; field updates
/// within this process are serialized. Writer locks are `<root>/.<doc>.lock`
/// files created exclusively, so they hold across processes sharing the
/// directory. A process killed mid-pass leaves its lock file behind; it
/// names the holder's pid and must be removed by hand.
#[derive(Debug)]
pub struct FsDocumentStore {
    root: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FsDocumentStore {
    pub fn open(root: impl Into<PathBuf>) -> DocumentResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock_path_for(&self, doc: &str) -> DocumentResult<PathBuf> {
        self.path_for(doc)?;
        Ok(self.root.join(format!(".{doc}.lock")))
    }

    fn path_for(&self, doc: &str) -> DocumentResult<PathBuf> {
        let valid = !doc.is_empty()
            && !doc.starts_with('.')
            && doc
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(DocumentError::InvalidId(doc.to_string()));
        }
        Ok(self.root.join(format!("{doc}.json")))
    }

    async fn load(&self, doc: &str, path: &Path) -> DocumentResult<DocumentFields> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DocumentError::NotFound(doc.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| DocumentError::Malformed {
            id: doc.to_string(),
            reason: e.to_string(),
        })
    }

    async fn save(&self, doc: &str, path: PathBuf, fields: &DocumentFields) -> DocumentResult<()> {
        let mut bytes = serde_json::to_vec_pretty(fields).map_err(|e| DocumentError::Malformed {
            id: doc.to_string(),
            reason: e.to_string(),
        })?;
        bytes.push(b'\n');
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || -> DocumentResult<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&root)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| DocumentError::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| DocumentError::Io(std::io::Error::other(e.to_string())))??;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn read(&self, doc: &str) -> DocumentResult<DocumentFields> {
        let path = self.path_for(doc)?;
        self.load(doc, &path).await
    }

    async fn update_field(&self, doc: &str, key: &str, value: Value) -> DocumentResult<()> {
        let path = self.path_for(doc)?;
        let _guard = self.write_lock.lock().await;
        let mut fields = self.load(doc, &path).await?;
        fields.insert(key.to_string(), value);
        self.save(doc, path, &fields).await?;
        debug!(doc, key, "document field updated");
        Ok(())
    }

    async fn create(&self, doc: &str, fields: DocumentFields) -> DocumentResult<()> {
        let path = self.path_for(doc)?;
        let _guard = self.write_lock.lock().await;
        if tokio::fs::try_exists(&path).await? {
            return Err(DocumentError::AlreadyExists(doc.to_string()));
        }
        self.save(doc, path, &fields).await
    }

    async fn lock(&self, doc: &str) -> DocumentResult<DocumentLock> {
        let path = self.lock_path_for(doc)?;
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(DocumentError::Locked(doc.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let lock = DocumentLock {
            release: Release::File(path),
        };
        file.write_all(format!("{}\n", std::process::id()).as_bytes())
            .await?;
        debug!(doc, "document locked");
        Ok(lock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields() -> DocumentFields {
        DocumentFields::from([
            ("name".to_string(), json!("unamore")),
            ("contract".to_string(), json!("0xabc")),
        ])
    }

    #[tokio::test]
    async fn in_memory_update_and_read() {
        let store = InMemoryDocumentStore::new();
        store.create("unamore", fields()).await.unwrap();
        store.update_field("unamore", "status", json!("ok")).await.unwrap();
        let doc = store.read("unamore").await.unwrap();
        assert_eq!(doc["status"], json!("ok"));
        assert_eq!(store.field("unamore", "name"), Some(json!("unamore")));
        assert!(matches!(
            store.create("unamore", fields()).await,
            Err(DocumentError::AlreadyExists(_))
        ));
        assert!(matches!(
            store.update_field("other", "status", json!("ok")).await,
            Err(DocumentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn fs_update_preserves_other_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::open(dir.path()).unwrap();
        store.create("unamore", fields()).await.unwrap();
        store.update_field("unamore", "status", json!("failed")).await.unwrap();

        let reopened = FsDocumentStore::open(dir.path()).unwrap();
        let doc = reopened.read("unamore").await.unwrap();
        assert_eq!(doc["name"], json!("unamore"));
        assert_eq!(doc["status"], json!("failed"));
        assert!(dir.path().join("unamore.json").exists());
    }

    #[tokio::test]
    async fn fs_rejects_bad_ids_and_missing_docs() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.read("../escape").await,
            Err(DocumentError::InvalidId(_))
        ));
        assert!(matches!(
            store.read("missing").await,
            Err(DocumentError::NotFound(_))
        ));
        std::fs::write(dir.path().join("broken.json"), b"not json").unwrap();
        assert!(matches!(
            store.read("broken").await,
            Err(DocumentError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn in_memory_lock_is_exclusive_until_dropped() {
        let store = InMemoryDocumentStore::new();
        let lock = store.lock("unamore").await.unwrap();
        assert!(matches!(store.lock("unamore").await, Err(DocumentError::Locked(_))));
        let other = store.lock("other").await.unwrap();
        drop(lock);
        store.lock("unamore").await.unwrap();
        drop(other);
    }

    #[tokio::test]
    async fn fs_lock_holds_across_store_instances() {
        let dir = tempfile::tempdir().unwrap();
        let first = FsDocumentStore::open(dir.path()).unwrap();
        let second = FsDocumentStore::open(dir.path()).unwrap();

        let lock = first.lock("unamore").await.unwrap();
        let lock_file = dir.path().join(".unamore.lock");
        assert!(lock_file.exists());
        assert!(matches!(second.lock("unamore").await, Err(DocumentError::Locked(_))));

        drop(lock);
        assert!(!lock_file.exists());
        second.lock("unamore").await.unwrap();
        assert!(matches!(
            second.lock("../escape").await,
            Err(DocumentError::InvalidId(_))
        ));
    }
}
