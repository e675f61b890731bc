use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use pubsync_types::{Category, SourceFile};

use crate::error::{SourceError, SourceResult};
use crate::layout::FolderLayout;
use crate::traits::SourceTree;

const SCHEME: &str = "mem://";

/// In-memory source tree for tests and embedding.
///
/// Files are kept in a `BTreeMap`, so listings come back sorted by path.
/// Individual paths can be marked unreachable to simulate fetch failures.
pub struct InMemorySourceTree {
    layout: FolderLayout,
    files: RwLock<BTreeMap<String, Bytes>>,
    unreachable: RwLock<BTreeSet<String>>,
    fetches: AtomicUsize,
}

impl InMemorySourceTree {
    pub fn new() -> Self {
        Self::with_layout(FolderLayout::default())
    }

    pub fn with_layout(layout: FolderLayout) -> Self {
        Self {
            layout,
            files: RwLock::new(BTreeMap::new()),
            unreachable: RwLock::new(BTreeSet::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Add or replace a file.
    pub fn insert(&self, path: impl Into<String>, bytes: impl Into<Bytes>) {
        self.files
            .write()
            .expect("lock poisoned")
            .insert(path.into(), bytes.into());
    }

    pub fn remove(&self, path: &str) -> bool {
        self.files.write().expect("lock poisoned").remove(path).is_some()
    }

    /// Make every fetch of `path` fail until [`Self::restore`] is called.
    pub fn mark_unreachable(&self, path: impl Into<String>) {
        self.unreachable
            .write()
            .expect("lock poisoned")
            .insert(path.into());
    }

    pub fn restore(&self, path: &str) {
        self.unreachable.write().expect("lock poisoned").remove(path);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Default for InMemorySourceTree {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceTree for InMemorySourceTree {
    async fn list(&self, category: Category) -> SourceResult<Vec<SourceFile>> {
        let prefix = self.layout.prefix(category);
        let files = self.files.read().expect("lock poisoned");
        Ok(files
            .keys()
            .filter(|path| path.starts_with(&prefix))
            .map(|path| SourceFile::new(path.clone(), self.url_for(path)))
            .collect())
    }

    async fn fetch(&self, url: &str) -> SourceResult<Bytes> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let path = url
            .strip_prefix(SCHEME)
            .ok_or_else(|| SourceError::InvalidUrl(url.to_string()))?;
        if self.unreachable.read().expect("lock poisoned").contains(path) {
            return Err(SourceError::Unreachable(url.to_string()));
        }
        self.files
            .read()
            .expect("lock poisoned")
            .get(path)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(path.to_string()))
    }

    fn url_for(&self, path: &str) -> String {
        format!("{SCHEME}{path}")
    }
}
