use async_trait::async_trait;
use bytes::Bytes;
use pubsync_types::{Category, SourceFile};

use crate::error::SourceResult;

/// A remote, revision-pinned file tree.
///
/// Implementations must surface failures as errors (never hang) and must
/// list in a deterministic order.
#[async_trait]
pub trait SourceTree: Send + Sync {
    /// List every file under the category's folder, recursively.
    async fn list(&self, category: Category) -> SourceResult<Vec<SourceFile>>;

    /// Fetch the raw content behind a listing URL.
    async fn fetch(&self, url: &str) -> SourceResult<Bytes>;

    /// URL of an arbitrary path at the pinned revision (e.g. `mapping.json`).
    fn url_for(&self, path: &str) -> String;
}
