use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::address::ContentAddress;

/// One published file: its stable logical path and its content address.
///
/// Serialized with the `cid` key so manifests stay readable by renderers that
/// consume the published configuration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    #[serde(rename = "cid")]
    pub content_address: ContentAddress,
}

impl ManifestEntry {
    pub fn new(path: impl Into<String>, content_address: ContentAddress) -> Self {
        Self {
            path: path.into(),
            content_address,
        }
    }
}

/// A template entry: a [`ManifestEntry`] plus the rewritten body that was
/// content-addressed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateEntry {
    #[serde(flatten)]
    pub entry: ManifestEntry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl TemplateEntry {
    pub fn new(entry: ManifestEntry, body: Option<String>) -> Self {
        Self { entry, body }
    }

    pub fn path(&self) -> &str {
        &self.entry.path
    }

    pub fn content_address(&self) -> ContentAddress {
        self.entry.content_address
    }
}

/// A listing entry from a source tree: logical path plus fetch URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub url: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            url: url.into(),
        }
    }

    /// File extension of the path, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let name = self.path.rsplit('/').next()?;
        let (_, ext) = name.rsplit_once('.')?;
        Some(ext)
    }
}

/// Raw content fetched for one source path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedFile {
    pub path: String,
    pub bytes: Bytes,
}

impl FetchedFile {
    pub fn new(path: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
        }
    }
}
