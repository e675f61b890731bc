use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use pubsync_types::{Category, SourceFile};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{SourceError, SourceResult};
use crate::layout::FolderLayout;
use crate::traits::SourceTree;

const SCHEME: &str = "file://";

/// Source tree backed by a local checkout of the site repository.
///
/// Listing walks the category folder recursively and returns files sorted
/// by their `/`-separated path relative to the root. URLs are `file://`
/// URLs that stay inside the root; anything else is rejected on fetch.
#[derive(Clone, Debug)]
pub struct LocalSourceTree {
    root: PathBuf,
    layout: FolderLayout,
}

impl LocalSourceTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_layout(root, FolderLayout::default())
    }

    pub fn with_layout(root: impl Into<PathBuf>, layout: FolderLayout) -> Self {
        Self {
            root: root.into(),
            layout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, url: &str) -> SourceResult<PathBuf> {
        let relative = url
            .strip_prefix(SCHEME)
            .and_then(|rest| rest.strip_prefix(self.root.to_string_lossy().as_ref()))
            .map(|rest| rest.trim_start_matches('/'))
            .ok_or_else(|| SourceError::InvalidUrl(url.to_string()))?;
        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(SourceError::InvalidUrl(url.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

#[async_trait]
impl SourceTree for LocalSourceTree {
    async fn list(&self, category: Category) -> SourceResult<Vec<SourceFile>> {
        let folder = self.root.join(self.layout.folder(category));
        if !tokio::fs::try_exists(&folder).await? {
            debug!(category = %category, folder = %folder.display(), "category folder absent");
            return Ok(Vec::new());
        }
        let root = self.root.clone();
        let mut paths = tokio::task::spawn_blocking(move || -> SourceResult<Vec<String>> {
            let mut paths = Vec::new();
            for entry in WalkDir::new(&folder).follow_links(false) {
                let entry = entry.map_err(|e| SourceError::Unreachable(e.to_string()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                if let Some(path) = relative_path(&root, entry.path()) {
                    paths.push(path);
                }
            }
            Ok(paths)
        })
        .await
        .map_err(|e| SourceError::Unreachable(e.to_string()))??;
        paths.sort();
        Ok(paths
            .into_iter()
            .map(|path| {
                let url = self.url_for(&path);
                SourceFile::new(path, url)
            })
            .collect())
    }

    async fn fetch(&self, url: &str) -> SourceResult<Bytes> {
        let path = self.resolve(url)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SourceError::NotFound(url.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!(
            "{SCHEME}{}/{}",
            self.root.to_string_lossy().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkout() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("assets/icons")).unwrap();
        std::fs::create_dir_all(root.join("css")).unwrap();
        std::fs::write(root.join("assets/logo.png"), b"png").unwrap();
        std::fs::write(root.join("assets/icons/menu.svg"), b"svg").unwrap();
        std::fs::write(root.join("css/site.css"), b"body {}").unwrap();
        std::fs::write(root.join("mapping.json"), b"[]").unwrap();
        dir
    }

    #[tokio::test]
    async fn lists_recursively_sorted() {
        let dir = checkout();
        let tree = LocalSourceTree::new(dir.path());
        let assets = tree.list(Category::Assets).await.unwrap();
        let paths: Vec<_> = assets.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["assets/icons/menu.svg", "assets/logo.png"]);
    }

    #[tokio::test]
    async fn absent_folder_lists_nothing() {
        let dir = checkout();
        let tree = LocalSourceTree::new(dir.path());
        assert!(tree.list(Category::Templates).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetches_listed_and_root_files() {
        let dir = checkout();
        let tree = LocalSourceTree::new(dir.path());
        let css = &tree.list(Category::Stylesheets).await.unwrap()[0];
        assert_eq!(tree.fetch(&css.url).await.unwrap(), Bytes::from("body {}"));
        let mapping = tree.fetch(&tree.url_for("mapping.json")).await.unwrap();
        assert_eq!(mapping, Bytes::from("[]"));
    }

    #[tokio::test]
    async fn rejects_escaping_urls() {
        let dir = checkout();
        let tree = LocalSourceTree::new(dir.path());
        let escaping = tree.url_for("../etc/passwd");
        assert!(matches!(
            tree.fetch(&escaping).await,
            Err(SourceError::InvalidUrl(_))
        ));
        assert!(matches!(
            tree.fetch("file:///etc/passwd").await,
            Err(SourceError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = checkout();
        let tree = LocalSourceTree::new(dir.path());
        assert!(matches!(
            tree.fetch(&tree.url_for("css/gone.css")).await,
            Err(SourceError::NotFound(_))
        ));
    }
}
