use std::path::Path;

use pubsync_source::FolderLayout;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Synchronizer settings, usually read from `pubsync.toml`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL templates use to reference stored content. A publication's
    /// own `assets_gateway` field takes precedence.
    pub gateway: String,
    /// Fetch and hash operations in flight per category.
    pub concurrency: usize,
    /// Full passes attempted before a retryable failure is reported.
    pub max_attempts: u32,
    /// Routing document fetched from the source root. Empty disables it.
    pub mapping_path: Option<String>,
    pub folders: FolderLayout,
    pub stylesheet_extension: String,
    /// File name of the template that links the site stylesheet. Other
    /// templates keep their own links.
    pub head_template: String,
    pub proposal_method: String,
    /// Governance method that admits a new author.
    pub author_method: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            gateway: "http://127.0.0.1:8080/objects".into(),
            concurrency: 4,
            max_attempts: 1,
            mapping_path: Some("mapping.json".into()),
            folders: FolderLayout::default(),
            stylesheet_extension: "css".into(),
            head_template: "head.handlebars".into(),
            proposal_method: "proposeUpdateConfig".into(),
            author_method: "proposeWhitelistAuthor".into(),
        }
    }
}

impl SyncConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        if self.gateway.trim().is_empty() {
            return Err(ConfigError::Invalid("gateway must not be empty".into()));
        }
        if self.proposal_method.trim().is_empty() {
            return Err(ConfigError::Invalid("proposal_method must not be empty".into()));
        }
        if self.author_method.trim().is_empty() {
            return Err(ConfigError::Invalid("author_method must not be empty".into()));
        }
        Ok(())
    }

    /// Whether the stylesheet link of the template at `path` is rewritten.
    pub fn is_head_template(&self, path: &str) -> bool {
        let name = path.rsplit('/').next().unwrap_or(path);
        name == self.head_template
    }

    pub fn mapping_path(&self) -> Option<&str> {
        self.mapping_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = SyncConfig::default();
        assert_eq!(c.concurrency, 4);
        assert_eq!(c.max_attempts, 1);
        assert_eq!(c.mapping_path(), Some("mapping.json"));
        assert_eq!(c.folders.stylesheets, "css");
        assert_eq!(c.stylesheet_extension, "css");
        assert_eq!(c.proposal_method, "proposeUpdateConfig");
        assert_eq!(c.author_method, "proposeWhitelistAuthor");
        assert!(c.is_head_template("templates/head.handlebars"));
        assert!(!c.is_head_template("templates/footer.handlebars"));
        assert!(!c.is_head_template("templates/partials/head.handlebars.bak"));
        c.validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = SyncConfig::from_toml_str(
            r#"
            gateway = "https://gw.example/ipfs"
            max_attempts = 3
            mapping_path = ""

            [folders]
            stylesheets = "styles"
            "#,
        )
        .unwrap();
        assert_eq!(c.gateway, "https://gw.example/ipfs");
        assert_eq!(c.max_attempts, 3);
        assert_eq!(c.concurrency, 4);
        assert_eq!(c.mapping_path(), None);
        assert_eq!(c.folders.stylesheets, "styles");
        assert_eq!(c.folders.assets, "assets");
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            SyncConfig::from_toml_str("concurrency = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SyncConfig::from_toml_str("gateway = \" \""),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SyncConfig::from_toml_str("concurrency = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("pubsync.toml");
        assert!(matches!(
            SyncConfig::load(&missing),
            Err(ConfigError::Read { .. })
        ));
        std::fs::write(&missing, "concurrency = 2\n").unwrap();
        assert_eq!(SyncConfig::load(&missing).unwrap().concurrency, 2);
    }
}
