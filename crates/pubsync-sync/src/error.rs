use std::path::PathBuf;

use pubsync_manifest::ManifestError;
use pubsync_source::SourceError;
use pubsync_store::StoreError;
use pubsync_template::TemplateError;
use pubsync_types::Category;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("document already exists: {0}")]
    AlreadyExists(String),

    #[error("document {0} is locked by another writer")]
    Locked(String),

    #[error("invalid document id: {0:?}")]
    InvalidId(String),

    #[error("document {id} is malformed: {reason}")]
    Malformed { id: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DocumentResult<T> = Result<T, DocumentError>;

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("governance unavailable: {0}")]
    Unavailable(String),

    #[error("proposal rejected: {0}")]
    Rejected(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GovernanceResult<T> = Result<T, GovernanceError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failure of one synchronization pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Source tree unreachable or file missing.
    #[error("fetch failed for {path}: {source}")]
    Fetch {
        category: Option<Category>,
        path: String,
        #[source]
        source: SourceError,
    },

    /// Hash or upload call failed.
    #[error("store failed for {path}: {source}")]
    Store {
        category: Option<Category>,
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("template rewrite failed: {0}")]
    Template(#[from] TemplateError),

    /// Malformed metadata or an inconsistent manifest.
    #[error("aggregation failed: {0}")]
    Aggregation(#[from] ManifestError),

    /// The manifest is stored and recorded, only its proposal failed.
    #[error("proposal failed: {0}")]
    Proposal(#[source] GovernanceError),

    #[error("governance unavailable: {0}")]
    Unavailable(String),

    #[error("document error: {0}")]
    Document(#[source] DocumentError),

    #[error("a synchronization of {0} is already in flight")]
    AlreadyInFlight(String),

    #[error("synchronization cancelled")]
    Cancelled,

    #[error("invalid author address: {0:?}")]
    InvalidAuthor(String),
}

impl From<DocumentError> for SyncError {
    fn from(e: DocumentError) -> Self {
        match e {
            DocumentError::Locked(doc) => Self::AlreadyInFlight(doc),
            other => Self::Document(other),
        }
    }
}

impl SyncError {
    /// Fetch and store failures are transient; a full pass may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Store { .. })
    }

    pub fn category(&self) -> Option<Category> {
        match self {
            Self::Fetch { category, .. } | Self::Store { category, .. } => *category,
            _ => None,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Fetch { path, .. } | Self::Store { path, .. } => Some(path),
            _ => None,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
