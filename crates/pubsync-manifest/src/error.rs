use pubsync_store::StoreError;
use pubsync_types::Category;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("field {field} has an unexpected shape: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("duplicate path in {category}: {path}")]
    DuplicatePath { category: Category, path: String },

    #[error("manifest could not be decoded: {0}")]
    Decode(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<serde_json::Error> for ManifestError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type ManifestResult<T> = Result<T, ManifestError>;
