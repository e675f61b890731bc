use pubsync_types::ContentAddress;

/// Errors from content store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Content hash mismatch on read, or a backend returned an address that
    /// differs from the dry-run address of the same bytes.
    #[error("hash mismatch for {address}: computed {computed}")]
    HashMismatch {
        address: ContentAddress,
        computed: ContentAddress,
    },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Attempted to store under the null address.
    #[error("cannot store object with null address")]
    NullAddress,

    /// The backend could not be reached or refused the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
