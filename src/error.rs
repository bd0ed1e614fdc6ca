use std::error::Error as StdError;
use std::sync::Arc;

/// Loader failures are shared between every waiter of a single load, hence the `Arc`.
pub type SharedSource = Arc<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum DaoError {
    /// The backing store could not produce data for a key. Every caller that waited on the same load gets the same
    /// `source`.
    #[error("[{operation}] data unavailable for key {key}: {source}")]
    BackingStore {
        operation: &'static str,
        key:       String,
        #[source]
        source:    SharedSource,
    },

    /// Only produced by accessors which treat an empty answer as an error.
    #[error("no data found for key {key}")]
    NotFound { key: String },

    #[error("malformed key: field '{field}' {reason}")]
    MalformedKey { field: String, reason: String },

    #[error("cache entry {operation} failed: {reason}")]
    Compression { operation: &'static str, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("no DAO registered under name '{name}'")]
    Unregistered { name: String },

    #[error("DAO '{name}' is registered with a different type")]
    TypeMismatch { name: String },

    #[error("DAO registry has already been initialized")]
    RegistryInitialized,
}

impl DaoError {
    pub(crate) fn backing_store(operation: &'static str, key: impl ToString, source: SharedSource) -> Self {
        Self::BackingStore {
            operation,
            key: key.to_string(),
            source,
        }
    }

    pub(crate) fn malformed_key(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedKey {
            field:  field.into(),
            reason: reason.into(),
        }
    }

    pub fn is_backing_store(&self) -> bool {
        matches!(self, Self::BackingStore { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T, E = DaoError> = std::result::Result<T, E>;
