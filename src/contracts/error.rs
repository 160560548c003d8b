use thiserror::Error;

/// Boxed error returned by computed prefix/suffix functions.
pub type AffixError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum SequenceError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Counter store has not been initialized")]
    NotInitialized,

    #[error("Failed to initialize counter store: {0}")]
    Initialize(#[source] StorageError),

    #[error("Storage error for counter {model}/{field}: {source}")]
    Store {
        model: String,
        field: String,
        #[source]
        source: StorageError,
    },

    #[error("Failed to compute {part} for counter {model}/{field}: {source}")]
    Affix {
        model: String,
        field: String,
        part: &'static str,
        #[source]
        source: AffixError,
    },
}

impl SequenceError {
    /// Shorthand for a configuration error.
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("RocksDB error: {0}")]
    RocksDb(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Counter already exists: {model}/{field}")]
    DuplicateKey { model: String, field: String },

    #[error("Counter not found: {model}/{field}")]
    CounterNotFound { model: String, field: String },

    #[error("Counter overflow: {model}/{field}")]
    CounterOverflow { model: String, field: String },

    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Incompatible counter collection: {0}")]
    IncompatibleCollection(String),
}

impl StorageError {
    /// Returns true if the error is an optimistic-concurrency conflict worth retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
