use crate::embedding::EmbeddingError;
use crate::index::IndexError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for casedex
#[derive(Error, Debug)]
pub enum CasedexError {
    /// Invalid chunking parameters or other configuration problems
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Query or new vectors disagree with a store's established dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Namespace has never been ingested
    #[error("No store exists for case '{namespace}'")]
    StoreAbsent { namespace: String },

    /// Persisted artifacts failed the consistency check on load
    #[error("Store for case '{namespace}' is corrupted: {reason}")]
    IndexCorruption { namespace: String, reason: String },

    /// The store was committed by someone else after this copy was loaded
    #[error("Case '{namespace}' changed since load: generation {committed}, copy at {loaded}")]
    StaleStore {
        namespace: String,
        committed: u64,
        loaded: u64,
    },

    /// Another writer currently holds the namespace
    #[error("Case '{namespace}' is being written by another process (PID: {holder_pid})")]
    WriterConflict { namespace: String, holder_pid: u32 },

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(#[source] EmbeddingError),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CasedexError {
    pub(crate) fn io(source: std::io::Error, context: impl Into<String>) -> Self {
        Self::Io {
            source,
            context: context.into(),
        }
    }

    pub(crate) fn corruption(namespace: &str, reason: impl Into<String>) -> Self {
        Self::IndexCorruption {
            namespace: namespace.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<IndexError> for CasedexError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            other => Self::Other(anyhow::Error::new(other)),
        }
    }
}

impl From<EmbeddingError> for CasedexError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            other => Self::Embedding(other),
        }
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for casedex operations
pub type Result<T> = std::result::Result<T, CasedexError>;
