//! Error types for the classification engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, ClassifierError>;

/// Error types that can occur while storing, querying or classifying vectors
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// Two vectors of unequal length were passed to a metric.
    #[error("Length mismatch: left has {left} values, right has {right}")]
    LengthMismatch { left: usize, right: usize },

    /// A vector disagrees with the dimensionality established by the store.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("No neighbors to aggregate")]
    NoNeighbors,

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Invalid vector: {reason}")]
    InvalidVector { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl ClassifierError {
    /// Build the error returned when a store lock was poisoned by a panicking writer.
    pub(crate) fn poisoned(what: &str) -> Self {
        ClassifierError::BackendUnavailable(format!("{} lock poisoned", what))
    }
}
