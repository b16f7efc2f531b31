//! Serialization utilities: bincode for records, JSON for manifests and config.

use crate::collection::StoredRow;
use crate::error::{ClassifierError, Result};
use serde::{Deserialize, Serialize};

/// Serializable representation of a whole collection.
#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    pub name: String,
    pub rows: Vec<StoredRow>,
    pub dimension: Option<usize>,
}

/// Human-readable summary written next to each snapshot.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SnapshotManifest {
    pub name: String,
    pub record_count: usize,
    pub dimension: Option<usize>,
}

impl From<&CollectionSnapshot> for SnapshotManifest {
    fn from(snapshot: &CollectionSnapshot) -> Self {
        Self {
            name: snapshot.name.clone(),
            record_count: snapshot.rows.len(),
            dimension: snapshot.dimension,
        }
    }
}

/// Encode data to bincode bytes.
pub fn to_bincode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| ClassifierError::SerializationError(e.to_string()))
}

/// Decode data from bincode bytes.
pub fn from_bincode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| ClassifierError::SerializationError(e.to_string()))
}

/// Encode data to pretty-printed JSON bytes.
pub fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|e| ClassifierError::SerializationError(e.to_string()))
}

/// Decode data from JSON bytes.
pub fn from_json<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| ClassifierError::SerializationError(e.to_string()))
}
