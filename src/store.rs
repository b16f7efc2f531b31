//! Store trait for pluggable storage backends

use crate::error::{ClassifierError, Result};
use crate::record::{Metadata, Neighbor, RecordId};
use crate::vector::FeatureVector;

/// A vector store that supports insert-only ingest and k-NN queries.
///
/// Implementations guard their state with a reader-writer lock so a shared
/// `Arc<dyn VectorStore>` can serve concurrent queries while `add` calls are
/// serialized against everything else.
pub trait VectorStore: Send + Sync + std::fmt::Debug {
    /// Insert a new labeled record and return its assigned id.
    ///
    /// The first insertion fixes the store's dimensionality.
    fn add(
        &self,
        id_hint: &str,
        label: &str,
        vector: FeatureVector,
        metadata: Metadata,
    ) -> Result<RecordId>;

    /// Return at most `k` neighbors of `query`, sorted by ascending distance.
    /// An empty store yields an empty list.
    fn query(&self, query: &FeatureVector, k: usize) -> Result<Vec<Neighbor>>;

    /// The number of records in this store.
    fn len(&self) -> usize;

    /// Whether the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Established dimensionality, if any.
    fn dimension(&self) -> Option<usize>;

    /// Short backend name for logs and health output.
    fn kind(&self) -> &'static str;
}

/// Fail with `DimensionMismatch` when `actual` disagrees with an established dimension.
pub(crate) fn check_dimension(expected: Option<usize>, actual: usize) -> Result<()> {
    match expected {
        Some(expected) if expected != actual => {
            Err(ClassifierError::DimensionMismatch { expected, actual })
        }
        _ => Ok(()),
    }
}
