//! Indexed store: approximate k-NN delegated to an inner-product index

use std::collections::HashSet;
use std::sync::RwLock;

use crate::ann::AnnIndex;
use crate::error::{ClassifierError, Result};
use crate::knn;
use crate::record::{timestamped_id, unique_against, Metadata, Neighbor, RecordId};
use crate::store::{check_dimension, VectorStore};
use crate::vector::FeatureVector;

/// What a handle stands for. Position in the table is the index handle.
#[derive(Debug, Clone)]
struct HandleEntry {
    id: RecordId,
    label: String,
    metadata: Metadata,
}

#[derive(Debug)]
struct IndexedInner {
    index: Box<dyn AnnIndex>,
    handles: Vec<HandleEntry>,
    ids: HashSet<RecordId>,
}

/// A store whose dimensionality is fixed by its index at construction.
///
/// Similarity is the index's inner product; with normalisation on (the
/// default) that is cosine similarity, and the reported distance is
/// `1 - similarity` clamped at zero.
#[derive(Debug)]
pub struct IndexedStore {
    inner: RwLock<IndexedInner>,
    normalize: bool,
    dimension: usize,
}

impl IndexedStore {
    pub fn new(index: Box<dyn AnnIndex>, normalize: bool) -> Self {
        let dimension = index.dimension();
        tracing::info!(dimension, normalize, "indexed store created");
        Self {
            inner: RwLock::new(IndexedInner {
                index,
                handles: Vec::new(),
                ids: HashSet::new(),
            }),
            normalize,
            dimension,
        }
    }

    pub fn normalizes(&self) -> bool {
        self.normalize
    }

    /// Unit-length copy when normalisation is on. Zero vectors pass through unchanged.
    fn prepare(&self, vector: &FeatureVector) -> FeatureVector {
        if !self.normalize {
            return vector.clone();
        }
        vector.normalized().unwrap_or_else(|_| vector.clone())
    }
}

impl VectorStore for IndexedStore {
    fn add(
        &self,
        id_hint: &str,
        label: &str,
        vector: FeatureVector,
        mut metadata: Metadata,
    ) -> Result<RecordId> {
        check_dimension(Some(self.dimension), vector.dimension())?;
        vector.ensure_finite()?;
        let prepared = self.prepare(&vector);

        let mut inner = self
            .inner
            .write()
            .map_err(|_| ClassifierError::poisoned("indexed store"))?;

        // A previous add left the index ahead of the handle table
        let expected = inner.handles.len();
        if inner.index.len() != expected {
            return Err(ClassifierError::BackendUnavailable(format!(
                "index holds {} vectors but {} records are mapped",
                inner.index.len(),
                expected
            )));
        }

        let id = unique_against(&inner.ids, timestamped_id(id_hint));
        let handle = inner.index.add(&prepared)?;
        if handle != expected {
            // The vector stays in the index; later adds fail the check above
            return Err(ClassifierError::BackendUnavailable(format!(
                "index returned handle {} but {} records are mapped",
                handle, expected
            )));
        }

        metadata.insert(Metadata::LABEL_KEY, label);
        if metadata.get(Metadata::NAME_KEY).is_none() {
            metadata.insert(Metadata::NAME_KEY, id_hint);
        }
        inner.ids.insert(id.clone());
        inner.handles.push(HandleEntry {
            id: id.clone(),
            label: label.to_string(),
            metadata,
        });

        tracing::debug!(%id, label, handle, "record indexed");
        Ok(id)
    }

    fn query(&self, query: &FeatureVector, k: usize) -> Result<Vec<Neighbor>> {
        knn::validate_k(k)?;
        let inner = self
            .inner
            .read()
            .map_err(|_| ClassifierError::poisoned("indexed store"))?;
        if inner.handles.is_empty() {
            return Ok(Vec::new());
        }
        check_dimension(Some(self.dimension), query.dimension())?;
        query.ensure_finite()?;

        let k = k.min(inner.handles.len());
        let hits = inner.index.search(&self.prepare(query), k)?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (handle, score) in hits.matches() {
            if !seen.insert(handle) {
                continue;
            }
            let entry = inner.handles.get(handle).ok_or_else(|| {
                ClassifierError::BackendUnavailable(format!("index returned unknown handle {}", handle))
            })?;
            out.push(Neighbor {
                id: entry.id.clone(),
                label: entry.label.clone(),
                distance: (1.0 - score).max(0.0),
                metadata: entry.metadata.clone(),
            });
        }
        Ok(knn::rank(out, k))
    }

    fn len(&self) -> usize {
        self.inner
            .read()
            .map(|inner| inner.handles.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().handles.len())
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }

    fn kind(&self) -> &'static str {
        "indexed"
    }
}
