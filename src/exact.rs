//! Exact store: brute-force O(n) k-NN over an in-memory mirror of a collection

use std::collections::HashSet;
use std::sync::RwLock;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::collection::{Collection, CollectionRows};
use crate::distance::DistanceMetric;
use crate::error::{ClassifierError, Result};
use crate::knn;
use crate::record::{timestamped_id, unique_against, Metadata, Neighbor, RecordId, VectorRecord};
use crate::store::{check_dimension, VectorStore};
use crate::vector::FeatureVector;

/// Below this many records the scan runs on the calling thread.
const PARALLEL_SCAN_THRESHOLD: usize = 1024;

/// How the Exact Store answers `query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalPath {
    /// Scan every cached record with the store's metric. Distances are traceable.
    #[default]
    LinearScan,
    /// Delegate to the backing collection's own nearest-neighbor query.
    Collection,
}

#[derive(Debug)]
struct ExactInner {
    collection: Box<dyn Collection>,
    records: Vec<VectorRecord>,
    ids: HashSet<RecordId>,
    dimension: Option<usize>,
}

impl ExactInner {
    fn unique_id(&self, hint: &str) -> RecordId {
        let base = timestamped_id(hint);
        unique_against(&self.ids, base)
    }
}

/// A store that keeps every record in memory, mirrored from a persistent
/// collection, and ranks by recomputing exact distances on every query.
#[derive(Debug)]
pub struct ExactStore {
    inner: RwLock<ExactInner>,
    metric: DistanceMetric,
    path: RetrievalPath,
}

impl ExactStore {
    /// Wrap `collection`, loading the in-memory cache from its current contents.
    pub fn open(
        collection: Box<dyn Collection>,
        metric: DistanceMetric,
        path: RetrievalPath,
    ) -> Result<Self> {
        if !metric.is_non_negative() {
            return Err(ClassifierError::InvalidArgument {
                reason: format!("metric {} can yield negative distances", metric.name()),
            });
        }
        let records = records_from_rows(collection.get_all()?)?;
        let ids = records.iter().map(|r| r.id.clone()).collect();
        let dimension = records.first().map(|r| r.vector.dimension());

        tracing::info!(
            collection = collection.name(),
            records = records.len(),
            metric = metric.name(),
            ?path,
            "exact store loaded"
        );

        Ok(Self {
            inner: RwLock::new(ExactInner {
                collection,
                records,
                ids,
                dimension,
            }),
            metric,
            path,
        })
    }

    pub fn metric(&self) -> &DistanceMetric {
        &self.metric
    }

    pub fn retrieval_path(&self) -> RetrievalPath {
        self.path
    }

    /// Discard the in-memory cache and reload it from the collection.
    pub fn rebuild_cache(&self) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ClassifierError::poisoned("exact store"))?;
        let records = records_from_rows(inner.collection.get_all()?)?;
        inner.ids = records.iter().map(|r| r.id.clone()).collect();
        inner.dimension = records.first().map(|r| r.vector.dimension());
        inner.records = records;
        Ok(())
    }

    /// A copy of every cached record, in insertion order.
    pub fn records(&self) -> Result<Vec<VectorRecord>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ClassifierError::poisoned("exact store"))?;
        Ok(inner.records.clone())
    }

    /// Distance from `query` to every cached record, in insertion order.
    ///
    /// This is the unsorted scan behind `RetrievalPath::LinearScan`; each
    /// distance is also emitted as a `debug` event.
    pub fn distances(&self, query: &FeatureVector) -> Result<Vec<Neighbor>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ClassifierError::poisoned("exact store"))?;
        if inner.records.is_empty() {
            return Ok(Vec::new());
        }
        check_dimension(inner.dimension, query.dimension())?;
        query.ensure_finite()?;

        let score = |record: &VectorRecord| -> Result<Neighbor> {
            Ok(Neighbor {
                id: record.id.clone(),
                label: record.label.clone(),
                distance: self.metric.distance(query, &record.vector)?,
                metadata: record.metadata.clone(),
            })
        };

        let scanned = if inner.records.len() >= PARALLEL_SCAN_THRESHOLD {
            inner.records.par_iter().map(score).collect::<Result<Vec<_>>>()?
        } else {
            inner.records.iter().map(score).collect::<Result<Vec<_>>>()?
        };

        for n in &scanned {
            tracing::debug!(name = n.display_name(), label = %n.label, distance = n.distance, "distance");
        }
        Ok(scanned)
    }

    fn query_collection(&self, query: &FeatureVector, k: usize) -> Result<Vec<Neighbor>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ClassifierError::poisoned("exact store"))?;
        if inner.records.is_empty() {
            return Ok(Vec::new());
        }
        check_dimension(inner.dimension, query.dimension())?;
        query.ensure_finite()?;

        let rows = inner.collection.query_nearest(query, k)?;
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(rows.ids.len());
        for ((id, distance), metadata) in rows
            .ids
            .into_iter()
            .zip(rows.distances)
            .zip(rows.metadatas)
        {
            if !seen.insert(id.clone()) {
                continue;
            }
            let label = label_of(&id, &metadata)?;
            out.push(Neighbor {
                id,
                label,
                distance: distance.max(0.0),
                metadata,
            });
        }
        Ok(knn::rank(out, k))
    }
}

impl VectorStore for ExactStore {
    fn add(
        &self,
        id_hint: &str,
        label: &str,
        vector: FeatureVector,
        mut metadata: Metadata,
    ) -> Result<RecordId> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ClassifierError::poisoned("exact store"))?;
        check_dimension(inner.dimension, vector.dimension())?;
        vector.ensure_finite()?;

        let id = inner.unique_id(id_hint);
        metadata.insert(Metadata::LABEL_KEY, label);
        if metadata.get(Metadata::NAME_KEY).is_none() {
            metadata.insert(Metadata::NAME_KEY, id_hint);
        }

        // Collection first: if it fails, the cache never sees the record.
        inner.collection.append(&id, &vector, &metadata)?;

        inner.dimension.get_or_insert(vector.dimension());
        inner.ids.insert(id.clone());
        inner.records.push(VectorRecord {
            id: id.clone(),
            label: label.to_string(),
            vector,
            metadata,
        });

        tracing::debug!(%id, label, "record added");
        Ok(id)
    }

    fn query(&self, query: &FeatureVector, k: usize) -> Result<Vec<Neighbor>> {
        knn::validate_k(k)?;
        match self.path {
            RetrievalPath::LinearScan => Ok(knn::rank(self.distances(query)?, k)),
            RetrievalPath::Collection => self.query_collection(query, k),
        }
    }

    fn len(&self) -> usize {
        self.inner
            .read()
            .map(|inner| inner.records.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().records.len())
    }

    fn dimension(&self) -> Option<usize> {
        self.inner
            .read()
            .map(|inner| inner.dimension)
            .unwrap_or_else(|poisoned| poisoned.into_inner().dimension)
    }

    fn kind(&self) -> &'static str {
        "exact"
    }
}

fn label_of(id: &str, metadata: &Metadata) -> Result<String> {
    metadata
        .get(Metadata::LABEL_KEY)
        .map(str::to_string)
        .ok_or_else(|| ClassifierError::StorageError(format!("record {} has no label", id)))
}

fn records_from_rows(rows: CollectionRows) -> Result<Vec<VectorRecord>> {
    rows.ids
        .into_iter()
        .zip(rows.vectors)
        .zip(rows.metadatas)
        .map(|((id, vector), metadata)| {
            let label = label_of(&id, &metadata)?;
            Ok(VectorRecord {
                id,
                label,
                vector,
                metadata,
            })
        })
        .collect()
}
