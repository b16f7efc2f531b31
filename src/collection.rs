//! Collection trait: the persistent record service behind the Exact Store.

use crate::distance::euclidean_distance;
use crate::error::{ClassifierError, Result};
use crate::record::Metadata;
use crate::store::check_dimension;
use crate::vector::FeatureVector;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Every row of a collection, as parallel columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionRows {
    pub ids: Vec<String>,
    pub vectors: Vec<FeatureVector>,
    pub metadatas: Vec<Metadata>,
}

/// Result of a nearest-neighbor query answered by the collection itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NearestRows {
    pub ids: Vec<String>,
    pub distances: Vec<f32>,
    pub metadatas: Vec<Metadata>,
}

/// An append-only, id-keyed store of vectors with metadata.
pub trait Collection: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Append one row. Ids must be unique within the collection.
    fn append(&mut self, id: &str, vector: &FeatureVector, metadata: &Metadata) -> Result<()>;

    /// Every stored row, in insertion order.
    fn get_all(&self) -> Result<CollectionRows>;

    fn count(&self) -> usize;

    /// The `k` rows closest to `vector` by plain Euclidean distance, ascending.
    fn query_nearest(&self, vector: &FeatureVector, k: usize) -> Result<NearestRows>;
}

/// A single row as kept in memory and written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRow {
    pub id: String,
    pub data: Vec<f32>,
    pub metadata: Metadata,
}

/// In-memory row table shared by the collection implementations.
#[derive(Debug, Default)]
pub(crate) struct RowTable {
    rows: Vec<(String, FeatureVector, Metadata)>,
    ids: HashSet<String>,
}

impl RowTable {
    pub(crate) fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub(crate) fn dimension(&self) -> Option<usize> {
        self.rows.first().map(|(_, v, _)| v.dimension())
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    /// Validate a row before it is written anywhere.
    pub(crate) fn check_insert(&self, id: &str, vector: &FeatureVector) -> Result<()> {
        if self.contains(id) {
            return Err(ClassifierError::StorageError(format!(
                "duplicate id in collection: {}",
                id
            )));
        }
        check_dimension(self.dimension(), vector.dimension())
    }

    pub(crate) fn push(&mut self, id: String, vector: FeatureVector, metadata: Metadata) {
        self.ids.insert(id.clone());
        self.rows.push((id, vector, metadata));
    }

    pub(crate) fn stored_rows(&self) -> Vec<StoredRow> {
        self.rows
            .iter()
            .map(|(id, v, m)| StoredRow {
                id: id.clone(),
                data: v.as_slice().to_vec(),
                metadata: m.clone(),
            })
            .collect()
    }

    pub(crate) fn all(&self) -> CollectionRows {
        let mut out = CollectionRows::default();
        for (id, v, m) in &self.rows {
            out.ids.push(id.clone());
            out.vectors.push(v.clone());
            out.metadatas.push(m.clone());
        }
        out
    }

    pub(crate) fn nearest(&self, query: &FeatureVector, k: usize) -> Result<NearestRows> {
        if self.rows.is_empty() {
            return Ok(NearestRows::default());
        }
        check_dimension(self.dimension(), query.dimension())?;

        let mut scored = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, (_, v, _))| Ok((i, euclidean_distance(query, v)?)))
            .collect::<Result<Vec<(usize, f32)>>>()?;
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        let mut out = NearestRows::default();
        for (i, distance) in scored {
            let (id, _, metadata) = &self.rows[i];
            out.ids.push(id.clone());
            out.distances.push(distance);
            out.metadatas.push(metadata.clone());
        }
        Ok(out)
    }
}

/// A collection that lives only as long as the process.
#[derive(Debug)]
pub struct MemoryCollection {
    name: String,
    table: RowTable,
}

impl MemoryCollection {
    pub fn get_or_create(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: RowTable::default(),
        }
    }
}

impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn append(&mut self, id: &str, vector: &FeatureVector, metadata: &Metadata) -> Result<()> {
        self.table.check_insert(id, vector)?;
        self.table
            .push(id.to_string(), vector.clone(), metadata.clone());
        Ok(())
    }

    fn get_all(&self) -> Result<CollectionRows> {
        Ok(self.table.all())
    }

    fn count(&self) -> usize {
        self.table.len()
    }

    fn query_nearest(&self, vector: &FeatureVector, k: usize) -> Result<NearestRows> {
        self.table.nearest(vector, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(data: &[f32]) -> FeatureVector {
        FeatureVector::new(data.to_vec())
    }

    #[test]
    fn test_memory_collection_append_and_get_all() {
        let mut c = MemoryCollection::get_or_create("songs");
        c.append("a", &v(&[1.0, 0.0]), &Metadata::new().with("label", "rock"))
            .unwrap();
        c.append("b", &v(&[0.0, 1.0]), &Metadata::new()).unwrap();

        assert_eq!(c.name(), "songs");
        assert_eq!(c.count(), 2);
        let rows = c.get_all().unwrap();
        assert_eq!(rows.ids, vec!["a", "b"]);
        assert_eq!(rows.vectors[1], v(&[0.0, 1.0]));
        assert_eq!(rows.metadatas[0].get("label"), Some("rock"));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut c = MemoryCollection::get_or_create("songs");
        c.append("a", &v(&[1.0]), &Metadata::new()).unwrap();
        assert!(matches!(
            c.append("a", &v(&[2.0]), &Metadata::new()),
            Err(ClassifierError::StorageError(_))
        ));
        assert_eq!(c.count(), 1);
    }

    #[test]
    fn test_dimension_enforced() {
        let mut c = MemoryCollection::get_or_create("songs");
        c.append("a", &v(&[1.0, 2.0]), &Metadata::new()).unwrap();
        assert!(matches!(
            c.append("b", &v(&[1.0]), &Metadata::new()),
            Err(ClassifierError::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_query_nearest() {
        let mut c = MemoryCollection::get_or_create("songs");
        c.append("far", &v(&[10.0, 0.0]), &Metadata::new()).unwrap();
        c.append("near", &v(&[1.0, 0.0]), &Metadata::new()).unwrap();
        c.append("mid", &v(&[5.0, 0.0]), &Metadata::new()).unwrap();

        let res = c.query_nearest(&v(&[0.0, 0.0]), 2).unwrap();
        assert_eq!(res.ids, vec!["near", "mid"]);
        assert_eq!(res.distances, vec![1.0, 5.0]);
    }

    #[test]
    fn test_query_nearest_empty() {
        let c = MemoryCollection::get_or_create("songs");
        let res = c.query_nearest(&v(&[0.0, 0.0]), 3).unwrap();
        assert!(res.ids.is_empty());
    }
}
