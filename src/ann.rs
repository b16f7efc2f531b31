//! Approximate nearest-neighbor index interface and a brute-force inner-product index

use crate::distance::dot_product;
use crate::error::Result;
use crate::store::check_dimension;
use crate::vector::FeatureVector;

/// Handle reported for result slots the index could not fill.
pub const NO_MATCH: i64 = -1;

/// Parallel result arrays of an index search, best score first.
///
/// Both arrays always hold exactly `k` entries; unfilled slots carry
/// [`NO_MATCH`] as their handle. Callers bound `k` by the index size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHits {
    pub handles: Vec<i64>,
    pub scores: Vec<f32>,
}

impl SearchHits {
    /// Build hits from `(handle, score)` pairs, padding to `k` with sentinels.
    pub fn padded(found: impl IntoIterator<Item = (usize, f32)>, k: usize) -> Self {
        let mut hits = SearchHits::default();
        for (handle, score) in found.into_iter().take(k) {
            hits.handles.push(handle as i64);
            hits.scores.push(score);
        }
        while hits.handles.len() < k {
            hits.handles.push(NO_MATCH);
            hits.scores.push(f32::MIN);
        }
        hits
    }

    /// Filled `(handle, score)` pairs. Sentinel and other negative slots are skipped.
    pub fn matches(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.handles
            .iter()
            .zip(&self.scores)
            .filter(|&(&h, _)| h >= 0)
            .map(|(&h, &s)| (h as usize, s))
    }
}

/// An inner-product index keyed by dense integer handles.
///
/// Handles are assigned sequentially from 0 in insertion order and never reused.
/// Higher scores are more similar.
pub trait AnnIndex: Send + Sync + std::fmt::Debug {
    /// Fixed dimensionality of the index.
    fn dimension(&self) -> usize;

    /// Add a vector, returning its handle.
    fn add(&mut self, vector: &FeatureVector) -> Result<usize>;

    /// The `k` best-scoring handles for `query`.
    fn search(&self, query: &FeatureVector, k: usize) -> Result<SearchHits>;

    /// Number of vectors in the index.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exact inner-product index: scores every stored vector on each search.
#[derive(Debug)]
pub struct FlatIpIndex {
    dimension: usize,
    vectors: Vec<FeatureVector>,
}

impl FlatIpIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
        }
    }

    pub fn get_vector(&self, handle: usize) -> Option<&FeatureVector> {
        self.vectors.get(handle)
    }
}

impl AnnIndex for FlatIpIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn add(&mut self, vector: &FeatureVector) -> Result<usize> {
        check_dimension(Some(self.dimension), vector.dimension())?;
        self.vectors.push(vector.clone());
        Ok(self.vectors.len() - 1)
    }

    fn search(&self, query: &FeatureVector, k: usize) -> Result<SearchHits> {
        check_dimension(Some(self.dimension), query.dimension())?;
        let mut scored = self
            .vectors
            .iter()
            .enumerate()
            .map(|(handle, v)| Ok((handle, dot_product(query, v)?)))
            .collect::<Result<Vec<_>>>()?;

        // Stable: equal scores keep handle order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(SearchHits::padded(scored, k))
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }
}
