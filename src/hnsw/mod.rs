//! HNSW (Hierarchical Navigable Small World) index module.

pub mod graph;
pub mod neighbor_queue;

pub use graph::{HnswGraph, HnswParams};

use crate::ann::{AnnIndex, SearchHits};
use crate::distance::DistanceMetric;
use crate::error::Result;
use crate::store::check_dimension;
use crate::vector::FeatureVector;

/// An approximate inner-product index backed by an HNSW graph.
///
/// Scores are raw inner products, so callers wanting cosine similarity must
/// feed unit-length vectors.
#[derive(Debug)]
pub struct HnswIpIndex {
    dimension: usize,
    graph: HnswGraph,
}

impl HnswIpIndex {
    pub fn new(dimension: usize, params: HnswParams) -> Self {
        Self {
            dimension,
            graph: HnswGraph::new(DistanceMetric::InnerProduct, params),
        }
    }

    /// Build the index from a batch of vectors, returning their handles.
    pub fn build_batch(&mut self, vectors: &[FeatureVector]) -> Result<Vec<usize>> {
        vectors.iter().map(|v| self.add(v)).collect()
    }

    /// Search with a specific ef value for runtime tuning.
    pub fn search_with_ef(&self, query: &FeatureVector, k: usize, ef: usize) -> Result<SearchHits> {
        check_dimension(Some(self.dimension), query.dimension())?;
        let found = self.graph.search_knn(query, k, ef)?;
        // The graph ranks by negated inner product
        Ok(SearchHits::padded(
            found.into_iter().map(|c| (c.handle, -c.distance)),
            k,
        ))
    }

    pub fn params(&self) -> &HnswParams {
        self.graph.params()
    }
}

impl AnnIndex for HnswIpIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn add(&mut self, vector: &FeatureVector) -> Result<usize> {
        check_dimension(Some(self.dimension), vector.dimension())?;
        self.graph.insert(vector.clone())
    }

    fn search(&self, query: &FeatureVector, k: usize) -> Result<SearchHits> {
        self.search_with_ef(query, k, self.graph.params().ef_search)
    }

    fn len(&self) -> usize {
        self.graph.len()
    }
}
