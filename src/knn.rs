//! k-nearest-neighbor ranking

use crate::error::{ClassifierError, Result};
use crate::record::Neighbor;
use crate::store::VectorStore;
use crate::vector::FeatureVector;

/// Reject `k == 0`.
pub fn validate_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(ClassifierError::InvalidArgument {
            reason: "k must be greater than zero".to_string(),
        });
    }
    Ok(())
}

/// Sort candidates by ascending distance and keep the first `k`.
///
/// The sort is stable, so candidates at equal distance keep the order they
/// were supplied in (insertion order for a linear scan).
pub fn rank(mut candidates: Vec<Neighbor>, k: usize) -> Vec<Neighbor> {
    candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    candidates.truncate(k);
    candidates
}

/// The `min(k, n)` records of `store` closest to `query`.
pub fn top_k(store: &dyn VectorStore, query: &FeatureVector, k: usize) -> Result<Vec<Neighbor>> {
    validate_k(k)?;
    store.query(query, k)
}
