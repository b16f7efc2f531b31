//! Feature extraction interface

use std::path::Path;

use crate::error::{ClassifierError, Result};
use crate::vector::FeatureVector;

/// Turns a media file into a fixed-length feature vector.
///
/// Decoders for audio or images live outside this crate and plug in here.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<FeatureVector>;
}

/// Reads a pre-computed vector stored as comma or whitespace separated floats.
#[derive(Debug, Clone, Default)]
pub struct VectorFileExtractor {
    expected_dimension: Option<usize>,
}

impl VectorFileExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject files whose vector length differs from `dimension`.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            expected_dimension: Some(dimension),
        }
    }
}

impl FeatureExtractor for VectorFileExtractor {
    fn extract(&self, path: &Path) -> Result<FeatureVector> {
        let text = std::fs::read_to_string(path)?;
        let vector = text.parse::<FeatureVector>().map_err(|e| ClassifierError::InvalidVector {
            reason: format!("{}: {}", path.display(), e),
        })?;

        if let Some(expected) = self.expected_dimension {
            if vector.dimension() != expected {
                return Err(ClassifierError::DimensionMismatch {
                    expected,
                    actual: vector.dimension(),
                });
            }
        }
        tracing::debug!(path = %path.display(), dimension = vector.dimension(), "features loaded");
        Ok(vector)
    }
}
