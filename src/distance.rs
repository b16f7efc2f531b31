//! Distance and similarity metrics between feature vectors

use crate::error::{ClassifierError, Result};
use crate::vector::FeatureVector;
use serde::{Deserialize, Serialize};
use std::iter;
use std::ops::Range;

/// A contiguous run of features sharing one weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightBlock {
    pub name: String,
    pub len: usize,
    pub weight: f32,
}

impl WeightBlock {
    pub fn new(name: impl Into<String>, len: usize, weight: f32) -> Self {
        Self {
            name: name.into(),
            len,
            weight,
        }
    }
}

/// Per-dimension weight table for the weighted Euclidean metric, described as
/// named feature blocks laid out in extractor order.
///
/// Vectors shorter than the table use only its leading weights; vectors longer
/// than the table get a neutral weight of `1.0` for every trailing dimension.
/// Older extractor versions produced fewer features, so both directions must
/// keep working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeights {
    blocks: Vec<WeightBlock>,
}

impl Default for FeatureWeights {
    /// The audio extractor layout: 30 features.
    fn default() -> Self {
        Self::new(vec![
            WeightBlock::new("mfcc", 13, 8.0),
            WeightBlock::new("spectral_centroid", 1, 4.0),
            WeightBlock::new("spectral_rolloff", 1, 3.5),
            WeightBlock::new("zero_crossing_rate", 1, 5.0),
            WeightBlock::new("chroma", 12, 2.0),
            WeightBlock::new("tempo", 1, 3.5),
        ])
    }
}

impl FeatureWeights {
    pub const NEUTRAL_WEIGHT: f32 = 1.0;

    pub fn new(blocks: Vec<WeightBlock>) -> Self {
        Self { blocks }
    }

    /// Uniform weights, equivalent to plain Euclidean distance.
    pub fn uniform() -> Self {
        Self { blocks: Vec::new() }
    }

    pub fn blocks(&self) -> &[WeightBlock] {
        &self.blocks
    }

    /// Number of dimensions covered by the configured blocks.
    pub fn table_len(&self) -> usize {
        self.blocks.iter().map(|b| b.len).sum()
    }

    /// Dimension range covered by the named block.
    pub fn block_range(&self, name: &str) -> Option<Range<usize>> {
        let mut start = 0;
        for block in &self.blocks {
            if block.name == name {
                return Some(start..start + block.len);
            }
            start += block.len;
        }
        None
    }

    /// Weights for a vector of `dim` features: the table truncated from the
    /// end, or extended at the end with the neutral weight.
    pub fn weights_for(&self, dim: usize) -> impl Iterator<Item = f32> + '_ {
        self.blocks
            .iter()
            .flat_map(|b| iter::repeat(b.weight).take(b.len))
            .chain(iter::repeat(Self::NEUTRAL_WEIGHT))
            .take(dim)
    }

    pub fn table_for(&self, dim: usize) -> Vec<f32> {
        self.weights_for(dim).collect()
    }
}

/// Metric used by a store to rank candidates. Lower distance is always closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Weighted Euclidean distance over named feature blocks
    WeightedEuclidean { weights: FeatureWeights },
    /// Plain Euclidean (L2) distance
    Euclidean,
    /// Cosine similarity converted to distance: 1 - similarity
    Cosine,
    /// Inner product, negated so that larger products rank first
    InnerProduct,
}

impl Default for DistanceMetric {
    fn default() -> Self {
        DistanceMetric::WeightedEuclidean {
            weights: FeatureWeights::default(),
        }
    }
}

impl DistanceMetric {
    /// Compute the distance between two vectors using this metric
    pub fn distance(&self, v1: &FeatureVector, v2: &FeatureVector) -> Result<f32> {
        match self {
            DistanceMetric::WeightedEuclidean { weights } => weighted_euclidean(v1, v2, weights),
            DistanceMetric::Euclidean => euclidean_distance(v1, v2),
            DistanceMetric::Cosine => Ok((1.0 - cosine_similarity(v1, v2)?).max(0.0)),
            DistanceMetric::InnerProduct => Ok(-dot_product(v1, v2)?),
        }
    }

    /// Whether distances are never negative. Only the inner product can go below zero.
    pub fn is_non_negative(&self) -> bool {
        !matches!(self, DistanceMetric::InnerProduct)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::WeightedEuclidean { .. } => "weighted_euclidean",
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::InnerProduct => "inner_product",
        }
    }
}

fn check_lengths(v1: &FeatureVector, v2: &FeatureVector) -> Result<()> {
    if !v1.has_same_dimension(v2) {
        return Err(ClassifierError::LengthMismatch {
            left: v1.dimension(),
            right: v2.dimension(),
        });
    }
    Ok(())
}

/// `sqrt(Σ wᵢ·(aᵢ−bᵢ)²)` with the weight table fitted to the vector length.
pub fn weighted_euclidean(
    v1: &FeatureVector,
    v2: &FeatureVector,
    weights: &FeatureWeights,
) -> Result<f32> {
    check_lengths(v1, v2)?;
    let sum: f32 = v1
        .as_slice()
        .iter()
        .zip(v2.as_slice())
        .zip(weights.weights_for(v1.dimension()))
        .map(|((a, b), w)| {
            let diff = a - b;
            w * diff * diff
        })
        .sum();
    Ok(sum.sqrt())
}

/// Compute Euclidean (L2) distance between two vectors
pub fn euclidean_distance(v1: &FeatureVector, v2: &FeatureVector) -> Result<f32> {
    check_lengths(v1, v2)?;
    Ok(v1
        .as_slice()
        .iter()
        .zip(v2.as_slice())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f32>()
        .sqrt())
}

/// `(a·b) / (‖a‖·‖b‖)`, or `0.0` when either vector has zero magnitude.
pub fn cosine_similarity(v1: &FeatureVector, v2: &FeatureVector) -> Result<f32> {
    Ok(CosineBreakdown::compute(v1, v2)?.similarity)
}

/// Compute dot product of two vectors
pub fn dot_product(v1: &FeatureVector, v2: &FeatureVector) -> Result<f32> {
    check_lengths(v1, v2)?;
    Ok(v1.as_slice().iter().zip(v2.as_slice()).map(|(a, b)| a * b).sum())
}

/// The intermediate values of a cosine similarity computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CosineBreakdown {
    pub dot: f32,
    pub norm_a: f32,
    pub norm_b: f32,
    pub similarity: f32,
}

impl CosineBreakdown {
    pub fn compute(v1: &FeatureVector, v2: &FeatureVector) -> Result<Self> {
        let dot = dot_product(v1, v2)?;
        let norm_a = v1.norm();
        let norm_b = v2.norm();
        tracing::debug!(dot, norm_a, norm_b, "cosine inputs");

        let similarity = if norm_a == 0.0 || norm_b == 0.0 {
            0.0
        } else {
            // Clamp to [-1, 1] to absorb rounding error
            (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
        };
        tracing::debug!(similarity, "cosine result");

        Ok(Self {
            dot,
            norm_a,
            norm_b,
            similarity,
        })
    }
}
