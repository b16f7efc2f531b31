//! Feature vector type

use crate::error::{ClassifierError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A fixed-length feature vector produced by an upstream extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector {
    data: Vec<f32>,
}

impl FeatureVector {
    /// Create a new vector from a Vec<f32>
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// Number of features in the vector
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.data
    }

    /// Fail with `InvalidVector` if any component is NaN or infinite.
    pub fn ensure_finite(&self) -> Result<()> {
        match self.data.iter().position(|x| !x.is_finite()) {
            Some(i) => Err(ClassifierError::InvalidVector {
                reason: format!("component {} is {}", i, self.data[i]),
            }),
            None => Ok(()),
        }
    }

    pub fn has_same_dimension(&self, other: &FeatureVector) -> bool {
        self.dimension() == other.dimension()
    }

    /// Compute the L2 norm (magnitude) of the vector
    pub fn norm(&self) -> f32 {
        self.data.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Scale the vector to unit length. Fails on the zero vector.
    pub fn normalize(&mut self) -> Result<()> {
        let norm = self.norm();
        if norm == 0.0 {
            return Err(ClassifierError::InvalidVector {
                reason: "Cannot normalize zero vector".to_string(),
            });
        }
        for x in &mut self.data {
            *x /= norm;
        }
        Ok(())
    }

    /// Create a normalized copy of the vector
    pub fn normalized(&self) -> Result<FeatureVector> {
        let mut v = self.clone();
        v.normalize()?;
        Ok(v)
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}

/// Parses comma and/or whitespace separated floats, e.g. `"1.0, 2.0 3.0"`.
impl FromStr for FeatureVector {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self> {
        let data = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|x| !x.is_empty())
            .map(|x| {
                x.parse::<f32>().map_err(|_| ClassifierError::InvalidVector {
                    reason: format!("Invalid float: {}", x),
                })
            })
            .collect::<Result<Vec<f32>>>()?;

        if data.is_empty() {
            return Err(ClassifierError::InvalidVector {
                reason: "no values".to_string(),
            });
        }
        let vector = FeatureVector::new(data);
        vector.ensure_finite()?;
        Ok(vector)
    }
}
