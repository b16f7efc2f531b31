//! Engine configuration, loadable from a JSON file

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::distance::DistanceMetric;
use crate::error::{ClassifierError, Result};
use crate::exact::RetrievalPath;
use crate::hnsw::HnswParams;
use crate::persistence::serialization;
use crate::voting::VotingMode;

/// Which store implementation backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Linear scan over records mirrored from a collection
    #[default]
    Exact,
    /// Approximate inner-product index
    Indexed,
}

/// Index implementation used by the indexed backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Exhaustive inner-product scan
    #[default]
    Flat,
    /// HNSW graph
    Hnsw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub kind: IndexKind,
    /// Fixed vector length accepted by the index.
    pub dimension: usize,
    /// L2-normalise inputs so the inner product is cosine similarity.
    pub normalize: bool,
    pub hnsw: HnswParams,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            kind: IndexKind::Flat,
            dimension: 2048,
            normalize: true,
            hnsw: HnswParams::default(),
        }
    }
}

/// Top-level configuration. Every field has a default, so `{}` is a valid file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub backend: BackendKind,
    pub retrieval: RetrievalPath,
    pub voting: VotingMode,
    /// Neighbors consulted by `classify_default`.
    pub k: usize,
    /// Metric for the exact backend.
    pub metric: DistanceMetric,
    /// Where collections are persisted. In-memory when unset.
    pub data_dir: Option<PathBuf>,
    pub collection: String,
    /// Appends between snapshots of a persistent collection.
    pub checkpoint_interval: usize,
    pub index: IndexConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Exact,
            retrieval: RetrievalPath::LinearScan,
            voting: VotingMode::Hybrid,
            k: 5,
            metric: DistanceMetric::default(),
            data_dir: None,
            collection: "songs".to_string(),
            checkpoint_interval: 1000,
            index: IndexConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let config: EngineConfig = serialization::from_json(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(ClassifierError::InvalidArgument {
                reason: "k must be greater than zero".to_string(),
            });
        }
        if self.collection.is_empty() {
            return Err(ClassifierError::InvalidArgument {
                reason: "collection name must not be empty".to_string(),
            });
        }
        if self.checkpoint_interval == 0 {
            return Err(ClassifierError::InvalidArgument {
                reason: "checkpoint_interval must be greater than zero".to_string(),
            });
        }
        if self.backend == BackendKind::Exact && !self.metric.is_non_negative() {
            return Err(ClassifierError::InvalidArgument {
                reason: format!("metric {} can yield negative distances", self.metric.name()),
            });
        }
        if self.backend == BackendKind::Indexed && self.index.dimension == 0 {
            return Err(ClassifierError::InvalidArgument {
                reason: "index dimension must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
