//! Classification engine: owns a store and turns queries into labeled decisions

use std::sync::{Arc, RwLock};
use std::time::Instant;

use serde::Serialize;

use crate::ann::{AnnIndex, FlatIpIndex};
use crate::collection::{Collection, MemoryCollection};
use crate::config::{BackendKind, EngineConfig, IndexKind};
use crate::error::{ClassifierError, Result};
use crate::exact::ExactStore;
use crate::hnsw::HnswIpIndex;
use crate::indexed::IndexedStore;
use crate::knn;
use crate::metrics::MetricsCollector;
use crate::persistence::{PersistentCollection, PersistentCollectionConfig};
use crate::record::{Metadata, Neighbor, RecordId};
use crate::store::VectorStore;
use crate::vector::FeatureVector;
use crate::voting::{self, VoteResult, VotingMode};

/// Point-in-time view of the engine for health and metrics output.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub backend: &'static str,
    pub total_records: usize,
    pub dimension: Option<usize>,
    pub total_classifications: u64,
    pub total_inserts: u64,
    pub avg_classify_latency_us: f64,
    pub p50_classify_latency_us: f64,
    pub p95_classify_latency_us: f64,
    pub p99_classify_latency_us: f64,
}

#[derive(Debug)]
pub struct ClassificationEngine {
    store: Arc<dyn VectorStore>,
    config: EngineConfig,
    metrics: RwLock<MetricsCollector>,
}

impl ClassificationEngine {
    pub fn new(store: Arc<dyn VectorStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            metrics: RwLock::new(MetricsCollector::new()),
        }
    }

    /// Build the configured backend and load any persisted records into it.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let store = build_store(&config)?;
        tracing::info!(
            backend = store.kind(),
            records = store.len(),
            voting = ?config.voting,
            k = config.k,
            "engine ready"
        );
        Ok(Self::new(store, config))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn VectorStore> {
        Arc::clone(&self.store)
    }

    /// Store a labeled vector. The id hint is the metadata `name`, else the label.
    pub fn add_record(
        &self,
        vector: FeatureVector,
        label: &str,
        metadata: Metadata,
    ) -> Result<RecordId> {
        let hint = metadata
            .get(Metadata::NAME_KEY)
            .unwrap_or(label)
            .to_string();
        let id = self.store.add(&hint, label, vector, metadata)?;
        if let Ok(mut metrics) = self.metrics.write() {
            metrics.record_insert();
        }
        tracing::info!(%id, label, "record stored");
        Ok(id)
    }

    /// Store a labeled vector under a display name, e.g. the source file name.
    pub fn add_named(&self, name: &str, label: &str, vector: FeatureVector) -> Result<RecordId> {
        self.add_record(vector, label, Metadata::new().with(Metadata::NAME_KEY, name))
    }

    /// The `k` stored records nearest to `vector`, closest first.
    pub fn neighbors(&self, vector: &FeatureVector, k: usize) -> Result<Vec<Neighbor>> {
        knn::top_k(self.store.as_ref(), vector, k)
    }

    pub fn classify(&self, vector: &FeatureVector, k: usize, mode: VotingMode) -> Result<VoteResult> {
        knn::validate_k(k)?;
        if self.store.is_empty() {
            return Err(ClassifierError::NotFound(
                "no labeled records to classify against".to_string(),
            ));
        }

        let start = Instant::now();
        let neighbors = self.neighbors(vector, k)?;
        let result = voting::aggregate(neighbors, k, mode)?;
        let elapsed = start.elapsed();

        if let Ok(mut metrics) = self.metrics.write() {
            metrics.record_classify(elapsed, &result.winning_label);
        }
        tracing::info!(
            label = %result.winning_label,
            confidence = result.confidence_percent,
            k,
            ?mode,
            elapsed_us = elapsed.as_micros() as u64,
            "classified"
        );
        Ok(result)
    }

    /// Classify with the configured `k` and voting mode.
    pub fn classify_default(&self, vector: &FeatureVector) -> Result<VoteResult> {
        self.classify(vector, self.config.k, self.config.voting)
    }

    pub fn total_records(&self) -> usize {
        self.store.len()
    }

    pub fn stats(&self) -> EngineStats {
        let metrics = self
            .metrics
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let p = metrics.percentiles_latency_us(&[50.0, 95.0, 99.0]);
        EngineStats {
            backend: self.store.kind(),
            total_records: self.store.len(),
            dimension: self.store.dimension(),
            total_classifications: metrics.total_classifications(),
            total_inserts: metrics.total_inserts(),
            avg_classify_latency_us: metrics.avg_latency_us(),
            p50_classify_latency_us: p[0],
            p95_classify_latency_us: p[1],
            p99_classify_latency_us: p[2],
        }
    }

    /// Times each label has been predicted since startup.
    pub fn prediction_counts(&self) -> Vec<(String, u64)> {
        let metrics = self
            .metrics
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        metrics
            .predictions()
            .iter()
            .map(|(label, count)| (label.clone(), *count))
            .collect()
    }
}

fn build_store(config: &EngineConfig) -> Result<Arc<dyn VectorStore>> {
    match config.backend {
        BackendKind::Exact => {
            let collection: Box<dyn Collection> = match &config.data_dir {
                Some(dir) => Box::new(PersistentCollection::get_or_create(
                    dir,
                    &config.collection,
                    PersistentCollectionConfig {
                        checkpoint_interval: config.checkpoint_interval,
                    },
                )?),
                None => Box::new(MemoryCollection::get_or_create(config.collection.clone())),
            };
            Ok(Arc::new(ExactStore::open(
                collection,
                config.metric.clone(),
                config.retrieval,
            )?))
        }
        BackendKind::Indexed => {
            if config.data_dir.is_some() {
                tracing::warn!("indexed backend is in-memory only; data_dir is ignored");
            }
            let dimension = config.index.dimension;
            let index: Box<dyn AnnIndex> = match config.index.kind {
                IndexKind::Flat => Box::new(FlatIpIndex::new(dimension)),
                IndexKind::Hnsw => Box::new(HnswIpIndex::new(dimension, config.index.hnsw.clone())),
            };
            Ok(Arc::new(IndexedStore::new(index, config.index.normalize)))
        }
    }
}
