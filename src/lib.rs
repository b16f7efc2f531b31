//! # k-NN Classifier
//!
//! Labeled vector storage with k-nearest-neighbor classification.
//!
//! This library provides:
//! - Distance metrics (weighted Euclidean over named feature blocks, cosine)
//! - An exact store mirrored from a durable collection (WAL + snapshots)
//! - An indexed store over a flat or HNSW inner-product index
//! - Hybrid and plurality voting with a confidence percentage
//!
//! ## Example
//!
//! ```rust
//! use knn_classifier::{ClassificationEngine, EngineConfig, FeatureVector, VotingMode};
//!
//! let engine = ClassificationEngine::from_config(EngineConfig::default()).unwrap();
//!
//! engine.add_named("a.mp3", "rock", FeatureVector::new(vec![0.1; 30])).unwrap();
//! engine.add_named("b.mp3", "rock", FeatureVector::new(vec![0.2; 30])).unwrap();
//! engine.add_named("c.mp3", "jazz", FeatureVector::new(vec![0.9; 30])).unwrap();
//!
//! let result = engine
//!     .classify(&FeatureVector::new(vec![0.15; 30]), 3, VotingMode::Hybrid)
//!     .unwrap();
//! assert_eq!(result.winning_label, "rock");
//! ```

pub mod ann;
pub mod collection;
pub mod config;
pub mod distance;
pub mod engine;
pub mod error;
pub mod exact;
pub mod extract;
pub mod hnsw;
pub mod indexed;
pub mod knn;
pub mod metrics;
pub mod persistence;
pub mod record;
pub mod server;
pub mod store;
pub mod vector;
pub mod voting;

pub use ann::{AnnIndex, FlatIpIndex, SearchHits, NO_MATCH};
pub use collection::{Collection, MemoryCollection};
pub use config::{BackendKind, EngineConfig, IndexConfig, IndexKind};
pub use distance::{cosine_similarity, weighted_euclidean, DistanceMetric, FeatureWeights};
pub use engine::{ClassificationEngine, EngineStats};
pub use error::{ClassifierError, Result};
pub use exact::{ExactStore, RetrievalPath};
pub use hnsw::{HnswIpIndex, HnswParams};
pub use indexed::IndexedStore;
pub use persistence::{PersistentCollection, PersistentCollectionConfig};
pub use record::{Metadata, Neighbor, RecordId, VectorRecord};
pub use store::VectorStore;
pub use vector::FeatureVector;
pub use voting::{VoteResult, VotingMode};
