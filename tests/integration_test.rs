//! Integration tests for the classification engine

use std::sync::Arc;
use std::thread;

use approx::assert_relative_eq;
use knn_classifier::{
    BackendKind, ClassificationEngine, ClassifierError, DistanceMetric, EngineConfig, ExactStore,
    FeatureVector, IndexConfig, IndexKind, Metadata, MemoryCollection, PersistentCollection,
    PersistentCollectionConfig, RetrievalPath, VectorStore, VotingMode,
};
use tempfile::TempDir;

fn genre_vector(base: f32, jitter: f32) -> FeatureVector {
    FeatureVector::new((0..30).map(|i| base + jitter * (i % 3) as f32).collect())
}

fn seed(engine: &ClassificationEngine) {
    for i in 0..4 {
        engine
            .add_named(&format!("rock{}.mp3", i), "rock", genre_vector(0.1, 0.01 * i as f32))
            .unwrap();
        engine
            .add_named(&format!("jazz{}.mp3", i), "jazz", genre_vector(0.8, 0.01 * i as f32))
            .unwrap();
    }
}

#[test]
fn test_basic_workflow() {
    let engine = ClassificationEngine::from_config(EngineConfig::default()).unwrap();
    seed(&engine);
    assert_eq!(engine.total_records(), 8);

    for mode in [VotingMode::Hybrid, VotingMode::Plurality] {
        let result = engine.classify(&genre_vector(0.12, 0.0), 3, mode).unwrap();
        assert_eq!(result.winning_label, "rock");
        assert_relative_eq!(result.confidence_percent, 100.0, epsilon = 1e-9);
        assert!(result
            .neighbors_considered
            .iter()
            .all(|n| n.display_name().starts_with("rock")));
    }

    let wrong = engine.classify(&FeatureVector::new(vec![0.1; 29]), 3, VotingMode::Hybrid);
    assert!(matches!(
        wrong,
        Err(ClassifierError::DimensionMismatch {
            expected: 30,
            actual: 29
        })
    ));
}

#[test]
fn test_persistent_engine_survives_restart() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig {
        data_dir: Some(dir.path().to_path_buf()),
        checkpoint_interval: 3,
        ..EngineConfig::default()
    };

    {
        let engine = ClassificationEngine::from_config(config.clone()).unwrap();
        seed(&engine);
    }

    let reopened = ClassificationEngine::from_config(config).unwrap();
    assert_eq!(reopened.total_records(), 8);
    assert_eq!(reopened.store().dimension(), Some(30));

    let result = reopened.classify_default(&genre_vector(0.79, 0.0)).unwrap();
    assert_eq!(result.winning_label, "jazz");
    assert!(result.neighbors_considered[0]
        .display_name()
        .starts_with("jazz"));
}

#[test]
fn test_exact_store_cache_matches_collection() {
    let dir = TempDir::new().unwrap();
    let open = || {
        ExactStore::open(
            Box::new(
                PersistentCollection::get_or_create(
                    dir.path(),
                    "songs",
                    PersistentCollectionConfig::default(),
                )
                .unwrap(),
            ),
            DistanceMetric::default(),
            RetrievalPath::LinearScan,
        )
        .unwrap()
    };

    let before = {
        let store = open();
        store
            .add("a", "rock", genre_vector(0.1, 0.0), Metadata::new())
            .unwrap();
        store
            .add("b", "jazz", genre_vector(0.9, 0.0), Metadata::new().with("year", "1959"))
            .unwrap();
        store.records().unwrap()
    };

    let after = open().records().unwrap();
    assert_eq!(before.len(), after.len());
    for (x, y) in before.iter().zip(&after) {
        assert_eq!(x.id, y.id);
        assert_eq!(x.label, y.label);
        assert_eq!(x.vector, y.vector);
    }
    assert_eq!(after[1].metadata.get("year"), Some("1959"));
}

#[test]
fn test_retrieval_paths_agree_on_plain_euclidean() {
    let build = |path| {
        let store = ExactStore::open(
            Box::new(MemoryCollection::get_or_create("songs")),
            DistanceMetric::Euclidean,
            path,
        )
        .unwrap();
        for i in 0..20 {
            store
                .add("v", "x", FeatureVector::new(vec![i as f32, (i * i % 7) as f32]), Metadata::new())
                .unwrap();
        }
        store
    };
    let scan = build(RetrievalPath::LinearScan);
    let coll = build(RetrievalPath::Collection);

    let query = FeatureVector::new(vec![4.5, 2.0]);
    let a: Vec<f32> = scan.query(&query, 5).unwrap().iter().map(|n| n.distance).collect();
    let b: Vec<f32> = coll.query(&query, 5).unwrap().iter().map(|n| n.distance).collect();
    assert_eq!(a.len(), 5);
    for (x, y) in a.iter().zip(&b) {
        assert_relative_eq!(*x, *y, epsilon = 1e-5);
    }
}

#[test]
fn test_indexed_backend_workflow() {
    for kind in [IndexKind::Flat, IndexKind::Hnsw] {
        let mut index = IndexConfig {
            kind,
            dimension: 30,
            ..IndexConfig::default()
        };
        index.hnsw.seed = Some(5);
        let engine = ClassificationEngine::from_config(EngineConfig {
            backend: BackendKind::Indexed,
            index,
            ..EngineConfig::default()
        })
        .unwrap();

        let mut east = vec![0.0; 30];
        east[0] = 1.0;
        let mut north = vec![0.0; 30];
        north[1] = 1.0;
        engine.add_named("e1", "east", FeatureVector::new(east.clone())).unwrap();
        east[2] = 0.1;
        engine.add_named("e2", "east", FeatureVector::new(east)).unwrap();
        engine.add_named("n1", "north", FeatureVector::new(north)).unwrap();

        let mut query = vec![0.0; 30];
        query[0] = 2.0;
        query[1] = 0.2;
        let result = engine
            .classify(&FeatureVector::new(query), 5, VotingMode::Hybrid)
            .unwrap();
        assert_eq!(result.winning_label, "east");
        assert_eq!(result.neighbors_considered.len(), 3);
        assert!(result
            .neighbors_considered
            .iter()
            .all(|n| n.distance >= 0.0 && n.distance <= 2.0));
    }
}

#[test]
fn test_concurrent_queries_and_inserts() {
    let engine = Arc::new(
        ClassificationEngine::from_config(EngineConfig {
            metric: DistanceMetric::Euclidean,
            ..EngineConfig::default()
        })
        .unwrap(),
    );
    engine
        .add_named("origin", "zero", FeatureVector::new(vec![0.0, 0.0]))
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..25 {
                    if t % 2 == 0 {
                        engine
                            .add_named("p", "far", FeatureVector::new(vec![10.0 + i as f32, 10.0]))
                            .unwrap();
                    } else {
                        let r = engine
                            .classify(&FeatureVector::new(vec![0.0, 0.0]), 1, VotingMode::Plurality)
                            .unwrap();
                        assert_eq!(r.winning_label, "zero");
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(engine.total_records(), 1 + 4 * 25);
    let ids: std::collections::HashSet<String> = engine
        .neighbors(&FeatureVector::new(vec![0.0, 0.0]), 200)
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(ids.len(), 101);
}

#[test]
fn test_store_shared_as_trait_object() {
    let engine = ClassificationEngine::from_config(EngineConfig::default()).unwrap();
    let store: Arc<dyn VectorStore> = engine.store();
    store
        .add("direct", "rock", genre_vector(0.1, 0.0), Metadata::new())
        .unwrap();
    assert_eq!(engine.total_records(), 1);
    assert!(matches!(
        knn_classifier::knn::top_k(store.as_ref(), &genre_vector(0.1, 0.0), 0),
        Err(ClassifierError::InvalidArgument { .. })
    ));
}
