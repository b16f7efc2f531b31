//! HTTP route handlers for the classification API.

use crate::engine::EngineStats;
use crate::error::ClassifierError;
use crate::record::{Metadata, RecordId};
use crate::server::AppState;
use crate::vector::FeatureVector;
use crate::voting::{VoteResult, VotingMode};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// --- Request/Response types ---

#[derive(Deserialize)]
pub struct AddRecordRequest {
    pub vector: Vec<f32>,
    pub label: String,
    pub name: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Serialize, Deserialize)]
pub struct AddRecordResponse {
    pub id: RecordId,
    pub total_records: usize,
}

#[derive(Deserialize)]
pub struct ClassifyRequest {
    pub vector: Vec<f32>,
    pub k: Option<usize>,
    pub mode: Option<VotingMode>,
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub backend: String,
    pub total_records: usize,
}

#[derive(Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub stats: EngineStats,
    pub predictions: Vec<(String, u64)>,
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(e: ClassifierError) -> ApiError {
    let status = match &e {
        ClassifierError::LengthMismatch { .. }
        | ClassifierError::DimensionMismatch { .. }
        | ClassifierError::InvalidArgument { .. }
        | ClassifierError::InvalidVector { .. } => StatusCode::BAD_REQUEST,
        ClassifierError::NotFound(_) | ClassifierError::NoNeighbors => StatusCode::NOT_FOUND,
        ClassifierError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %e, "request failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

// --- Router ---

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/records", post(add_record))
        .route("/classify", post(classify))
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .with_state(state)
}

// --- Handlers ---

async fn add_record(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddRecordRequest>,
) -> Result<(StatusCode, Json<AddRecordResponse>), ApiError> {
    let mut metadata = req.metadata;
    if let Some(name) = req.name {
        metadata.insert(Metadata::NAME_KEY, name);
    }

    let id = state
        .engine
        .add_record(FeatureVector::new(req.vector), &req.label, metadata)
        .map_err(api_error)?;

    Ok((
        StatusCode::CREATED,
        Json(AddRecordResponse {
            id,
            total_records: state.engine.total_records(),
        }),
    ))
}

async fn classify(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ClassifyRequest>,
) -> Result<Json<VoteResult>, ApiError> {
    let config = state.engine.config();
    let k = req.k.unwrap_or(config.k);
    let mode = req.mode.unwrap_or(config.voting);

    let result = state
        .engine
        .classify(&FeatureVector::new(req.vector), k, mode)
        .map_err(api_error)?;
    Ok(Json(result))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        backend: state.engine.store().kind().to_string(),
        total_records: state.engine.total_records(),
    })
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        stats: state.engine.stats(),
        predictions: state.engine.prediction_counts(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::distance::DistanceMetric;
    use crate::engine::ClassificationEngine;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        let engine = ClassificationEngine::from_config(EngineConfig {
            metric: DistanceMetric::Euclidean,
            k: 3,
            ..EngineConfig::default()
        })
        .unwrap();
        create_router(AppState::new(engine))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_on_empty_engine() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["backend"], "exact");
        assert_eq!(body["total_records"], 0);
    }

    #[tokio::test]
    async fn test_add_then_classify() {
        let app = app();
        for (name, label, vector) in [
            ("a.mp3", "rock", [0.0, 0.0]),
            ("b.mp3", "rock", [0.2, 0.0]),
            ("c.mp3", "jazz", [4.0, 4.0]),
        ] {
            let response = app
                .clone()
                .oneshot(post_json(
                    "/records",
                    json!({ "vector": vector, "label": label, "name": name }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app
            .clone()
            .oneshot(post_json(
                "/classify",
                json!({ "vector": [0.1, 0.0], "mode": "plurality" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["winning_label"], "rock");
        assert_eq!(body["neighbors_considered"].as_array().unwrap().len(), 3);
        assert_eq!(body["neighbors_considered"][0]["metadata"]["label"], "rock");

        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["total_inserts"], 3);
        assert_eq!(body["total_classifications"], 1);
        assert_eq!(body["predictions"][0][0], "rock");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_bad_request() {
        let app = app();
        app.clone()
            .oneshot(post_json("/records", json!({ "vector": [1.0, 2.0], "label": "x" })))
            .await
            .unwrap();
        let response = app
            .oneshot(post_json("/classify", json!({ "vector": [1.0, 2.0, 3.0] })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("Dimension mismatch"));
    }

    #[tokio::test]
    async fn test_classify_empty_is_not_found() {
        let response = app()
            .oneshot(post_json("/classify", json!({ "vector": [1.0] })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_zero_k_is_bad_request() {
        let app = app();
        app.clone()
            .oneshot(post_json("/records", json!({ "vector": [1.0], "label": "x" })))
            .await
            .unwrap();
        let response = app
            .oneshot(post_json("/classify", json!({ "vector": [1.0], "k": 0 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
