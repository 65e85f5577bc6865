use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::config::ServerConfig;
use crate::domain::Domain;
use crate::predictor::{Prediction, Registry};

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub input_data: Vec<f64>,
}

pub type AppState = Arc<Registry>;

pub fn router(registry: Registry) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route(&Domain::BreastCancer.route(), post(breast_cancer_predict))
        .route(&Domain::HeartDisease.route(), post(heart_disease_predict))
        .route(&Domain::Diabetes.route(), post(diabetes_predict))
        .layer(cors)
        .with_state(Arc::new(registry))
}

pub async fn serve(config: &ServerConfig, registry: Registry) -> std::io::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("medpredict listening on http://{addr}");
    axum::serve(listener, router(registry)).await
}

async fn health() -> &'static str {
    "ok"
}

async fn breast_cancer_predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Response {
    respond(Domain::BreastCancer, &state, payload)
}

async fn heart_disease_predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Response {
    respond(Domain::HeartDisease, &state, payload)
}

async fn diabetes_predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Response {
    respond(Domain::Diabetes, &state, payload)
}

/// Every failure becomes a 400 carrying the error text.
fn respond(
    domain: Domain,
    registry: &Registry,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Response {
    let result = payload
        .map_err(|rejection| rejection.body_text())
        .and_then(|Json(request)| {
            let predictor = registry
                .get(domain)
                .ok_or_else(|| format!("No model loaded for {domain}"))?;
            log::debug!("{domain} request with {} feature(s)", request.input_data.len());
            predictor
                .predict(&request.input_data)
                .map_err(|e| e.to_string())
        });

    match result {
        Ok(prediction) => {
            log::debug!("{domain} prediction: {}", prediction.message);
            (StatusCode::OK, Json(prediction_body(domain, &prediction))).into_response()
        }
        Err(message) => {
            log::warn!("Rejected {domain} request: {message}");
            (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
        }
    }
}

fn prediction_body(domain: Domain, prediction: &Prediction) -> Value {
    let spec = domain.spec();
    let mut body = Map::new();
    body.insert("prediction".to_string(), json!(prediction.class));
    body.insert("message".to_string(), json!(prediction.message));
    for (key, probability) in spec.probability_keys.iter().zip(prediction.probabilities) {
        body.insert((*key).to_string(), json!(probability));
    }
    Value::Object(body)
}
