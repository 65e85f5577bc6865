use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use approx::assert_abs_diff_eq;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use medpredict::{
    config::Config,
    domain::{Domain, LabelEncoding},
    pipeline::train_and_save,
    predictor::Registry,
    server::router,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const ROWS_PER_CLASS: usize = 60;

/// Mean of feature `j` for `class`; the classes sit two units apart.
fn centre(j: usize, class: usize) -> f64 {
    20.0 + 5.0 * j as f64 + 2.0 * class as f64
}

fn reference_input(domain: Domain, class: usize) -> Vec<f64> {
    (0..domain.dimensions()).map(|j| centre(j, class)).collect()
}

/// CSV with the raw header of each dataset: dropped columns, features and label.
fn write_dataset(domain: Domain, dir: &Path) {
    let spec = domain.spec();
    let mut rng = StdRng::seed_from_u64(17);

    let mut header: Vec<&str> = spec.dropped_columns.to_vec();
    header.extend_from_slice(spec.feature_columns);
    header.push(spec.label_column);

    let mut csv = String::new();
    let quoted: Vec<String> = header.iter().map(|name| format!("\"{name}\"")).collect();
    writeln!(csv, "{}", quoted.join(",")).unwrap();

    for row in 0..ROWS_PER_CLASS * 2 {
        let class = row % 2;
        let mut fields: Vec<String> = spec
            .dropped_columns
            .iter()
            .map(|_| rng.gen_range(0..1000).to_string())
            .collect();
        for j in 0..spec.feature_columns.len() {
            let value = centre(j, class) + rng.gen_range(-0.8..0.8);
            fields.push(format!("{value:.4}"));
        }
        let label = match spec.label_encoding {
            LabelEncoding::Categorical { positive, negative } => {
                let code = if class == 1 { positive } else { negative };
                code.to_string()
            }
            LabelEncoding::Binary => class.to_string(),
        };
        fields.push(label);
        writeln!(csv, "{}", fields.join(",")).unwrap();
    }

    fs::write(dir.join(domain.dataset_file_name()), csv).unwrap();
}

struct Service {
    _workspace: TempDir,
    app: Router,
}

fn trained_service() -> Service {
    let workspace = tempfile::tempdir().unwrap();
    let datasets = workspace.path().join("dataset");
    fs::create_dir_all(&datasets).unwrap();

    let mut config = Config::default();
    config.artifacts.model_dir = workspace.path().join("model");
    config.artifacts.scaler_dir = workspace.path().join("scaler");

    for domain in Domain::ALL {
        write_dataset(domain, &datasets);
        let report = train_and_save(domain, &datasets, &config).unwrap();
        assert!(report.test_accuracy > 0.9, "{domain}: {report:?}");
    }

    let registry = Registry::load(&config).unwrap();
    Service {
        _workspace: workspace,
        app: router(registry),
    }
}

async fn post(app: &Router, uri: &str, body: String) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn predict(app: &Router, domain: Domain, input: &[f64]) -> (StatusCode, Value) {
    post(app, &domain.route(), json!({ "input_data": input }).to_string()).await
}

#[tokio::test]
async fn reference_inputs_get_expected_labels() {
    let service = trained_service();

    for domain in Domain::ALL {
        let spec = domain.spec();
        for class in [0, 1] {
            let (status, body) = predict(&service.app, domain, &reference_input(domain, class)).await;

            assert_eq!(status, StatusCode::OK, "{domain}: {body}");
            assert_eq!(body["prediction"], class);
            assert_eq!(body["message"], spec.message(class));

            let own = body[spec.probability_keys[class]].as_f64().unwrap();
            assert!(own > 0.5, "{domain} class {class}: {body}");
        }
    }
}

#[tokio::test]
async fn probabilities_sum_to_one() {
    let service = trained_service();
    let mut rng = StdRng::seed_from_u64(3);

    for domain in Domain::ALL {
        let keys = domain.spec().probability_keys;
        for _ in 0..10 {
            let input: Vec<f64> = (0..domain.dimensions())
                .map(|j| centre(j, 0) + rng.gen_range(-4.0..6.0))
                .collect();
            let (status, body) = predict(&service.app, domain, &input).await;

            assert_eq!(status, StatusCode::OK);
            let total = body[keys[0]].as_f64().unwrap() + body[keys[1]].as_f64().unwrap();
            assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
        }
    }
}

#[tokio::test]
async fn wrong_length_is_bad_request() {
    let service = trained_service();

    for domain in Domain::ALL {
        for length in [0, domain.dimensions() - 1, domain.dimensions() + 1] {
            let (status, body) = predict(&service.app, domain, &vec![1.0; length]).await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            let message = body["error"].as_str().unwrap();
            assert!(message.contains(&domain.dimensions().to_string()), "{message}");
        }
    }
}

#[tokio::test]
async fn malformed_bodies_are_bad_request() {
    let service = trained_service();
    let route = Domain::Diabetes.route();

    for body in [
        r#"{"features": [1, 2, 3, 4, 5, 6, 7]}"#,
        r#"{"input_data": [1, 2, "three", 4, 5, 6, 7]}"#,
        r#"{"input_data": 7}"#,
        "not json",
    ] {
        let (status, response) = post(&service.app, &route, body.to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert!(response["error"].is_string(), "{body}");
    }
}

#[tokio::test]
async fn identical_requests_get_identical_answers() {
    let service = trained_service();
    let input = reference_input(Domain::HeartDisease, 1);

    let (_, first) = predict(&service.app, Domain::HeartDisease, &input).await;
    for _ in 0..3 {
        let (_, again) = predict(&service.app, Domain::HeartDisease, &input).await;
        assert_eq!(again, first);
    }
}

#[tokio::test]
async fn health_endpoint_answers() {
    let service = trained_service();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let response = service.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[test]
fn startup_fails_without_artifacts() {
    let workspace = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.artifacts.model_dir = workspace.path().join("model");
    config.artifacts.scaler_dir = workspace.path().join("scaler");

    assert!(Registry::load(&config).is_err());
}
