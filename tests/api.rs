// Router-level tests: multipart uploads through /predict with stub
// classifiers, plus the reference-data endpoints.

use std::io::Cursor;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use serde_json::Value;
use tower::ServiceExt; // for oneshot

use leafcheck::config::ClassifierMode;
use leafcheck::decoder::{ImageDecoder, ImageTensor, INPUT_SIZE};
use leafcheck::diagnosis::DiagnosisAssembler;
use leafcheck::disease_info::{BuiltinDiseaseInfo, DiseaseInfoLookup};
use leafcheck::error::ClassifierError;
use leafcheck::labels::{ClassLabel, LabelResolver, LabelTable};
use leafcheck::model::Classifier;
use leafcheck::recommend::{DefaultPesticideTable, RecommendationLookup, StoreErrorPolicy};
use leafcheck::server::{create_router, AppState, ServiceConfig};
use leafcheck::store::SqliteStore;

const BOUNDARY: &str = "leafcheck-test-boundary";
const MAX_UPLOAD: usize = 1024 * 1024;

/// Always predicts `index` with probability `p`.
struct FixedClassifier {
    index: usize,
    p: f32,
    num_classes: usize,
}

impl Classifier for FixedClassifier {
    fn infer(&self, tensor: &ImageTensor) -> Result<Vec<f32>, ClassifierError> {
        assert_eq!(tensor.shape(), [1, 224, 224, 3]);
        let mut probabilities = vec![0.0; self.num_classes];
        probabilities[self.index] = self.p;
        Ok(probabilities)
    }
}

fn labels() -> LabelTable {
    LabelTable::from_entries([
        (0, ClassLabel::new("Apple", "Apple_scab")),
        (1, ClassLabel::new("Apple", "Black_rot")),
        (2, ClassLabel::new("Apple", "Cedar_apple_rust")),
        (3, ClassLabel::new("Apple", "healthy")),
        (4, ClassLabel::new("Tomato", "Early_blight")),
    ])
    .unwrap()
}

struct TestApp {
    router: Router,
    catalog: Arc<SqliteStore>,
}

fn app_with(classifier: Option<Arc<dyn Classifier>>, auth_token: Option<&str>) -> TestApp {
    let catalog = Arc::new(SqliteStore::open_in_memory().unwrap());

    let mut assembler = DiagnosisAssembler::new(
        LabelResolver::new(labels()),
        RecommendationLookup::new(
            catalog.clone(),
            DefaultPesticideTable::builtin().unwrap(),
            StoreErrorPolicy::Fallback,
        ),
        DiseaseInfoLookup::new(catalog.clone(), BuiltinDiseaseInfo::default()),
    )
    .with_decoder(ImageDecoder::new(INPUT_SIZE, MAX_UPLOAD));
    if let Some(classifier) = classifier {
        assembler = assembler.with_classifier(classifier);
    }

    let config = ServiceConfig {
        classifier_mode: ClassifierMode::Real,
        max_upload_bytes: MAX_UPLOAD,
        auth_required: auth_token.is_some(),
        api_token: auth_token.map(str::to_string),
    };
    let state = Arc::new(AppState::new(config, assembler, catalog.clone()));

    TestApp {
        router: create_router(state),
        catalog,
    }
}

fn fixed(index: usize, p: f32) -> Option<Arc<dyn Classifier>> {
    Some(Arc::new(FixedClassifier {
        index,
        p,
        num_classes: 1000,
    }))
}

fn solid_jpeg(color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(224, 224, Rgb(color));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Jpeg(90))
        .unwrap();
    buf
}

fn multipart_body(content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"file\"; filename=\"leaf.jpg\"\r\n",
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload(uri: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(content_type, bytes)))
        .unwrap()
}

async fn json_response(response: axum::response::Response) -> Value {
    let body = hyper::body::to_bytes(response.into_body())
        .await
        .expect("Failed to read response body");
    serde_json::from_slice(&body).expect("Failed to parse JSON")
}

#[tokio::test]
async fn healthy_apple_end_to_end() {
    let app = app_with(fixed(3, 0.91), None);

    let response = app
        .router
        .oneshot(upload("/predict", "image/jpeg", &solid_jpeg([40, 160, 40])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_response(response).await;
    assert_eq!(body["plant"], "Apple");
    assert_eq!(body["disease"], "healthy");
    assert_eq!(body["confidence"], 91.0);
    assert_eq!(body["is_healthy"], true);
    assert_eq!(body["recommended_pesticides"], Value::Array(vec![]));
    assert_eq!(body["synthetic"], false);
}

#[tokio::test]
async fn trailing_slash_route_and_curated_recommendations() {
    let app = app_with(fixed(4, 0.8), None);
    app.catalog.seed().unwrap();

    let response = app
        .router
        .oneshot(upload("/predict/", "image/jpeg", &solid_jpeg([120, 90, 30])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_response(response).await;
    assert_eq!(body["disease"], "Early_blight");
    assert_eq!(body["is_healthy"], false);
    assert_eq!(body["disease_info"], "Brown spots with concentric rings");

    let prices: Vec<f64> = body["recommended_pesticides"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["price"].as_f64().unwrap())
        .collect();
    assert_eq!(prices, [180.0, 250.0]);
    assert_eq!(body["recommended_pesticides"][0]["type"], "Fungicide");
}

#[tokio::test]
async fn empty_upload_is_rejected() {
    let app = app_with(fixed(3, 0.91), None);

    let response = app
        .router
        .oneshot(upload("/predict", "image/jpeg", &[]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_response(response).await["error"], "empty");
}

#[tokio::test]
async fn non_image_content_type_is_rejected() {
    let app = app_with(fixed(3, 0.91), None);

    let response = app
        .router
        .oneshot(upload("/predict", "text/plain", b"hello"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_response(response).await["error"], "invalid_content_type");
}

#[tokio::test]
async fn corrupt_image_is_invalid_format() {
    let app = app_with(fixed(3, 0.91), None);

    let response = app
        .router
        .oneshot(upload("/predict", "image/png", b"\x89PNG not really"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_response(response).await["error"], "invalid_format");
}

#[tokio::test]
async fn oversized_upload_is_too_large() {
    let app = app_with(fixed(3, 0.91), None);
    let bytes = vec![0u8; MAX_UPLOAD + 1];

    let response = app
        .router
        .oneshot(upload("/predict", "image/jpeg", &bytes))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_response(response).await["error"], "too_large");
}

#[tokio::test]
async fn body_over_limit_without_content_length_is_too_large() {
    let app = app_with(fixed(3, 0.91), None);
    let request = upload("/predict", "image/jpeg", &vec![0u8; MAX_UPLOAD * 2]);
    assert!(request.headers().get(header::CONTENT_LENGTH).is_none());

    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_response(response).await["error"], "too_large");
}

#[tokio::test]
async fn class_outside_label_table_is_server_error() {
    let app = app_with(fixed(999, 0.99), None);

    let response = app
        .router
        .oneshot(upload("/predict", "image/jpeg", &solid_jpeg([0, 0, 0])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = json_response(response).await;
    assert_eq!(body["error"], "unrecognized_class");
    assert!(body.get("plant").is_none());
}

#[tokio::test]
async fn missing_classifier_returns_flagged_synthetic_result() {
    let app = app_with(None, None);

    let response = app
        .router
        .oneshot(upload("/predict", "image/jpeg", &solid_jpeg([10, 200, 10])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_response(response).await;
    assert_eq!(body["synthetic"], true);
    let confidence = body["confidence"].as_f64().unwrap();
    assert!((75.0..=95.0).contains(&confidence));
}

#[tokio::test]
async fn missing_file_field_is_rejected() {
    let app = app_with(fixed(3, 0.91), None);
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n--{BOUNDARY}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_response(response).await["error"], "missing_file");
}

#[tokio::test]
async fn auth_gate_requires_matching_bearer_token() {
    let app = app_with(fixed(3, 0.91), Some("s3cret"));

    let response = app
        .router
        .clone()
        .oneshot(upload("/predict", "image/jpeg", &solid_jpeg([1, 2, 3])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_response(response).await["error"], "unauthorized");

    let mut request = upload("/predict", "image/jpeg", &solid_jpeg([1, 2, 3]));
    request.headers_mut().insert(
        header::AUTHORIZATION,
        "Bearer s3cret".parse().unwrap(),
    );
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Read-only endpoints stay public.
    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn seed_then_filter_pesticides() {
    let app = app_with(None, None);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/seed-data")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_response(response).await;
    assert_eq!(body["inserted"]["pesticides"], 3);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/pesticides")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(json_response(response).await.as_array().unwrap().len(), 3);

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/pesticides?plant=Potato&disease=Bacterial_spot")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_response(response).await;
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Copper Hydroxide", "Metalaxyl + Mancozeb"]);
}

#[tokio::test]
async fn health_reports_classifier_state() {
    let app = app_with(None, None);

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_response(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["classifier_mode"], "real");
    assert_eq!(body["classifier_loaded"], false);
}
