//! HTTP boundary: routes, shared state and error responses.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Query, State},
    http::{header, HeaderMap, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ClassifierMode;
use crate::diagnosis::{DiagnosisAssembler, DiagnosisResult};
use crate::error::{DiagnosisError, ErrorCode, StoreError};
use crate::recommend::PesticideRecord;
use crate::store::{PesticideStore, SeedSummary, SqliteStore};

/// Room for multipart boundaries and part headers on top of the image itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub classifier_mode: ClassifierMode,
    pub max_upload_bytes: usize,
    pub auth_required: bool,
    pub api_token: Option<String>,
}

pub struct AppState {
    pub config: ServiceConfig,
    pub assembler: Arc<DiagnosisAssembler>,
    pub catalog: Arc<SqliteStore>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: ServiceConfig, assembler: DiagnosisAssembler, catalog: Arc<SqliteStore>) -> Self {
        Self {
            config,
            assembler: Arc::new(assembler),
            catalog,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;

#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    detail: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self.code {
            ErrorCode::InvalidContentType
            | ErrorCode::Empty
            | ErrorCode::InvalidFormat
            | ErrorCode::MissingFile => StatusCode::BAD_REQUEST,
            ErrorCode::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::InferenceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::RecommendationUnavailable => StatusCode::BAD_GATEWAY,
            ErrorCode::UnrecognizedClass | ErrorCode::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<DiagnosisError> for ApiError {
    fn from(err: DiagnosisError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        error!("Store error: {}", err);
        Self::new(ErrorCode::Internal, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.code.as_str(),
            "detail": self.detail,
        }));
        (self.status(), body).into_response()
    }
}

pub fn create_router(state: SharedState) -> Router {
    let body_limit = state.config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);

    let protected = Router::new()
        .route("/predict", post(predict))
        .route("/predict/", post(predict))
        .route("/seed-data", post(seed_data))
        .route("/seed-data/", post(seed_data))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/pesticides", get(list_pesticides))
        .route("/pesticides/", get(list_pesticides))
        .merge(protected)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn require_bearer<B>(
    State(state): State<SharedState>,
    request: Request<B>,
    next: Next<B>,
) -> Result<Response, ApiError> {
    if !state.config.auth_required {
        return Ok(next.run(request).await);
    }

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match (state.config.api_token.as_deref(), provided) {
        (Some(expected), Some(token)) if tokens_match(token, expected) => {
            Ok(next.run(request).await)
        }
        _ => Err(ApiError::new(
            ErrorCode::Unauthorized,
            "missing or invalid bearer token",
        )),
    }
}

/// Compares every byte regardless of where the first mismatch is.
fn tokens_match(provided: &str, expected: &str) -> bool {
    if provided.len() != expected.len() {
        return false;
    }
    provided
        .bytes()
        .zip(expected.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Agri-AI Backend API",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub classifier_mode: ClassifierMode,
    pub classifier_loaded: bool,
}

async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        classifier_mode: state.config.classifier_mode,
        classifier_loaded: state.assembler.has_classifier(),
    })
}

/// A body cut off by `DefaultBodyLimit` surfaces as a multipart error when
/// the client sent no `Content-Length`.
fn multipart_rejection(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new(
            ErrorCode::TooLarge,
            format!("file size too large (max {limit} bytes)"),
        )
    } else {
        ApiError::new(ErrorCode::InvalidFormat, err.body_text())
    }
}

/// POST /predict - diagnose an uploaded leaf photo (multipart field `file`)
async fn predict(
    State(state): State<SharedState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<DiagnosisResult>, ApiError> {
    let limit = state.config.max_upload_bytes;
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if let Some(size) = declared.filter(|&size| size > limit.saturating_add(MULTIPART_OVERHEAD)) {
        return Err(ApiError::new(
            ErrorCode::TooLarge,
            format!("file size too large ({size} bytes, max {limit})"),
        ));
    }

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_rejection(e, limit))?
    {
        if field.name() == Some("file") {
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| multipart_rejection(e, limit))?;
            upload = Some((content_type, bytes));
            break;
        }
    }

    let (content_type, bytes) =
        upload.ok_or_else(|| ApiError::new(ErrorCode::MissingFile, "No file uploaded"))?;

    let assembler = state.assembler.clone();
    let result = tokio::task::spawn_blocking(move || {
        assembler.diagnose_upload(content_type.as_deref(), &bytes)
    })
    .await
    .map_err(|e| {
        error!("Diagnosis task failed: {}", e);
        ApiError::new(ErrorCode::Internal, "diagnosis task failed")
    })??;

    info!(
        "Diagnosed {} / {} ({:.2}%{})",
        result.plant,
        result.disease,
        result.confidence,
        if result.synthetic { ", synthetic" } else { "" }
    );

    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct PesticideQuery {
    pub plant: Option<String>,
    pub disease: Option<String>,
}

/// GET /pesticides - curated pesticides, optionally filtered by plant OR disease
async fn list_pesticides(
    State(state): State<SharedState>,
    Query(query): Query<PesticideQuery>,
) -> Result<Json<Vec<PesticideRecord>>, ApiError> {
    let records = match (&query.plant, &query.disease) {
        (Some(plant), Some(disease)) => state
            .catalog
            .query_by_plant_or_disease(&plant.to_lowercase(), &disease.to_lowercase())?,
        _ => state.catalog.list_pesticides()?,
    };
    Ok(Json(records))
}

#[derive(Serialize)]
pub struct SeedResponse {
    pub message: String,
    pub inserted: SeedSummary,
}

/// POST /seed-data - insert sample reference data
async fn seed_data(State(state): State<SharedState>) -> Result<Json<SeedResponse>, ApiError> {
    let inserted = state.catalog.seed()?;
    Ok(Json(SeedResponse {
        message: "Database seeded successfully".to_string(),
        inserted,
    }))
}
