//! Error types for the diagnosis pipeline.
//!
//! Every failure a caller can observe carries a stable machine-readable code
//! (see [`ErrorCode`]); the HTTP layer maps those codes to status codes.

use std::path::PathBuf;

use thiserror::Error;

/// Stable error codes exposed to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidContentType,
    TooLarge,
    Empty,
    InvalidFormat,
    UnrecognizedClass,
    InferenceUnavailable,
    RecommendationUnavailable,
    Unauthorized,
    MissingFile,
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidContentType => "invalid_content_type",
            ErrorCode::TooLarge => "too_large",
            ErrorCode::Empty => "empty",
            ErrorCode::InvalidFormat => "invalid_format",
            ErrorCode::UnrecognizedClass => "unrecognized_class",
            ErrorCode::InferenceUnavailable => "inference_unavailable",
            ErrorCode::RecommendationUnavailable => "recommendation_unavailable",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::MissingFile => "missing_file",
            ErrorCode::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejections raised while validating or decoding an uploaded image.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("file must be an image, got content type {0:?}")]
    InvalidContentType(Option<String>),

    #[error("file size too large ({size} bytes, max {limit})")]
    TooLarge { size: usize, limit: usize },

    #[error("empty image file")]
    Empty,

    #[error("invalid image format: {0}")]
    InvalidFormat(String),
}

impl ImageError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ImageError::InvalidContentType(_) => ErrorCode::InvalidContentType,
            ImageError::TooLarge { .. } => ErrorCode::TooLarge,
            ImageError::Empty => ErrorCode::Empty,
            ImageError::InvalidFormat(_) => ErrorCode::InvalidFormat,
        }
    }
}

/// Label table loading and resolution failures.
#[derive(Error, Debug)]
pub enum LabelError {
    #[error("class id {class_id} is not in the label table")]
    UnknownClass { class_id: usize },

    #[error("duplicate class id {0} in label table")]
    DuplicateId(usize),

    #[error("label for class id {0} has an empty plant or disease name")]
    EmptyName(usize),

    #[error("malformed class list line {line}: {content:?}")]
    MalformedLine { line: usize, content: String },

    #[error("failed to parse label table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read label table {0}: {1}")]
    Io(PathBuf, std::io::Error),
}

/// Failures of the external classifier.
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("classifier is not loaded")]
    Unavailable,

    #[error("failed to load model: {0}")]
    Load(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Failures of the curated reference store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Failures of a full diagnosis request.
#[derive(Error, Debug)]
pub enum DiagnosisError {
    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("unrecognized class: {0}")]
    UnrecognizedClass(#[source] LabelError),

    #[error("inference unavailable: {0}")]
    InferenceUnavailable(#[source] ClassifierError),

    #[error("pesticide recommendations unavailable: {0}")]
    RecommendationUnavailable(#[source] StoreError),
}

impl DiagnosisError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DiagnosisError::Image(e) => e.code(),
            DiagnosisError::UnrecognizedClass(_) => ErrorCode::UnrecognizedClass,
            DiagnosisError::InferenceUnavailable(_) => ErrorCode::InferenceUnavailable,
            DiagnosisError::RecommendationUnavailable(_) => ErrorCode::RecommendationUnavailable,
        }
    }
}

/// Problems detected while building the service configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("auth is required but no API token was configured")]
    MissingApiToken,

    #[error("failed to read {0}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("failed to parse {0}: {1}")]
    Parse(PathBuf, serde_json::Error),

    #[error(transparent)]
    Labels(#[from] LabelError),
}
