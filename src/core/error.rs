// Centralized error handling for the gas monitor

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Input that can never be stored
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Cylinder size must be a positive number of kilograms, got {0}")]
    InvalidSize(f64),

    #[error("Unsupported cylinder size {size}KG, allowed sizes: {allowed}")]
    UnsupportedSize { size: f64, allowed: String },

    #[error("Weight must be a finite number of kilograms, got {0}")]
    InvalidWeight(f64),

    #[error("Notification threshold must be between {min}KG and {max}KG, got {value}")]
    ThresholdOutOfRange { value: f64, min: f64, max: f64 },

    #[error("Cylinder id already in use: {0}")]
    DuplicateId(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Errors raised by the pure cylinder mutations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("Cylinder not found: {0}")]
    CylinderNotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Cylinder not found: {0}")]
    CylinderNotFound(String),

    #[error("Profile already exists: {0}")]
    AlreadyExists(String),

    #[error("Profile changed concurrently: expected version {expected}, found {actual}")]
    Conflict { expected: u64, actual: u64 },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to persist profile: {0}")]
    Persistence(String),
}

impl From<MutationError> for StoreError {
    fn from(err: MutationError) -> Self {
        match err {
            MutationError::CylinderNotFound(id) => StoreError::CylinderNotFound(id),
            MutationError::Validation(e) => StoreError::Validation(e),
        }
    }
}

/// A stored cylinder whose size makes derived metrics meaningless
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Cylinder {cylinder_id} has invalid size {size}")]
pub struct IntegrityError {
    pub cylinder_id: String,
    pub size: f64,
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build message: {0}")]
    MessageBuild(String),

    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("Mail relay returned error status: {0}")]
    Rejected(u16),
}

/// Errors returned by the user-facing endpoints
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Data integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ProfileNotFound(_) | StoreError::CylinderNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            StoreError::AlreadyExists(_) | StoreError::Conflict { .. } => {
                ApiError::Conflict(err.to_string())
            }
            StoreError::Validation(e) => ApiError::InvalidParameter(e.to_string()),
            StoreError::Persistence(_) => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::InvalidParameter(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use crate::models::api::ErrorResponse;
        use axum::response::Json;

        let status = match &self {
            ApiError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Integrity(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(ErrorResponse {
                success: false,
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Error, Debug)]
pub enum MonitoringError {
    #[error("Invalid API key")]
    InvalidApiKey,
}

impl IntoResponse for MonitoringError {
    fn into_response(self) -> Response {
        match self {
            MonitoringError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                axum::response::Json(crate::models::api::ErrorResponse {
                    success: false,
                    error: "Unauthorized".to_string(),
                }),
            )
                .into_response(),
        }
    }
}
