//! Error Types for the Harbor API
//!
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//! - Translation of client errors into response codes
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use harbor_core::{ConfigError, HarborError, StorageError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request validation failed
    ValidationFailed,

    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    /// An identity field was changed on update
    ImmutableField,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Requested entity does not exist
    EntityNotFound,

    /// The parent of the entity being created does not exist
    ParentNotFound,

    // ========================================================================
    // Conflict Errors (409)
    // ========================================================================
    /// Entity with the same identifier already exists
    EntityAlreadyExists,

    /// Operation conflicts with current state
    StateConflict,

    // ========================================================================
    // Server Errors (500, 503)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// A stored record could not be decoded
    DataIntegrity,

    /// The backing store is temporarily unavailable
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingField
            | ErrorCode::ImmutableField => StatusCode::BAD_REQUEST,

            ErrorCode::EntityNotFound | ErrorCode::ParentNotFound => StatusCode::NOT_FOUND,

            ErrorCode::EntityAlreadyExists | ErrorCode::StateConflict => StatusCode::CONFLICT,

            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::InternalError | ErrorCode::DataIntegrity => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::ImmutableField => "Identity fields cannot be changed",
            ErrorCode::EntityNotFound => "Entity not found",
            ErrorCode::ParentNotFound => "Parent entity not found",
            ErrorCode::EntityAlreadyExists => "Entity already exists",
            ErrorCode::StateConflict => "Operation conflicts with current state",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DataIntegrity => "Stored data is corrupt",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Create a MissingField error.
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM CLIENT ERRORS
// ============================================================================

impl From<HarborError> for ApiError {
    fn from(err: HarborError) -> Self {
        match err {
            HarborError::CascadeFailed { entity, source } => {
                let failed = serde_json::to_value(&entity).unwrap_or(serde_json::Value::Null);
                let mut api_error = ApiError::from(*source);
                let cause = api_error.details.take();
                api_error.details = Some(serde_json::json!({
                    "failedEntity": failed,
                    "cause": cause,
                }));
                api_error
            }
            HarborError::Storage(err) => err.into(),
            HarborError::Validation(err) => err.into(),
            HarborError::Config(err) => err.into(),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        let message = err.to_string();
        match err {
            StorageError::NotFound { entity } => ApiError::new(ErrorCode::EntityNotFound, message)
                .with_details(serde_json::json!({ "entity": entity })),
            StorageError::ParentNotFound { entity, parent } => {
                ApiError::new(ErrorCode::ParentNotFound, message)
                    .with_details(serde_json::json!({ "entity": entity, "parent": parent }))
            }
            StorageError::AlreadyExists { entity } => {
                ApiError::new(ErrorCode::EntityAlreadyExists, message)
                    .with_details(serde_json::json!({ "entity": entity }))
            }
            StorageError::Unavailable { .. } => {
                tracing::error!(error = %message, "store unavailable");
                ApiError::from_code(ErrorCode::ServiceUnavailable)
            }
            StorageError::Decode { .. } => {
                tracing::error!(error = %message, "undecodable record");
                ApiError::from_code(ErrorCode::DataIntegrity)
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let message = err.to_string();
        match err {
            ValidationError::RequiredFieldMissing { field } => ApiError::missing_field(&field),
            ValidationError::InvalidValue { .. } => ApiError::new(ErrorCode::ValidationFailed, message),
            ValidationError::ImmutableField { entity, field } => {
                ApiError::new(ErrorCode::ImmutableField, message)
                    .with_details(serde_json::json!({ "entity": entity, "field": field }))
            }
            ValidationError::ConstraintViolation { .. } => {
                ApiError::new(ErrorCode::StateConflict, message)
            }
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::internal_error(format!("Configuration error: {}", err))
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!(error = %err, "blocking task failed");
        ApiError::internal_error("Blocking task failed")
    }
}

/// Malformed or mistyped request bodies.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_input(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

/// Query strings that do not parse (e.g. `children=maybe`).
impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::invalid_input(format!("Invalid query: {}", rejection.body_text()))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
