//! Error types for Harbor operations

use crate::EntityRef;
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity}")]
    NotFound { entity: EntityRef },

    #[error("Parent {parent} not found for {entity}")]
    ParentNotFound { entity: EntityRef, parent: EntityRef },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: EntityRef },

    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Undecodable record {partition_key}/{sort_key}: {reason}")]
    Decode {
        partition_key: String,
        sort_key: String,
        reason: String,
    },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Immutable field {field} cannot change on {entity}")]
    ImmutableField { entity: EntityRef, field: String },

    #[error("Constraint violation on {constraint}: {reason}")]
    ConstraintViolation { constraint: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Harbor errors.
#[derive(Debug, Clone, Error)]
pub enum HarborError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// A descendant failed during a cascading operation. Ancestors written
    /// before the failure are left in place.
    #[error("Cascade failed at {entity}: {source}")]
    CascadeFailed {
        entity: EntityRef,
        source: Box<HarborError>,
    },
}

impl HarborError {
    /// The innermost error, looking through cascade wrappers.
    pub fn root_cause(&self) -> &HarborError {
        match self {
            HarborError::CascadeFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root_cause(),
            HarborError::Storage(StorageError::NotFound { .. })
        )
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        HarborError::Storage(StorageError::Unavailable {
            reason: reason.into(),
        })
    }
}

/// Result type alias for Harbor operations.
pub type HarborResult<T> = Result<T, HarborError>;

// =============================================================================
// TESTS
// =============================================================================
