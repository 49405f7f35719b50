use std::fmt;
use serde::Serialize;
use thiserror::Error;

/// Domain-level errors
#[derive(Debug, Error, Clone, Serialize)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Service-level errors (application specific)
#[derive(Debug, Error, Clone, Serialize)]
pub enum ServiceError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Participant already exists: {0}")]
    ParticipantAlreadyExists(String),

    #[error("Session expired")]
    SessionExpired,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ServiceError {
    /// Whether the error means the operator has to log in again
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ServiceError::SessionExpired)
    }
}

impl From<ValidationError> for ServiceError {
    fn from(error: ValidationError) -> Self {
        ServiceError::Domain(DomainError::Validation(error))
    }
}

/// Validation errors
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required {
        field: String,
    },

    #[error("Field '{field}' contains invalid format: {reason}")]
    Format {
        field: String,
        reason: String,
    },

    #[error("Field '{field}' contains an invalid value: {reason}")]
    InvalidValue {
        field: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    Custom(String),
}

impl ValidationError {
    pub fn required(field: &str) -> Self {
        Self::Required {
            field: field.to_string(),
        }
    }

    pub fn format(field: &str, reason: &str) -> Self {
        Self::Format {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_value<T: fmt::Display>(field: &str, reason: T) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn custom(message: &str) -> Self {
        Self::Custom(message.to_string())
    }

    /// Name of the field this error refers to, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Required { field }
            | Self::Format { field, .. }
            | Self::InvalidValue { field, .. } => Some(field),
            Self::Custom(_) => None,
        }
    }
}
