use serde::{Deserialize, Serialize};
use thiserror::Error;
use vitrina_events::SubscribeError;

/// Broad failure class used for retry decisions and caller handling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or malformed input, rejected before any network call.
    Validation,
    /// Expected row is absent.
    NotFound,
    /// Network, timeout, or overload failure; eligible for retry.
    Transient,
    /// Backend rejected the request (duplicate slug, policy, bad filter).
    Constraint,
    /// Unexpected response or local invariant break.
    Internal,
}

/// Error returned by every gateway and content operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataError {
    #[error("{message}")]
    Validation { field: &'static str, message: String },

    #[error("{entity} not found: {key}")]
    NotFound { entity: String, key: String },

    #[error("transient backend failure: {message}")]
    Transient { message: String },

    #[error("{message}")]
    Constraint { code: String, message: String },

    #[error("unexpected backend failure: {message}")]
    Internal { message: String },

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<DataError> },
}

impl DataError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            key: key.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub fn constraint(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Constraint {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Failure class; exhausted retries report the class of the last failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataError::Validation { .. } => ErrorKind::Validation,
            DataError::NotFound { .. } => ErrorKind::NotFound,
            DataError::Transient { .. } => ErrorKind::Transient,
            DataError::Constraint { .. } => ErrorKind::Constraint,
            DataError::Internal { .. } => ErrorKind::Internal,
            DataError::RetriesExhausted { last, .. } => last.kind(),
        }
    }

    /// Only a fresh transient failure may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DataError::Transient { .. })
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, DataError::RetriesExhausted { .. })
    }

    /// The underlying failure, unwrapping the exhausted-retries tag.
    pub fn root(&self) -> &DataError {
        match self {
            DataError::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }
}

impl From<SubscribeError> for DataError {
    fn from(err: SubscribeError) -> Self {
        DataError::internal(err.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::internal(format!("malformed row: {err}"))
    }
}

/// Map HTTP status codes returned by the table API to failure classes.
pub fn classify_http_status(status: u16) -> ErrorKind {
    match status {
        408 | 425 | 429 => ErrorKind::Transient,
        404 | 406 => ErrorKind::NotFound,
        400..=499 => ErrorKind::Constraint,
        500..=599 => ErrorKind::Transient,
        _ => ErrorKind::Internal,
    }
}
