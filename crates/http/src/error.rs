//! Error handling for the Vitrina HTTP layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;
use vitrina_db::DataError;

/// Standard error response format for all HTTP errors
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub details: Vec<serde_json::Value>,
    pub message: String,
    pub code: String,
    pub trace_id: String,
    pub timestamp: String,
}

/// Application error types that map to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {message}")]
    Validation {
        details: Vec<serde_json::Value>,
        code: String,
        message: String,
    },

    #[error("conflict: {message}")]
    Conflict {
        details: Vec<serde_json::Value>,
        code: String,
        message: String,
    },

    #[error("not found: {message}")]
    NotFound {
        details: Vec<serde_json::Value>,
        message: String,
        code: String,
    },

    #[error("unavailable: {message}")]
    Unavailable {
        details: Vec<serde_json::Value>,
        message: String,
        code: String,
    },

    #[error("bad request: {message}")]
    BadRequest { message: String, code: String },

    /// Internal failure whose user-facing text was set by the caller.
    /// The cause is logged and never rendered.
    #[error("{message}")]
    Localized {
        details: Vec<serde_json::Value>,
        message: String,
        cause: anyhow::Error,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a validation error
    pub fn validation(details: Vec<serde_json::Value>, message: impl Into<String>) -> Self {
        Self::Validation {
            details,
            code: "validation_error".to_string(),
            message: message.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(details: Vec<serde_json::Value>, message: impl Into<String>) -> Self {
        Self::Conflict {
            details,
            code: "conflict".to_string(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            details: Vec::new(),
            message: message.into(),
            code: "not_found".to_string(),
        }
    }

    /// Backend unreachable or overloaded after retries
    pub fn unavailable(details: Vec<serde_json::Value>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            details,
            message: message.into(),
            code: "backend_unavailable".to_string(),
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            code: "bad_request".to_string(),
        }
    }

    /// Replace the user-facing message, keeping status and code.
    pub fn with_message(self, text: impl Into<String>) -> Self {
        let text = text.into();
        match self {
            AppError::Validation { details, code, .. } => AppError::Validation {
                details,
                code,
                message: text,
            },
            AppError::Conflict { details, code, .. } => AppError::Conflict {
                details,
                code,
                message: text,
            },
            AppError::NotFound { details, code, .. } => AppError::NotFound {
                details,
                code,
                message: text,
            },
            AppError::Unavailable { details, code, .. } => AppError::Unavailable {
                details,
                code,
                message: text,
            },
            AppError::BadRequest { code, .. } => AppError::BadRequest {
                code,
                message: text,
            },
            AppError::Localized { details, cause, .. } => AppError::Localized {
                details,
                message: text,
                cause,
            },
            AppError::Internal(cause) => AppError::Localized {
                details: Vec::new(),
                message: text,
                cause,
            },
        }
    }

    /// Append a detail entry. Errors without a details list are unchanged.
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        match &mut self {
            AppError::Validation { details, .. }
            | AppError::Conflict { details, .. }
            | AppError::NotFound { details, .. }
            | AppError::Unavailable { details, .. }
            | AppError::Localized { details, .. } => details.push(detail),
            AppError::BadRequest { .. } | AppError::Internal(_) => {}
        }
        self
    }
}

impl From<DataError> for AppError {
    fn from(err: DataError) -> Self {
        let attempts = match &err {
            DataError::RetriesExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        };

        match err.root().clone() {
            DataError::Validation { field, message } => {
                AppError::validation(vec![json!({ "field": field, "error": message })], message)
            }
            not_found @ DataError::NotFound { .. } => AppError::not_found(not_found.to_string()),
            DataError::Constraint { code, message } => {
                AppError::conflict(vec![json!({ "backend_code": code })], message)
            }
            DataError::Transient { message } => {
                let details = attempts
                    .map(|attempts| vec![json!({ "attempts": attempts })])
                    .unwrap_or_default();
                AppError::unavailable(details, message)
            }
            DataError::Internal { message } => AppError::Internal(anyhow::anyhow!(message)),
            // root() never returns the exhausted wrapper
            exhausted @ DataError::RetriesExhausted { .. } => {
                AppError::Internal(anyhow::anyhow!(exhausted.to_string()))
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| OffsetDateTime::now_utc().to_string());

        let (status, error_code, message, details, cause) = match self {
            AppError::Validation {
                details,
                code,
                message,
            } => (StatusCode::UNPROCESSABLE_ENTITY, code, message, details, None),
            AppError::Conflict {
                details,
                code,
                message,
            } => (StatusCode::CONFLICT, code, message, details, None),
            AppError::NotFound {
                details,
                message,
                code,
            } => (StatusCode::NOT_FOUND, code, message, details, None),
            AppError::Unavailable {
                details,
                message,
                code,
            } => (StatusCode::SERVICE_UNAVAILABLE, code, message, details, None),
            AppError::BadRequest { message, code } => {
                (StatusCode::BAD_REQUEST, code, message, Vec::new(), None)
            }
            AppError::Localized {
                details,
                message,
                cause,
            } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error".to_string(),
                message,
                details,
                Some(format!("{:#}", cause)),
            ),
            AppError::Internal(e) => {
                let cause = format!("{:#}", e);
                // Hide internal error details outside debug builds
                let message = if cfg!(debug_assertions) {
                    cause.clone()
                } else {
                    "An internal server error occurred".to_string()
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error".to_string(),
                    message,
                    Vec::new(),
                    Some(cause),
                )
            }
        };

        if status.is_server_error() {
            tracing::error!(
                error_id = %error_id,
                error_code = %error_code,
                status_code = %status.as_u16(),
                message = %message,
                cause = cause.as_deref().unwrap_or_default(),
                "Request error"
            );
        } else {
            tracing::warn!(
                error_id = %error_id,
                error_code = %error_code,
                status_code = %status.as_u16(),
                "Request error"
            );
        }

        let body = ErrorBody {
            details,
            message,
            code: error_code,
            trace_id: error_id.to_string(),
            timestamp,
        };

        (status, Json(json!({ "error": body }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::StatusCode;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_validation_error() {
        let details = vec![serde_json::json!({"field": "slug", "error": "required"})];
        let error = AppError::validation(details.clone(), "Validation failed");

        match error {
            AppError::Validation {
                details: d,
                code,
                message,
            } => {
                assert_eq!(d, details);
                assert_eq!(code, "validation_error");
                assert_eq!(message, "Validation failed");
            }
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn data_errors_map_to_statuses() {
        let cases = [
            (
                DataError::validation("image_url", "La imagen es requerida"),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (DataError::not_found("post", "hola"), StatusCode::NOT_FOUND),
            (
                DataError::constraint("23505", "duplicate key"),
                StatusCode::CONFLICT,
            ),
            (
                DataError::RetriesExhausted {
                    attempts: 4,
                    last: Box::new(DataError::transient("timeout")),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (DataError::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn validation_keeps_field_and_message() {
        let error = AppError::from(DataError::validation("image_url", "La imagen es requerida"));
        let body = body_json(error.into_response()).await;

        assert_eq!(body["error"]["message"], "La imagen es requerida");
        assert_eq!(body["error"]["details"][0]["field"], "image_url");
    }

    #[tokio::test]
    async fn localized_message_with_retry_hint() {
        let error = AppError::from(DataError::transient("timeout"))
            .with_message("No se pudieron cargar los servicios. Por favor, intenta más tarde.")
            .with_detail(json!({ "retry": true }));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = body_json(response).await;
        assert_eq!(
            body["error"]["message"],
            "No se pudieron cargar los servicios. Por favor, intenta más tarde."
        );
        assert_eq!(body["error"]["details"][0]["retry"], true);
    }

    #[tokio::test]
    async fn localized_internal_error_keeps_its_text() {
        let error = AppError::from(DataError::internal("column \"slug\" missing"))
            .with_message("No se pudieron cargar las publicaciones");
        assert!(matches!(error, AppError::Localized { .. }));

        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "internal_error");
        assert_eq!(body["error"]["message"], "No se pudieron cargar las publicaciones");
    }

    #[tokio::test]
    async fn test_error_response_format() {
        let error = AppError::not_found("Test resource not found");
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "not_found");
        assert!(Uuid::parse_str(body["error"]["trace_id"].as_str().unwrap()).is_ok());
        assert!(OffsetDateTime::parse(body["error"]["timestamp"].as_str().unwrap(), &Rfc3339).is_ok());
    }
}
