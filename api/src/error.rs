use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::validation::ValidationError;

const CORRELATION_ID_HEADER: &str = "x-correlation-id";

#[derive(Debug)]
pub enum ApiError {
    /// Plain error with a status, a machine-readable name and a message
    Status {
        status: StatusCode,
        error: String,
        message: String,
    },
    /// Field-level input validation failure
    Validation(ValidationError),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    code: u16,
    timestamp: String,
    correlation_id: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            error: error.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "Forbidden", message)
    }

    pub fn not_found(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "InternalServerError", message)
    }

    /// Log a database failure and hide its details from the client
    pub fn database(operation: &str, err: sqlx::Error) -> Self {
        tracing::error!(operation = operation, error = ?err, "database operation failed");
        Self::internal("An unexpected database error occurred")
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Status { status, .. } => *status,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<crate::validation::QueryValidationError> for ApiError {
    fn from(err: crate::validation::QueryValidationError) -> Self {
        Self::Validation(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            Self::Validation(err) => return err.into_response(),
            Self::Status {
                status,
                error,
                message,
            } => (status, error, message),
        };

        let correlation_id = Uuid::new_v4().to_string();
        let payload = ErrorResponse {
            error,
            message,
            code: status.as_u16(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            correlation_id: correlation_id.clone(),
        };

        let mut response = (status, Json(payload)).into_response();
        if let Ok(value) = HeaderValue::from_str(&correlation_id) {
            response
                .headers_mut()
                .insert(header::HeaderName::from_static(CORRELATION_ID_HEADER), value);
        }
        response
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
