//! HTTP error responses
//!
//! Every failed request answers with the same JSON body:
//!
//! ```json
//! { "message": "Unknown collection: nope", "code": "ENTITY_NOT_FOUND" }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

use crate::services::ContentServiceError;

/// JSON error body with a machine-readable code
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpError {
    /// User-facing error message
    pub message: String,
    /// Machine-readable error code
    pub code: String,
    /// Optional detailed error information for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl HttpError {
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(
        message: impl Into<String>,
        code: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            details: Some(details.into()),
        }
    }

    /// Status code a response with this error carries
    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "ENTITY_NOT_FOUND" | "DOCUMENT_NOT_FOUND" => StatusCode::NOT_FOUND,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "INVALID_INPUT" | "INVALID_WHERE" | "NOT_VERSIONED" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{} ({})", self.message, self.code);
        }
        (status, Json(self)).into_response()
    }
}

impl From<ContentServiceError> for HttpError {
    fn from(err: ContentServiceError) -> Self {
        let code = match &err {
            ContentServiceError::EntityNotFound { .. } => "ENTITY_NOT_FOUND",
            ContentServiceError::DocumentNotFound { .. } => "DOCUMENT_NOT_FOUND",
            ContentServiceError::Forbidden { .. } => "FORBIDDEN",
            ContentServiceError::NotVersioned { .. } => "NOT_VERSIONED",
            ContentServiceError::InvalidPredicate(_) | ContentServiceError::InvalidWhere(_) => "INVALID_WHERE",
            ContentServiceError::InvalidInput(_) => "INVALID_INPUT",
            ContentServiceError::Schema(_) => "SCHEMA_ERROR",
            ContentServiceError::Store(_) => "STORE_ERROR",
            ContentServiceError::Serialization(_) => "SERIALIZATION_ERROR",
        };

        match err {
            ContentServiceError::Store(_) | ContentServiceError::Serialization(_) => {
                HttpError::with_details(err.to_string(), code, format!("{:?}", err))
            }
            _ => HttpError::new(err.to_string(), code),
        }
    }
}
