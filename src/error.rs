//! Error types for Forge.
//!
//! Uses thiserror for ergonomic error definitions that integrate
//! with axum's response system.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Resource errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // External service errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("LLM error: {0}")]
    Llm(String),

    // Tool loop errors
    #[error("Tool error: {0}")]
    Tool(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 404
            Self::NotFound(_) => StatusCode::NOT_FOUND,

            // 400
            Self::Validation(_) | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,

            // 502
            Self::Llm(_) => StatusCode::BAD_GATEWAY,

            // 500
            Self::Database(_)
            | Self::VectorStore(_)
            | Self::Embedding(_)
            | Self::Tool(_)
            | Self::Internal(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::VectorStore(_) => "VECTOR_STORE_ERROR",
            Self::Embedding(_) => "EMBEDDING_ERROR",
            Self::Llm(_) => "LLM_ERROR",
            Self::Tool(_) => "TOOL_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Other(_) => "UNKNOWN_ERROR",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

// Convenience conversions
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Internal(format!("HTTP request failed: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<forge_qdrant::Error> for Error {
    fn from(err: forge_qdrant::Error) -> Self {
        Self::VectorStore(err.to_string())
    }
}

impl From<forge_embeddings::Error> for Error {
    fn from(err: forge_embeddings::Error) -> Self {
        Self::Embedding(err.to_string())
    }
}

impl From<forge_llm::Error> for Error {
    fn from(err: forge_llm::Error) -> Self {
        Self::Llm(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::NotFound("app".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(Error::Validation("empty".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::Llm("down".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            Error::Tool("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_library_errors_convert() {
        let err: Error = forge_llm::Error::IncompleteStream.into();
        assert_eq!(err.error_code(), "LLM_ERROR");

        let err: Error = forge_qdrant::Error::DimensionMismatch {
            expected: 3,
            actual: 2,
        }
        .into();
        assert_eq!(err.error_code(), "VECTOR_STORE_ERROR");
    }
}
