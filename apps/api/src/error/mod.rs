use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No query provided")]
    EmptyQuery,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model inference failed: {0}")]
    ModelError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Failures of the recommendation pipeline.
///
/// Extraction problems are recoverable (the engine ranks without filters);
/// embedding problems abort ranking and are absorbed by the cold-start fallback.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecommendationError {
    #[error("Intent extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Malformed intent: {0}")]
    MalformedIntent(String),

    #[error("Embedding failed: {0}")]
    EmbeddingFailed(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let error = ErrorResponse {
            error: self.to_string(),
        };

        match self {
            ApiError::EmptyQuery | ApiError::InvalidInput(_) => {
                HttpResponse::BadRequest().json(error)
            }
            _ => HttpResponse::InternalServerError().json(error),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_empty_query_is_bad_request() {
        let response = ApiError::EmptyQuery.error_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::EmptyQuery.to_string(), "No query provided");
    }

    #[test]
    fn test_invalid_input_is_bad_request() {
        let err = ApiError::InvalidInput("top_n must be between 1 and 50".into());
        assert_eq!(err.error_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_failures_are_server_errors() {
        let io_err: ApiError = std::io::Error::new(std::io::ErrorKind::Other, "disk full").into();
        let json_err: ApiError = serde_json::from_str::<u32>("nope").unwrap_err().into();

        for err in [
            io_err,
            json_err,
            ApiError::ModelError("timeout".into()),
            ApiError::InternalError("boom".into()),
        ] {
            assert_eq!(err.error_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
