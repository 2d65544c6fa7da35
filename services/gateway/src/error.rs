use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use types::errors::EngineError;

/// Central error type for the gateway application
#[derive(Debug)]
pub enum AppError {
    /// Validation failures: bad input, unknown user, insufficient balance
    BadRequest(String),
    /// Per-user request budget exhausted
    RateLimitExceeded(String),
    /// Upstream storage or feed failure
    ServiceUnavailable(String),
    NotFound(String),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        if err.is_validation() {
            AppError::BadRequest(err.to_string())
        } else {
            AppError::ServiceUnavailable(err.to_string())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, code) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST"),
            AppError::RateLimitExceeded(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, msg, "RATE_LIMIT_EXCEEDED")
            }
            AppError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                msg,
                "SERVICE_UNAVAILABLE",
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND"),
        };

        let body = Json(json!({
            "error": code,
            "message": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::errors::{AccountError, StorageError};

    #[test]
    fn test_validation_errors_map_to_400() {
        let err: AppError = EngineError::from(AccountError::UserNotFound).into();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "User not found"));
    }

    #[test]
    fn test_infrastructure_errors_map_to_503() {
        let err: AppError =
            EngineError::from(StorageError::Unavailable("down".to_string())).into();
        assert!(matches!(err, AppError::ServiceUnavailable(_)));
    }
}
