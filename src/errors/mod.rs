/// Unified error handling module
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Unified error response format
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Flight provider rejected credentials; check FLIGHT_API_KEY")]
    ProviderAuth,

    #[error("Flight provider rate limit exceeded; try again later")]
    ProviderRateLimit,

    #[error("Flight provider request failed: {0}")]
    ProviderTransient(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Classify an upstream HTTP status into the provider error taxonomy
    pub fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
        match status.as_u16() {
            401 | 403 => ApiError::ProviderAuth,
            429 => ApiError::ProviderRateLimit,
            _ => ApiError::ProviderTransient(format!("{} returned status {}", context, status)),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::ProviderAuth => "PROVIDER_UNAUTHORIZED",
            ApiError::ProviderRateLimit => "PROVIDER_RATE_LIMITED",
            ApiError::ProviderTransient(_) => "PROVIDER_ERROR",
            ApiError::Validation(_) => "INVALID_INPUT",
            ApiError::Persistence(_) => "PERSISTENCE_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::ProviderAuth => StatusCode::UNAUTHORIZED,
            ApiError::ProviderRateLimit => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ProviderTransient(_) => StatusCode::BAD_GATEWAY,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Persistence(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ApiError::from_status(status, "upstream"),
            None => ApiError::ProviderTransient(err.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Persistence(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_response = ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };

        (self.status(), Json(error_response)).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ApiError::from_status(reqwest::StatusCode::UNAUTHORIZED, "flights"),
            ApiError::ProviderAuth
        ));
        assert!(matches!(
            ApiError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "flights"),
            ApiError::ProviderRateLimit
        ));
        assert!(matches!(
            ApiError::from_status(reqwest::StatusCode::BAD_GATEWAY, "flights"),
            ApiError::ProviderTransient(_)
        ));
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let resp = ApiError::Validation("bad phone".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
