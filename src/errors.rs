// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("MongoDB error: {0}")]
    MongoDB(#[from] mongodb::error::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Provisioning failed: {0}")]
    ProvisioningFailed(String),

    #[error("Token acquisition failed: {0}")]
    TokenAcquisitionFailed(String),

    #[error("Provider rejected request: {0}")]
    ProviderRejected(String),

    #[error("Provider unreachable: {0}")]
    ProviderUnreachable(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("No mobile money credentials available")]
    CredentialsMissing,

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Raw provider bodies stay in the logs for diagnosis; callers only
        // see the friendly message.
        let (status, error_message) = match &self {
            AppError::MongoDB(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Database error"),
            AppError::ValidationError(msg) => {
                return validation_response(msg);
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            AppError::ServiceUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable")
            }
            AppError::ProvisioningFailed(_) => (
                StatusCode::BAD_GATEWAY,
                "Could not provision mobile money credentials",
            ),
            AppError::TokenAcquisitionFailed(_) => (
                StatusCode::BAD_GATEWAY,
                "Could not authenticate with the mobile money provider",
            ),
            AppError::ProviderRejected(_) => (
                StatusCode::BAD_GATEWAY,
                "Mobile money provider rejected the request",
            ),
            AppError::ProviderUnreachable(_) => (
                StatusCode::BAD_GATEWAY,
                "Mobile money provider is unreachable",
            ),
            AppError::MalformedResponse(_) => (
                StatusCode::BAD_GATEWAY,
                "Mobile money provider returned an unexpected response",
            ),
            AppError::CredentialsMissing => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Mobile money credentials are not configured",
            ),
            AppError::ConfigurationError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Configuration error")
            }
        };

        tracing::error!("Request failed: {}", self);

        let body = Json(json!({
            "error": error_message,
            "success": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

fn validation_response(msg: &str) -> Response {
    let body = Json(json!({
        "error": msg,
        "success": false,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }));
    (StatusCode::BAD_REQUEST, body).into_response()
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ValidationError(format!("JSON parsing error: {}", err))
    }
}

// Helper conversion functions
impl AppError {
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn provisioning(msg: impl Into<String>) -> Self {
        AppError::ProvisioningFailed(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        AppError::ConfigurationError(msg.into())
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        AppError::ServiceUnavailable(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
