//! Error handling

use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;

use crate::forecast::{ForecastError, InferenceError};
use crate::weather::RealtimeError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Auth errors
    InvalidCredentials,
    TokenExpired,
    TokenInvalid,
    Unauthorized,

    // Resource errors
    NotFound(String),
    AlreadyExists(String),

    // Validation errors
    ValidationError(String),
    InsufficientData(String),

    // Forecast errors
    ModelUnavailable(String),

    // Upstream weather API errors
    UpstreamTimeout(String),
    UpstreamUnavailable(String),
    ExternalServiceError(String),

    // Database errors
    DatabaseError(String),

    // Generic errors
    InternalError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials
            | AppError::TokenExpired
            | AppError::TokenInvalid
            | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::ValidationError(_) | AppError::InsufficientData(_) => StatusCode::BAD_REQUEST,
            AppError::ModelUnavailable(_) | AppError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            AppError::DatabaseError(_) | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            AppError::InvalidCredentials => "Invalid phone number or password",
            AppError::TokenExpired => "Token has expired",
            AppError::TokenInvalid => "Invalid or expired token",
            AppError::Unauthorized => "Authentication required",
            AppError::NotFound(msg)
            | AppError::AlreadyExists(msg)
            | AppError::ValidationError(msg)
            | AppError::InsufficientData(msg)
            | AppError::ModelUnavailable(msg)
            | AppError::UpstreamTimeout(msg)
            | AppError::UpstreamUnavailable(msg) => msg.as_str(),
            AppError::ExternalServiceError(msg) => {
                tracing::error!("External service error: {}", msg);
                "External service error"
            }
            AppError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                "Database error occurred"
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error"
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if err.as_database_error().is_some_and(|e| e.is_unique_violation()) {
            return AppError::AlreadyExists("Phone number already registered".to_string());
        }
        AppError::DatabaseError(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::TokenInvalid,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = err
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("Invalid {}", field),
                })
            })
            .collect();

        AppError::ValidationError(messages.join("; "))
    }
}

impl From<ForecastError> for AppError {
    fn from(err: ForecastError) -> Self {
        match err {
            ForecastError::NoModels(_) => AppError::ModelUnavailable(err.to_string()),
            ForecastError::InsufficientData { .. } => AppError::InsufficientData(err.to_string()),
            ForecastError::DateOutOfRange(_) => AppError::NotFound(err.to_string()),
            ForecastError::History(_) => AppError::ExternalServiceError(err.to_string()),
            ForecastError::Inference(InferenceError::ModelNotFound(_)) => {
                AppError::ModelUnavailable(err.to_string())
            }
            ForecastError::Inference(_) | ForecastError::Task(_) => {
                AppError::InternalError(format!("Error generating forecast: {}", err))
            }
        }
    }
}

impl From<RealtimeError> for AppError {
    fn from(err: RealtimeError) -> Self {
        match err {
            RealtimeError::Timeout => AppError::UpstreamTimeout(err.to_string()),
            RealtimeError::Unavailable(_) => AppError::UpstreamUnavailable(err.to_string()),
            RealtimeError::Upstream(_) => AppError::ExternalServiceError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forecast_error_status_mapping() {
        let err: AppError = ForecastError::InsufficientData { needed: 30, available: 3 }.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: AppError = ForecastError::NoModels("x".to_string()).into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);

        let err: AppError = ForecastError::DateOutOfRange("2030-01-01".to_string()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_realtime_error_status_mapping() {
        assert_eq!(AppError::from(RealtimeError::Timeout).status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            AppError::from(RealtimeError::Unavailable("refused".to_string())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::from(RealtimeError::Upstream("500".to_string())).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = AppError::ValidationError("Phone number must be 10 digits".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Phone number must be 10 digits");
        assert_eq!(body["status"], 400);
    }
}
