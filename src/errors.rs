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

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid user data")]
    InvalidUserData,

    #[error("No account found for that email")]
    AccountNotFound,

    #[error("Could not send the reset email: {0}")]
    EmailDispatch(String),

    #[error("No password reset in progress")]
    NoActiveReset,

    #[error("Incorrect OTP")]
    InvalidOtp,

    #[error("OTP has expired")]
    OtpExpired,

    #[error("OTP has not been verified")]
    NotVerified,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Service error: {0}")]
    ServiceError(String),
}

impl IntoResponse for AppError {

    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            // Store connectivity problems stay opaque to the client.
            AppError::MongoDB(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string()),
            AppError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO error".to_string()),
            AppError::InvalidUserData => (StatusCode::BAD_REQUEST, "Invalid user data".to_string()),
            AppError::AccountNotFound => (StatusCode::NOT_FOUND, "No account found for that email".to_string()),
            AppError::EmailDispatch(_) => (StatusCode::BAD_GATEWAY, "Could not send the reset email, please try again".to_string()),
            AppError::NoActiveReset => (StatusCode::BAD_REQUEST, "No password reset in progress".to_string()),
            AppError::InvalidOtp => (StatusCode::BAD_REQUEST, "Incorrect OTP".to_string()),
            AppError::OtpExpired => (StatusCode::BAD_REQUEST, "OTP has expired, request a new one".to_string()),
            AppError::NotVerified => (StatusCode::BAD_REQUEST, "OTP has not been verified".to_string()),
            AppError::PasswordMismatch => (StatusCode::BAD_REQUEST, "Passwords do not match".to_string()),
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "Validation failed".to_string()),
            AppError::ExternalApi(_) => (StatusCode::BAD_GATEWAY, "External API error".to_string()),
            AppError::ServiceError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Service error".to_string()),
        };

        // Infrastructure detail goes to the logs, not the client.
        let message = match &self {
            AppError::MongoDB(_)
            | AppError::Io(_)
            | AppError::EmailDispatch(_)
            | AppError::ExternalApi(_)
            | AppError::ServiceError(_) => {
                tracing::error!("{}", self);
                error_message.clone()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
            "message": message,
            "success": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

// Helper conversion functions
impl AppError {
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn external_api(msg: impl Into<String>) -> Self {
        AppError::ExternalApi(msg.into())
    }

    pub fn email_dispatch(msg: impl Into<String>) -> Self {
        AppError::EmailDispatch(msg.into())
    }

    pub fn service(msg: impl Into<String>) -> Self {
        AppError::ServiceError(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
