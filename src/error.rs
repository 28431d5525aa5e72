use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    Unauthorized,
    Forbidden,
    CsrfMismatch,
    NotFound,
    BadRequest(String),
    Conflict(String),
    AuthenticationUnavailable,
    InternalServerError,
}

#[derive(Serialize)]
struct ErrorResponse {
    code: i32,
    error_message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Authentication required".to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Access denied".to_string()),
            AppError::CsrfMismatch => (
                StatusCode::FORBIDDEN,
                "Request could not be verified, please retry".to_string(),
            ),
            AppError::NotFound => (StatusCode::NOT_FOUND, "Resource not found".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::AuthenticationUnavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication unavailable".to_string(),
            ),
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            code: status.as_u16() as i32,
            error_message,
        });

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db) = e.as_database_error() {
            if db.is_unique_violation() {
                return AppError::Conflict("Resource already exists".to_string());
            }
            if db.is_foreign_key_violation() {
                return AppError::BadRequest("Referenced resource does not exist".to_string());
            }
        }
        tracing::error!("Database error: {:?}", e);
        AppError::InternalServerError
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        tracing::error!("Session store error: {:?}", e);
        AppError::InternalServerError
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        tracing::error!("I/O error: {:?}", e);
        AppError::InternalServerError
    }
}
