use crate::db::DbError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Method {0} is not allowed for this endpoint")]
    MethodNotAllowed(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Environment variable missing: {0}")]
    MissingEnvVar(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Record of a server-side failure, attached to the response extensions so the
/// exception stages can decide which page to render.
#[derive(Debug, Clone)]
pub struct UnhandledError {
    /// One-line description (the `Display` of the error)
    pub summary: String,

    /// Full debug rendering of the error
    pub detail: String,

    /// Whether the failure came from the database layer
    pub database: bool,
}

impl UnhandledError {
    pub fn from_panic(message: String) -> Self {
        Self {
            summary: format!("panic: {}", message),
            detail: message,
            database: false,
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            AppError::Database(_) => "DATABASE_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if !status.is_server_error() {
            let body = json!({
                "error": self.code(),
                "message": self.to_string(),
            });
            return (status, Json(body)).into_response();
        }

        tracing::error!("Unhandled error: {:?}", self);

        let record = UnhandledError {
            summary: self.to_string(),
            detail: format!("{:?}", self),
            database: matches!(self, AppError::Database(_)),
        };

        let body = json!({
            "error": self.code(),
            "message": "An internal error occurred",
        });

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(record);
        response
    }
}

/// Result type alias for AppResult
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_carry_no_unhandled_record() {
        let response = AppError::NotFound("speaker 7".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.extensions().get::<UnhandledError>().is_none());
    }

    #[test]
    fn test_database_errors_are_flagged() {
        let error = AppError::Database(DbError::SchemaNotCreated("ConferenceTracker".to_string()));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let record = response
            .extensions()
            .get::<UnhandledError>()
            .expect("server errors carry a record");
        assert!(record.database);
        assert!(record.summary.contains("ConferenceTracker"));
    }
}
