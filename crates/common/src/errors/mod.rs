//! Error types for the Gabber backend
//!
//! Every error that reaches a client is rendered as
//! `{"errors": ["CODE", ...]}` where codes follow the
//! `{SCHEMA}_{FIELD}_{REASON}` convention. Validation errors carry the
//! full accumulated code list; every other failure carries exactly one.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Accumulated field validation failures; never fail-fast so a client
    /// can fix every field in one round trip.
    #[error("validation failed: {codes:?}")]
    Validation { codes: Vec<String> },

    #[error("unauthorized: {code}")]
    Unauthorized { code: &'static str },

    #[error("forbidden: {code}")]
    Forbidden { code: &'static str },

    #[error("not found: {code}")]
    NotFound { code: &'static str },

    #[error("recording storage error: {message}")]
    Storage { message: String },

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal server error: {message}")]
    Internal { message: String },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// One validation code, for callers that only have a single check
    pub fn validation(code: impl Into<String>) -> Self {
        AppError::Validation { codes: vec![code.into()] }
    }

    pub fn unauthorized() -> Self {
        AppError::Unauthorized { code: "GENERAL_UNAUTHORIZED" }
    }

    pub fn invalid_token() -> Self {
        AppError::Unauthorized { code: "GENERAL_INVALID_TOKEN" }
    }

    pub fn expired_token() -> Self {
        AppError::Unauthorized { code: "GENERAL_EXPIRED_TOKEN" }
    }

    pub fn unknown_user() -> Self {
        AppError::Unauthorized { code: "GENERAL_UNKNOWN_USER" }
    }

    pub fn not_project_member() -> Self {
        AppError::Forbidden { code: "PROJECTS_NOT_A_MEMBER" }
    }

    pub fn not_project_creator() -> Self {
        AppError::Forbidden { code: "PROJECTS_NOT_CREATOR" }
    }

    pub fn project_not_found() -> Self {
        AppError::NotFound { code: "PROJECTS_DOES_NOT_EXIST" }
    }

    pub fn session_not_found() -> Self {
        AppError::NotFound { code: "SESSIONS_DOES_NOT_EXIST" }
    }

    pub fn annotation_not_found() -> Self {
        AppError::NotFound { code: "USER_ANNOTATIONS_DOES_NOT_EXIST" }
    }

    pub fn membership_not_found() -> Self {
        AppError::NotFound { code: "MEMBERSHIPS_DOES_NOT_EXIST" }
    }

    /// The error codes this error renders as
    pub fn codes(&self) -> Vec<String> {
        match self {
            AppError::Validation { codes } => codes.clone(),
            AppError::Unauthorized { code }
            | AppError::Forbidden { code }
            | AppError::NotFound { code } => vec![(*code).to_string()],
            AppError::Storage { .. } => vec!["GENERAL_UPLOAD_FAILED".to_string()],
            AppError::Database(_) | AppError::DatabaseConnection { .. } => {
                vec!["GENERAL_DATABASE_ERROR".to_string()]
            }
            AppError::Configuration { .. } => vec!["GENERAL_CONFIGURATION_ERROR".to_string()],
            AppError::Serialization(_) => vec!["GENERAL_SERIALIZATION_ERROR".to_string()],
            AppError::Internal { .. } | AppError::Other(_) => {
                vec!["GENERAL_UNEXPECTED_ERROR".to_string()]
            }
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Storage { .. }
            | AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Internal { .. }
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Error body returned to clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub errors: Vec<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let codes = self.codes();

        if self.is_server_error() {
            tracing::error!(
                error = %self,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %self,
                status = status.as_u16(),
                "Client error"
            );
        }

        (status, Json(ErrorResponse { errors: codes })).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal { message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::project_not_found().status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::unauthorized().status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::not_project_member().status_code(), StatusCode::FORBIDDEN);
        let err = AppError::Storage { message: "put failed".into() };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
    }

    #[test]
    fn test_validation_accumulates_codes() {
        let err = AppError::Validation {
            codes: vec![
                "USER_ANNOTATIONS_CONTENT_IS_EMPTY".into(),
                "USER_ANNOTATIONS_START_BEFORE_END".into(),
            ],
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.codes().len(), 2);
        assert!(err.is_client_error());
    }

    #[test]
    fn test_storage_error_is_generic() {
        // Storage failures must not leak upstream detail to clients
        let err = AppError::Storage { message: "bucket acl denied".into() };
        assert_eq!(err.codes(), vec!["GENERAL_UPLOAD_FAILED".to_string()]);
    }
}
