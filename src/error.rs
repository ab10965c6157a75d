//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Fatal setup problems. A request that hits one of these ends with a diagnostic and no handler output.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("handler group '{0}' is not registered")]
    MissingHandler(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("unknown column '{column}' on table {table}")]
    UnknownColumn { table: String, column: String },
    #[error("no columns given for {0}")]
    EmptyRowData(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("{service}: {message}")]
    Collaborator { service: &'static str, message: String },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn collaborator(service: &'static str, message: impl std::fmt::Display) -> Self {
        AppError::Collaborator {
            service,
            message: message.to_string(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Store(StoreError::Db(e))
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::Store(e) => match e {
                StoreError::InvalidIdentifier(_)
                | StoreError::UnknownTable(_)
                | StoreError::UnknownColumn { .. }
                | StoreError::EmptyRowData(_) => (StatusCode::BAD_REQUEST, "store_error"),
                StoreError::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            },
            AppError::InvalidFilter(_) => (StatusCode::BAD_REQUEST, "invalid_filter"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::MethodNotAllowed(_) => (StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::Collaborator { .. } => (StatusCode::BAD_GATEWAY, "collaborator_error"),
            AppError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        match &self {
            AppError::Config(e) => tracing::error!(error = %e, "configuration error, request aborted"),
            AppError::Store(StoreError::Db(e)) => tracing::error!(error = %e, "database error"),
            _ => tracing::debug!(error = %self, "request failed"),
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_is_a_server_error_with_diagnostic() {
        let err = AppError::from(ConfigError::MissingHandler("Home".into()));
        assert_eq!(err.status_and_code(), (StatusCode::INTERNAL_SERVER_ERROR, "config_error"));
        assert_eq!(err.to_string(), "handler group 'Home' is not registered");
    }

    #[test]
    fn identifier_errors_are_client_errors() {
        let err = AppError::from(StoreError::InvalidIdentifier("users;drop".into()));
        assert_eq!(err.status_and_code().0, StatusCode::BAD_REQUEST);
        let err = AppError::InvalidFilter("empty".into());
        assert_eq!(err.status_and_code(), (StatusCode::BAD_REQUEST, "invalid_filter"));
    }
}
