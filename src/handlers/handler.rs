//! Handler trait: one method per CRUD verb plus the not-found hook used on the default group.

use crate::error::AppError;
use async_trait::async_trait;
use axum::response::Response;

/// A request-scoped application handler. Implementations keep the `Arc<Facade>` they were
/// built with and call back into it for data access, auth, mail and rendering.
///
/// Verbs left unimplemented answer 405.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn create(&self, arg: Option<&str>) -> Result<Response, AppError> {
        let _ = arg;
        Err(AppError::MethodNotAllowed("create".into()))
    }

    async fn read(&self, arg: Option<&str>) -> Result<Response, AppError> {
        let _ = arg;
        Err(AppError::MethodNotAllowed("read".into()))
    }

    async fn update(&self, arg: Option<&str>) -> Result<Response, AppError> {
        let _ = arg;
        Err(AppError::MethodNotAllowed("update".into()))
    }

    async fn delete(&self, arg: Option<&str>) -> Result<Response, AppError> {
        let _ = arg;
        Err(AppError::MethodNotAllowed("delete".into()))
    }

    /// Called on the default group when no handler matches the path.
    async fn not_found(&self) -> Result<Response, AppError> {
        Err(AppError::NotFound("no handler for this path".into()))
    }
}
