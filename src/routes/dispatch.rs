//! Catch-all router: every request not claimed by another route goes through the dispatcher.

use crate::extractors::IncomingRequest;
use crate::facade::Facade;
use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, extract::State, response::Response, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

async fn dispatch_request(State(state): State<AppState>, request: IncomingRequest) -> Response {
    let facade = Arc::new(Facade::new(Arc::clone(&state.config), state.pool.clone(), request));
    facade.start(&state.registry).await
}

/// Fallback router that builds one facade per request. Bodies above
/// `http.max_body_bytes` are refused with 413 before any handler runs.
pub fn dispatch_routes(state: AppState) -> Router {
    let limit = state.config.http.max_body_bytes;
    Router::new()
        .fallback(dispatch_request)
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(limit)),
        )
        .with_state(state)
}
