//! Process-wide state shared by every request: read-only after startup.

use crate::config::AppConfig;
use crate::handlers::HandlerRegistry;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub registry: Arc<HandlerRegistry>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig, registry: HandlerRegistry) -> Self {
        AppState {
            pool,
            config: Arc::new(config),
            registry: Arc::new(registry),
        }
    }
}
