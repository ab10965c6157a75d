//! Basic SDK: segment-routed request dispatch with a per-request facade over
//! PostgreSQL CRUD, auth, mail, images, uploads, sheets, downloads and views.

pub mod case;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod extractors;
pub mod facade;
pub mod handlers;
pub mod migration;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{load, AppConfig};
pub use dispatcher::{dispatch, Verb};
pub use error::{AppError, ConfigError, StoreError};
pub use extractors::IncomingRequest;
pub use facade::Facade;
pub use handlers::{Handler, HandlerRegistry, DEFAULT_GROUP};
pub use migration::MigrationReport;
pub use routes::{common_routes_with_ready, dispatch_routes};
pub use sql::{columns, Filter, RowData};
pub use state::AppState;
pub use store::{ensure_database_exists, CrudStore};
