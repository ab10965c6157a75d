//! Demo site: `/` home page, `/users` accounts, `/sessions` sign in and out.
//!
//! Run from this directory so `app/view` and `table/` resolve:
//! `cargo run -p demo-app --bin basic-migrate -- migrate`, then `cargo run -p demo-app`.

mod handlers;

use basic_sdk::{common_routes_with_ready, dispatch_routes, ensure_database_exists, AppState};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("basic_sdk=info,demo_app=info")),
        )
        .init();

    let config = basic_sdk::load()?;
    ensure_database_exists(&config.database.url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;

    let registry = handlers::registry();
    registry.validate()?;
    let state = AppState::new(pool, config, registry);

    let app = common_routes_with_ready(state.clone()).merge(dispatch_routes(state));
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("demo app listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
