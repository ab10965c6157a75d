//! Table lifecycle from the command line: `basic-migrate migrate|drop|truncate`.

use basic_sdk::{ensure_database_exists, Facade, IncomingRequest};
use std::sync::Arc;

const USAGE: &str = "usage: basic-migrate migrate|drop|truncate";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("basic_sdk=info")),
        )
        .init();

    let action = std::env::args().nth(1).unwrap_or_default();
    if !matches!(action.as_str(), "migrate" | "drop" | "truncate") {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    }

    let config = basic_sdk::load()?;
    ensure_database_exists(&config.database.url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.database.url)
        .await?;

    let facade = Facade::new(Arc::new(config), pool, IncomingRequest::new("POST", &format!("/{}", action)));
    let report = match action.as_str() {
        "migrate" => facade.migrate_all().await?,
        "drop" => facade.drop_all().await?,
        _ => facade.truncate_all().await?,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
