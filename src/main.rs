use std::sync::Arc;

use tracing::info;

use simplefeed::config::{Config, DEFAULT_CONFIG_PATH};
use simplefeed::db::Database;
use simplefeed::routes::{self, AppState};
use simplefeed::telemetry;
use simplefeed::usecases::FeedService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pick up the .env written by the deploy tool
    dotenvy::dotenv().ok();

    telemetry::init_tracing();

    // Load configuration
    let config_path =
        std::env::var("SIMPLEFEED_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path)?.with_env_overrides(|k| std::env::var(k).ok());

    // Initialize database
    let db = Database::with_max_connections(&config.database_url, config.max_connections).await?;
    db.initialize().await?;
    info!("Database initialized");

    let state = Arc::new(AppState {
        feeds: FeedService::new(Arc::new(db)),
        policy: config.policy.clone(),
    });

    let app = routes::app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Server starting on http://{}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
