use models::{CliApp, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod cli;
mod config;
mod coupons;
mod database;
mod eligibility;
mod email_sender;
mod error;
mod issuance;
mod models;
mod server;
mod tracker;

use config::{load_config, Config};
use database::create_db_pool;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let config = match load_config("config.yml").await {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load config.yml: {}. Using defaults.", e);
            Config::default()
        }
    };

    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("welcome_coupon={}", config.logging.level).parse()?),
        )
        .init();

    // Initialize database
    info!("Initializing database...");
    let db_pool = create_db_pool(&config.database.path).await?;

    let cleanup = config.cleanup.clone();
    let app = CliApp::new(config, db_pool).await?;

    // Daily ledger cleanup
    let cleanup_tracker = app.tracker.clone();
    tokio::spawn(async move {
        let period = std::time::Duration::from_secs(cleanup.interval_hours * 3600);
        let mut ticker = tokio::time::interval(period);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match cleanup_tracker.cleanup_old_entries().await {
                Ok(deleted) => info!("Scheduled cleanup removed {} ledger entries", deleted),
                Err(e) => error!("Scheduled cleanup failed: {}", e),
            }
        }
    });

    // Add graceful shutdown
    tokio::select! {
        result = app.run() => {
            result?;
        }
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
