//! Kenner Bot - Entry Point
//!
//! Runs the Telegram dispatcher and the status API side by side over one
//! shared store.

use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use kenner_bot::api::{self, ApiState};
use kenner_bot::config::Config;
use kenner_bot::store::Store;
use kenner_bot::telegram;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Kenner Bot v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let store = Arc::new(Store::open(&config.db_path)?);
    info!("Database: {:?}", config.db_path);

    // The API serves reads while the dispatcher owns all writes.
    let api_state = ApiState::new(Arc::clone(&store));
    let api_port = config.api_port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, api_port).await {
            tracing::error!("Status API failed: {}", e);
        }
    });

    telegram::run_bot(&config, store).await?;

    Ok(())
}
