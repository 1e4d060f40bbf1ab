use anyhow::Context;
use tracing::info;

use flight_dashboard::{logging::init_logging, AppState, Config, Server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    init_logging(config.debug);

    let state = AppState::from_config(&config).context("failed to build application state")?;
    info!(
        flights = state.catalog.flights.len(),
        ai_enabled = config.api_key().is_some(),
        "sample catalog ready"
    );

    let server = Server::start(state, &config).await?;
    info!(url = %server.base_url(), "flight dashboard API listening");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    server.shutdown().await;
    Ok(())
}
