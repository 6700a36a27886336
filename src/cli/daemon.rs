use crate::App;
use anyhow::{Context, Result};
use tracing::info;

/// Runs the salary check and the price auto-refresh until Ctrl+C.
pub async fn run(app: &App) -> Result<()> {
    let salary = app
        .salary
        .clone()
        .spawn(app.config.salary.check_interval());
    let prices = app.sync.spawn_auto_refresh();

    println!("moneta is running. Press Ctrl+C to exit.");
    let waited = tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C");

    info!("Shutting down background tasks");
    salary.stop().await;
    prices.stop().await;
    waited
}
