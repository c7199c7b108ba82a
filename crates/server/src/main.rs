mod bootstrap;
mod health;

use std::time::Duration;

use anyhow::Result;
use rackbot_core::config::{AppConfig, LoadOptions};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use rackbot_core::config::LogFormat::*;

    // RUST_LOG wins so a single module can be turned up without editing config.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.backend.clone(),
    )
    .await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = app.poller;
    let mut polling = tokio::spawn(async move { poller.run(shutdown_rx).await });

    tracing::info!(event_name = "system.server.started", "rackbot-server started");
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!(event_name = "system.server.stopping", "shutdown requested");
        }
        exit = &mut polling => {
            tracing::error!(
                event_name = "system.server.polling_ended",
                exit = ?exit,
                "polling stopped on its own; shutting down"
            );
        }
    }

    // Ignored when polling already ended and dropped its receiver.
    let _ = shutdown_tx.send(true);
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    if !polling.is_finished() && tokio::time::timeout(grace, &mut polling).await.is_err() {
        tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            grace_secs = grace.as_secs(),
            "poller did not stop within the grace period"
        );
        polling.abort();
    }
    tracing::info!(
        event_name = "system.server.stopped",
        active_sessions = app.router.active_sessions().await,
        "rackbot-server stopped"
    );

    Ok(())
}
