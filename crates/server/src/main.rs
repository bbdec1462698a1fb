use std::sync::Arc;
use std::future::IntoFuture;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Notify;
use vaxline_core::config::{AppConfig, LoadOptions};
use vaxline_server::bootstrap;

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use vaxline_core::config::LogFormat::*;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
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

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind webhook listener on {address}"))?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        address = %address,
        webhook_path = %app.config.server.webhook_path,
        "vaxline-server listening"
    );

    let stop = Arc::new(Notify::new());
    let server = axum::serve(listener, vaxline_server::router(&app)).with_graceful_shutdown({
        let stop = stop.clone();
        async move { stop.notified().await }
    });
    let server = server.into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.context("webhook server terminated unexpectedly")?;
        }
        () = wait_for_shutdown() => {
            tracing::info!(
                event_name = "system.server.stopping",
                correlation_id = "shutdown",
                grace_secs = grace.as_secs(),
                "vaxline-server stopping; draining in-flight requests"
            );
            stop.notify_one();
            match tokio::time::timeout(grace, &mut server).await {
                Ok(result) => result.context("webhook server failed while draining")?,
                Err(_) => tracing::warn!(
                    event_name = "system.server.shutdown_timeout",
                    correlation_id = "shutdown",
                    "in-flight requests did not finish within the grace period"
                ),
            }
        }
    }

    app.db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for shutdown signal"
        );
    }
}
