use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

mod config;
mod error;
mod functions;
mod schema;
mod services;
#[cfg(test)]
mod testing;

use config::Config;
use functions::{relay, send};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(Config::from_env());
    let relay_app = relay::router(relay::RelayState::from_config(config.clone())?);
    let send_app = send::router(send::SendState::from_config(config.clone())?);

    let relay_addr = format!("{}:{}", config.bind_address, config.relay_port);
    let send_addr = format!("{}:{}", config.bind_address, config.send_port);
    let relay_listener = TcpListener::bind(&relay_addr)
        .await
        .with_context(|| format!("failed to bind relay listener on {relay_addr}"))?;
    let send_listener = TcpListener::bind(&send_addr)
        .await
        .with_context(|| format!("failed to bind send listener on {send_addr}"))?;

    tracing::info!(
        relay = %relay_addr,
        send = %send_addr,
        webhook = %config.n8n_webhook_url,
        transport = %config.transport_base_url,
        session_id = %config.session_id,
        "relay gateway listening"
    );

    let relay_server = async {
        axum::serve(relay_listener, relay_app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    };
    let send_server = async {
        axum::serve(send_listener, send_app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    };
    tokio::try_join!(relay_server, send_server)?;

    tracing::info!("relay gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
