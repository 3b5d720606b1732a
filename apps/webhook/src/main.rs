use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::serve;
use deskbridge_core::clickup::HttpClickUpApi;
use deskbridge_core::freshdesk::HttpFreshdeskApi;
use deskbridge_telemetry::{TelemetryConfig, init_telemetry};
use deskbridge_webhook::{AppState, BridgeConfig, router};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = TelemetryConfig::from_env("deskbridge-webhook", env!("CARGO_PKG_VERSION"));
    init_telemetry(&telemetry)?;

    let config = BridgeConfig::from_env()?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let clickup = Arc::new(HttpClickUpApi::new(client.clone(), &config.clickup_api_base));
    let freshdesk = Arc::new(HttpFreshdeskApi::new(client));

    let addr = config.addr;
    let state = AppState::new(config, clickup, freshdesk);

    let listener = TcpListener::bind(addr).await?;
    info!("deskbridge-webhook listening on {addr}");

    serve(listener, router(state))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
