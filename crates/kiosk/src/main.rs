//! Kiosk Accessibility Core - Main Entry Point

use anyhow::Context;
use kiosk::{init_logging, Kiosk, KioskConfig};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = KioskConfig::load().context("loading configuration")?;
    init_logging(&config.logging)?;

    info!("=== Kiosk Accessibility Core v{} ===", env!("CARGO_PKG_VERSION"));

    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics recorder unavailable: {}", e);
            None
        }
    };

    let kiosk = Kiosk::build(config, metrics).await?;
    kiosk
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
}
