//! Kiosk Accessibility Daemon
//!
//! Wires detection, scheduling and voice operation into one long-running
//! process and exposes a local status endpoint.

pub mod config;
pub mod daemon;
mod routes;

use accessibility::AccessibilityModeController;
use activation_scheduler::ActivationScheduler;
use axum::{
    routing::{get, post},
    Router,
};
use detection::{DetectorSlot, PresenceOrchestrator};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

pub use config::KioskConfig;
pub use daemon::Kiosk;

/// State shared across status handlers
pub struct AppState {
    pub controller: Arc<AccessibilityModeController>,
    pub scheduler: Arc<ActivationScheduler>,
    pub detectors: Arc<DetectorSlot>,
    pub presence: Option<Arc<PresenceOrchestrator>>,
    /// Prometheus handle when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
    pub start_time: Instant,
}

/// Create the status router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health::get_health))
        .route("/api/v1/accessibility", get(routes::accessibility::get_accessibility))
        .route("/api/v1/detect", post(routes::accessibility::post_detect))
        .route("/metrics", get(routes::health::get_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
pub fn init_logging(settings: &config::LoggingSettings) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.level)?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))
}
