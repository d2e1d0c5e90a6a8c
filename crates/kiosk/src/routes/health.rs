//! Health and metrics routes

use crate::AppState;
use activation_scheduler::SchedulerStatus;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentStatus,
}

#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub camera_detection: ComponentHealth,
    pub presence: ComponentHealth,
    pub scheduler: SchedulerStatus,
}

/// Individual component health
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub detail: Option<String>,
}

impl ComponentHealth {
    fn new(status: &str, detail: Option<String>) -> Self {
        Self {
            status: status.to_string(),
            detail,
        }
    }
}

pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let camera_detection = match state.detectors.current() {
        Some(detector) if detector.is_ready() => {
            ComponentHealth::new("ready", Some(format!("{} cameras", detector.camera_count().await)))
        }
        Some(_) => ComponentHealth::new("initializing", None),
        None => ComponentHealth::new("off", Some("outside activation window".into())),
    };

    let presence = match &state.presence {
        Some(presence) if presence.is_ready() => ComponentHealth::new("ready", None),
        Some(_) => ComponentHealth::new("waiting", Some("sensor has not announced READY".into())),
        None => ComponentHealth::new("disabled", None),
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: ComponentStatus {
            camera_detection,
            presence,
            scheduler: state.scheduler.status().await,
        },
    })
}

/// Prometheus exposition
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
