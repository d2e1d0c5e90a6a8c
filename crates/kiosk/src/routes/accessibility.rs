//! Accessibility mode routes

use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use inference_client::DetectionVerdict;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct AccessibilityResponse {
    pub enabled: bool,
    pub voice: Option<VoiceStatus>,
    pub last_verdict: Option<DetectionVerdict>,
}

#[derive(Debug, Serialize)]
pub struct VoiceStatus {
    pub recognition_ready: bool,
    pub speech_ready: bool,
    pub active: bool,
    pub commands: usize,
    pub grammar_words: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub needs_assistance: bool,
    pub verdict: Option<DetectionVerdict>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub async fn get_accessibility(State(state): State<Arc<AppState>>) -> Json<AccessibilityResponse> {
    let voice = state.controller.session().await.map(|session| VoiceStatus {
        recognition_ready: session.is_ready(),
        speech_ready: session.is_speech_ready(),
        active: session.is_active(),
        commands: session.command_count(),
        grammar_words: session.grammar_words(),
    });

    Json(AccessibilityResponse {
        enabled: state.controller.is_enabled(),
        voice,
        last_verdict: state.detectors.current().and_then(|detector| detector.last_verdict()),
    })
}

/// Run one camera cycle on behalf of a screen
pub async fn post_detect(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DetectResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Some(detector) = state.detectors.current() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "camera detection is outside its activation window".into(),
            }),
        ));
    };

    let needs_assistance = detector.detect_and_activate().await;
    Ok(Json(DetectResponse {
        needs_assistance,
        verdict: detector.last_verdict(),
    }))
}
