//! Assistance Detection
//!
//! Decides, without being asked, whether the person at the kiosk needs
//! accessibility assistance:
//! - Camera path: capture from every camera, submit to the inference service
//! - Presence path: wait for the proximity sensor's verdict
//! - Readiness gating between hardware bring-up and detection
//! - A published slot through which screens reach the live camera detector

pub mod camera;
pub mod presence;
pub mod readiness;
pub mod slot;

pub use camera::CameraOrchestrator;
pub use presence::PresenceOrchestrator;
pub use readiness::ReadinessGate;
pub use slot::DetectorSlot;

use camera_capture::CameraError;
use inference_client::InferenceError;
use presence_protocol::PresenceError;
use thiserror::Error;

/// Detection error types
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Detector not ready")]
    NotReady,

    #[error("No frames captured from any camera")]
    NoFramesCaptured,

    #[error("Camera hardware unavailable: {0}")]
    HardwareUnavailable(#[from] CameraError),

    #[error("Inference service unavailable: {0}")]
    InferenceUnavailable(String),

    #[error("{0}")]
    Inference(#[from] InferenceError),

    #[error("Frame encoding failed: {0}")]
    Encode(String),

    #[error("Presence sensor error: {0}")]
    Presence(#[from] PresenceError),
}
