//! Camera Capture Library for the Kiosk
//!
//! Pulls still frames from attached cameras on demand. The capture library
//! itself is an external collaborator reached through two narrow traits:
//! - [`CameraBackend`] enumerates and opens devices by integer index
//! - [`CameraDevice`] grabs one frame from an open device, cancellably
//!
//! Two backends ship with the crate:
//! - [`snapshot::SnapshotBackend`] runs an external snapshot command per V4L2 device
//! - [`mock::MockBackend`] serves synthetic frames for tests and demos

pub mod frame;
pub mod mock;
pub mod pool;
pub mod snapshot;

pub use frame::{PixelFormat, VideoFrame};
pub use pool::{CameraPool, CapturedImage};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Capture failed: {0}")]
    Capture(String),

    #[error("Capture timeout")]
    Timeout,

    #[error("No camera could be opened")]
    NoCameras,

    #[error("Frame encoding failed: {0}")]
    Encode(String),
}

/// An open capture handle for one camera
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Index this device was opened with
    fn index(&self) -> u32;

    /// Grab one still frame. Dropping the future abandons the capture and
    /// stops whatever it started.
    async fn capture(&self) -> Result<VideoFrame, CameraError>;

    /// Release the underlying handle, interrupting an in-flight capture.
    /// Idempotent.
    fn close(&self);
}

/// Enumerates and opens cameras
pub trait CameraBackend: Send + Sync {
    /// Indices of cameras currently attached
    fn probe(&self) -> Vec<u32>;

    /// Open the camera at `index`
    fn open(&self, index: u32) -> Result<Box<dyn CameraDevice>, CameraError>;
}

/// Camera configuration
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Camera indices to open; empty means every probed camera
    pub indices: Vec<u32>,
    /// Upper bound for a single camera's capture within one cycle
    pub capture_timeout: Duration,
    /// Frames wider than this are downscaled before encoding
    pub max_width: u32,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            indices: Vec::new(),
            capture_timeout: Duration::from_secs(5),
            max_width: 1280,
            jpeg_quality: 85,
        }
    }
}
