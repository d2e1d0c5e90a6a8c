//! Assistance Detection Inference Client
//!
//! Sends encoded frames to the remote detection service and turns its
//! answer into a [`DetectionVerdict`].

mod client;
mod verdict;

pub use client::{InferenceClient, InferenceConfig, VerifyDetails, VerifyResponse};
pub use verdict::{AssistanceCategory, DetectionVerdict};

use thiserror::Error;

/// Errors talking to the inference service
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Invalid inference configuration: {0}")]
    Config(String),
    #[error("Inference request failed: {0}")]
    Transport(String),
    #[error("Inference service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed inference response: {0}")]
    Decode(String),
    #[error("Inference service unreachable: {0}")]
    Unavailable(String),
    #[error("No images to verify")]
    EmptyBatch,
}

impl From<reqwest::Error> for InferenceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            InferenceError::Decode(err.to_string())
        } else {
            InferenceError::Transport(err.to_string())
        }
    }
}
