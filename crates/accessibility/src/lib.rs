//! Accessibility Mode
//!
//! Process-wide switch between touch and voice operation:
//! - Holds at most one live voice session
//! - Enable/disable/reset, serialized and idempotent
//! - `ModeSwitch` seam through which detectors flip the mode

pub mod config;
pub mod controller;

pub use config::AccessibilityConfig;
pub use controller::{AccessibilityModeController, VoiceSessionFactory};

use async_trait::async_trait;

/// What a detector flips after each cycle
#[async_trait]
pub trait ModeSwitch: Send + Sync {
    /// Switch to voice operation. Never fails outward.
    async fn enable(&self);

    /// Switch back to touch operation
    async fn disable(&self);
}
