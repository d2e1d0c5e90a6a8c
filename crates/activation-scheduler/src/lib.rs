//! Activation Scheduler
//!
//! The only clock-driven decision about whether camera detection hardware
//! may be opened:
//! - Remote working-hours window, reloaded periodically
//! - Hourly evaluate-and-flip of detection on/off
//! - Hosts that build and tear down the camera orchestrator

pub mod clock;
pub mod host;
pub mod scheduler;
pub mod source;
pub mod window;

pub use clock::{Clock, LocalClock, ManualClock};
pub use host::{DetectionHost, OrchestratorHost};
pub use scheduler::{ActivationScheduler, SchedulerConfig, SchedulerStatus};
pub use source::{HttpScheduleSource, ScheduleSource, StaticScheduleSource};
pub use window::ScheduleWindow;

use thiserror::Error;

/// Schedule error types
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Schedule configuration unavailable: {0}")]
    ConfigurationUnavailable(String),

    #[error("Invalid schedule window {start}-{end}")]
    InvalidWindow { start: u32, end: u32 },
}
