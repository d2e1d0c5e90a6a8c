//! Presence Protocol Error Types

use thiserror::Error;

/// Errors that can occur talking to the presence microcontroller
#[derive(Debug, Error)]
pub enum PresenceError {
    /// Serial port connection error
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// No port was given and none could be discovered
    #[error("No presence sensor port found")]
    NoPortFound,

    /// Line that does not match the protocol
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

impl From<std::io::Error> for PresenceError {
    fn from(err: std::io::Error) -> Self {
        PresenceError::SerialError(err.to_string())
    }
}

impl From<tokio_serial::Error> for PresenceError {
    fn from(err: tokio_serial::Error) -> Self {
        PresenceError::SerialError(err.to_string())
    }
}
