//! Presence Sensor Protocol
//!
//! This crate talks to the microcontroller that measures how long a person
//! has been standing in front of the kiosk. The device writes one ASCII
//! message per line:
//!
//! ```text
//! READY
//! DISTANCE:<cm>,TIME:<seconds>
//! COMPLETE
//! CANCELLED
//! RESET
//! ```

mod client;
mod discovery;
mod error;
mod message;

pub use client::{PresenceClient, DEFAULT_BAUD_RATE, MAX_LINE_BYTES};
pub use discovery::{discover_port, list_candidates, select_port, PortCandidate};
pub use error::PresenceError;
pub use message::{PresenceEvent, PresenceMessage};
