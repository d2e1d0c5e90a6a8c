//! Presence Protocol Messages

use crate::PresenceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A distance/time-of-presence reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PresenceEvent {
    /// Distance to the person in centimetres
    pub distance_cm: f32,
    /// Seconds the person has been in range
    pub elapsed_seconds: u32,
    /// When the line was received
    pub received_at: DateTime<Utc>,
}

/// One protocol line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PresenceMessage {
    /// Firmware booted and is measuring
    Ready,
    /// Periodic reading while someone is in range
    Distance(PresenceEvent),
    /// Person stayed long enough to count as present
    Complete,
    /// Person left before the measurement completed
    Cancelled,
    /// Firmware reset its measurement
    Reset,
}

impl PresenceMessage {
    /// Parse one line (without terminator)
    pub fn parse(line: &str) -> Result<Self, PresenceError> {
        let line = line.trim();
        match line.to_ascii_uppercase().as_str() {
            "READY" => return Ok(PresenceMessage::Ready),
            "COMPLETE" => return Ok(PresenceMessage::Complete),
            "CANCELLED" => return Ok(PresenceMessage::Cancelled),
            "RESET" => return Ok(PresenceMessage::Reset),
            _ => {}
        }

        let mut distance = None;
        let mut time = None;
        for field in line.split(',') {
            let (key, value) = field
                .split_once(':')
                .ok_or_else(|| PresenceError::InvalidMessage(line.to_string()))?;
            let value = value.trim();
            match key.trim().to_ascii_uppercase().as_str() {
                "DISTANCE" => distance = value.parse::<f32>().ok().filter(|d| d.is_finite()),
                "TIME" => time = value.parse::<u32>().ok(),
                _ => return Err(PresenceError::InvalidMessage(line.to_string())),
            }
        }

        match (distance, time) {
            (Some(distance_cm), Some(elapsed_seconds)) => Ok(PresenceMessage::Distance(PresenceEvent {
                distance_cm,
                elapsed_seconds,
                received_at: Utc::now(),
            })),
            _ => Err(PresenceError::InvalidMessage(line.to_string())),
        }
    }

    /// Wire form of the message
    pub fn to_line(&self) -> String {
        match self {
            PresenceMessage::Ready => "READY".to_string(),
            PresenceMessage::Distance(event) => {
                format!("DISTANCE:{},TIME:{}", event.distance_cm, event.elapsed_seconds)
            }
            PresenceMessage::Complete => "COMPLETE".to_string(),
            PresenceMessage::Cancelled => "CANCELLED".to_string(),
            PresenceMessage::Reset => "RESET".to_string(),
        }
    }
}
