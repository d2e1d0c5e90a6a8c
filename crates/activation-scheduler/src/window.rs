//! Working-hours window

use crate::ScheduleError;
use chrono::{NaiveTime, Timelike};
use serde::Serialize;
use std::fmt;

/// Hours `[start_hour, end_hour)` in local wall-clock time.
///
/// A window whose end is not after its start is never active; overnight
/// windows are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduleWindow {
    start_hour: u32,
    end_hour: u32,
}

impl ScheduleWindow {
    pub const DEFAULT_START: u32 = 6;
    pub const DEFAULT_END: u32 = 22;

    pub fn new(start_hour: u32, end_hour: u32) -> Result<Self, ScheduleError> {
        if start_hour > 23 || end_hour > 23 {
            return Err(ScheduleError::InvalidWindow {
                start: start_hour,
                end: end_hour,
            });
        }
        Ok(Self { start_hour, end_hour })
    }

    /// Window from "HH:MM[:SS]" bounds. Anything missing or unparsable
    /// yields the default window.
    pub fn from_times(start: Option<&str>, end: Option<&str>) -> Self {
        match (start.and_then(parse_hour), end.and_then(parse_hour)) {
            (Some(start_hour), Some(end_hour)) => Self { start_hour, end_hour },
            _ => Self::default(),
        }
    }

    pub fn start_hour(&self) -> u32 {
        self.start_hour
    }

    pub fn end_hour(&self) -> u32 {
        self.end_hour
    }

    pub fn is_active_hour(&self, hour: u32) -> bool {
        self.start_hour < self.end_hour && self.start_hour <= hour && hour < self.end_hour
    }
}

impl Default for ScheduleWindow {
    fn default() -> Self {
        Self {
            start_hour: Self::DEFAULT_START,
            end_hour: Self::DEFAULT_END,
        }
    }
}

impl fmt::Display for ScheduleWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:00-{:02}:00", self.start_hour, self.end_hour)
    }
}

/// Hour of a "HH:MM" or "HH:MM:SS" time
pub fn parse_hour(value: &str) -> Option<u32> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
        .map(|time| time.hour())
}
