//! Wall-clock hour source

use chrono::{Local, Timelike};
use std::sync::atomic::{AtomicU32, Ordering};

pub trait Clock: Send + Sync {
    /// Current local hour, 0-23
    fn current_hour(&self) -> u32;
}

/// System local time
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn current_hour(&self) -> u32 {
        Local::now().hour()
    }
}

/// Clock whose hour is set by hand
#[derive(Debug, Default)]
pub struct ManualClock {
    hour: AtomicU32,
}

impl ManualClock {
    pub fn new(hour: u32) -> Self {
        Self {
            hour: AtomicU32::new(hour),
        }
    }

    pub fn set_hour(&self, hour: u32) {
        self.hour.store(hour, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn current_hour(&self) -> u32 {
        self.hour.load(Ordering::SeqCst)
    }
}
