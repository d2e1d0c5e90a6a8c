//! Published camera detector

use crate::camera::CameraOrchestrator;
use std::sync::{Arc, RwLock};

/// Where the scheduler publishes the live camera orchestrator and screens
/// look it up. Empty outside the activation window.
#[derive(Default)]
pub struct DetectorSlot {
    current: RwLock<Option<Arc<CameraOrchestrator>>>,
}

impl DetectorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `detector`, returning whatever was published before
    pub fn publish(&self, detector: Arc<CameraOrchestrator>) -> Option<Arc<CameraOrchestrator>> {
        let mut current = self.current.write().unwrap_or_else(|p| p.into_inner());
        current.replace(detector)
    }

    /// Unpublish and hand back the detector
    pub fn take(&self) -> Option<Arc<CameraOrchestrator>> {
        self.current.write().unwrap_or_else(|p| p.into_inner()).take()
    }

    pub fn current(&self) -> Option<Arc<CameraOrchestrator>> {
        self.current.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn is_published(&self) -> bool {
        self.current.read().map(|c| c.is_some()).unwrap_or(false)
    }
}
