//! In-memory cameras for tests and unattended demos

use crate::{CameraBackend, CameraDevice, CameraError, VideoFrame};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// How a mock camera answers capture requests
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Return a grey RGB frame of the given size
    Frame { width: u32, height: u32 },
    /// Fail every capture
    Fail,
    /// Sleep before returning a small frame
    Hang(Duration),
}

/// Mock backend with a fixed set of cameras
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    cameras: BTreeMap<u32, Option<MockBehavior>>,
    open: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a camera that opens and behaves as given
    pub fn with_camera(mut self, index: u32, behavior: MockBehavior) -> Self {
        self.cameras.insert(index, Some(behavior));
        self
    }

    /// Attach a camera that shows up in the probe but cannot be opened
    pub fn with_unopenable(mut self, index: u32) -> Self {
        self.cameras.insert(index, None);
        self
    }

    /// Handles opened and not yet released
    pub fn open_handles(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Captures started and not yet finished or abandoned
    pub fn captures_in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl CameraBackend for MockBackend {
    fn probe(&self) -> Vec<u32> {
        self.cameras.keys().copied().collect()
    }

    fn open(&self, index: u32) -> Result<Box<dyn CameraDevice>, CameraError> {
        match self.cameras.get(&index) {
            Some(Some(behavior)) => {
                self.open.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(MockCamera {
                    index,
                    behavior: behavior.clone(),
                    sequence: AtomicU32::new(0),
                    open: Arc::clone(&self.open),
                    in_flight: Arc::clone(&self.in_flight),
                    closed: AtomicBool::new(false),
                    cancel: Notify::new(),
                }))
            }
            Some(None) => Err(CameraError::Open(format!("mock camera {} refuses to open", index))),
            None => Err(CameraError::Open(format!("no mock camera {}", index))),
        }
    }
}

struct MockCamera {
    index: u32,
    behavior: MockBehavior,
    sequence: AtomicU32,
    open: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    closed: AtomicBool,
    cancel: Notify,
}

/// Counts a capture until it returns or its future is dropped
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CameraDevice for MockCamera {
    fn index(&self) -> u32 {
        self.index
    }

    async fn capture(&self) -> Result<VideoFrame, CameraError> {
        let cancelled = self.cancel.notified();
        tokio::pin!(cancelled);
        cancelled.as_mut().enable();
        if self.closed.load(Ordering::SeqCst) {
            return Err(CameraError::Capture("camera closed".into()));
        }

        let _counted = InFlight::enter(&self.in_flight);
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        match &self.behavior {
            MockBehavior::Frame { width, height } => {
                VideoFrame::rgb(vec![96; (*width * *height * 3) as usize], *width, *height, sequence)
            }
            MockBehavior::Fail => Err(CameraError::Capture(format!("mock camera {} failed", self.index))),
            MockBehavior::Hang(delay) => {
                tokio::select! {
                    _ = tokio::time::sleep(*delay) => VideoFrame::rgb(vec![96; 4 * 4 * 3], 4, 4, sequence),
                    _ = &mut cancelled => Err(CameraError::Capture("camera closed".into())),
                }
            }
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.open.fetch_sub(1, Ordering::SeqCst);
            self.cancel.notify_waiters();
        }
    }
}

impl Drop for MockCamera {
    fn drop(&mut self) {
        self.close();
    }
}
