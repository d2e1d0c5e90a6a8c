//! Camera pool keyed by integer index

use crate::{CameraBackend, CameraDevice, CameraError, VideoFrame};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

type SharedDevice = Arc<dyn CameraDevice>;

/// A frame tagged with the camera that produced it
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub camera_index: u32,
    pub frame: VideoFrame,
}

/// Open capture handles, populated once by [`CameraPool::probe`]
pub struct CameraPool {
    cameras: BTreeMap<u32, SharedDevice>,
}

impl CameraPool {
    /// Open cameras through `backend`.
    ///
    /// With an empty `wanted` list every probed camera is tried. Cameras that
    /// fail to open are skipped; at least one must open.
    pub fn probe(backend: &dyn CameraBackend, wanted: &[u32]) -> Result<Self, CameraError> {
        let candidates = if wanted.is_empty() {
            backend.probe()
        } else {
            wanted.to_vec()
        };
        debug!("Probing cameras {:?}", candidates);

        let mut cameras = BTreeMap::new();
        for index in candidates {
            match backend.open(index) {
                Ok(device) => {
                    info!("Camera {} opened", index);
                    cameras.insert(index, Arc::from(device));
                }
                Err(e) => warn!("Camera {} unavailable: {}", index, e),
            }
        }

        if cameras.is_empty() {
            return Err(CameraError::NoCameras);
        }

        Ok(Self { cameras })
    }

    /// Number of open cameras
    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    /// Indices of open cameras, ascending
    pub fn indices(&self) -> Vec<u32> {
        self.cameras.keys().copied().collect()
    }

    /// Capture one frame from every open camera in parallel.
    ///
    /// A camera that fails or exceeds `timeout` contributes no frame; a
    /// timed-out capture is abandoned, not left running. Results are ordered
    /// by camera index.
    pub async fn capture_all(&self, timeout: Duration) -> Vec<CapturedImage> {
        let mut set = JoinSet::new();

        for (&index, camera) in &self.cameras {
            let camera = Arc::clone(camera);
            set.spawn(async move {
                let outcome = match tokio::time::timeout(timeout, camera.capture()).await {
                    Ok(result) => result,
                    Err(_) => Err(CameraError::Timeout),
                };
                (index, outcome)
            });
        }

        let mut images = Vec::with_capacity(self.cameras.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((camera_index, Ok(frame))) => images.push(CapturedImage { camera_index, frame }),
                Ok((camera_index, Err(e))) => warn!("Camera {} produced no frame: {}", camera_index, e),
                Err(e) => warn!("Capture task failed: {}", e),
            }
        }

        images.sort_by_key(|image| image.camera_index);
        images
    }

    /// Release every camera handle and empty the pool
    pub fn close_all(&mut self) {
        for (index, camera) in std::mem::take(&mut self.cameras) {
            camera.close();
            info!("Camera {} released", index);
        }
    }
}

impl Drop for CameraPool {
    fn drop(&mut self) {
        if !self.cameras.is_empty() {
            self.close_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockBehavior};

    #[test]
    fn test_probe_skips_failed_cameras() {
        let backend = MockBackend::new()
            .with_camera(0, MockBehavior::Frame { width: 8, height: 8 })
            .with_unopenable(1)
            .with_camera(2, MockBehavior::Frame { width: 8, height: 8 });

        let pool = CameraPool::probe(&backend, &[]).unwrap();
        assert_eq!(pool.indices(), vec![0, 2]);
    }

    #[test]
    fn test_probe_without_cameras_fails() {
        let backend = MockBackend::new().with_unopenable(0);
        assert!(matches!(CameraPool::probe(&backend, &[]), Err(CameraError::NoCameras)));
    }

    #[test]
    fn test_probe_respects_wanted_indices() {
        let backend = MockBackend::new()
            .with_camera(0, MockBehavior::Frame { width: 8, height: 8 })
            .with_camera(1, MockBehavior::Frame { width: 8, height: 8 });

        let pool = CameraPool::probe(&backend, &[1]).unwrap();
        assert_eq!(pool.indices(), vec![1]);
        assert_eq!(backend.open_handles(), 1);
    }

    #[tokio::test]
    async fn test_capture_all_drops_failing_and_slow_cameras() {
        let backend = MockBackend::new()
            .with_camera(0, MockBehavior::Frame { width: 8, height: 8 })
            .with_camera(1, MockBehavior::Fail)
            .with_camera(2, MockBehavior::Hang(Duration::from_millis(500)));

        let pool = CameraPool::probe(&backend, &[]).unwrap();
        let images = pool.capture_all(Duration::from_millis(50)).await;

        assert_eq!(images.len(), 1);
        assert_eq!(images[0].camera_index, 0);
    }

    #[tokio::test]
    async fn test_timed_out_capture_is_abandoned() {
        let backend = MockBackend::new().with_camera(0, MockBehavior::Hang(Duration::from_secs(30)));
        let mut pool = CameraPool::probe(&backend, &[]).unwrap();

        for _ in 0..3 {
            let started = std::time::Instant::now();
            assert!(pool.capture_all(Duration::from_millis(20)).await.is_empty());
            assert!(started.elapsed() < Duration::from_secs(5));
            assert_eq!(backend.captures_in_flight(), 0);
        }

        pool.close_all();
        assert_eq!(backend.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_close_interrupts_running_capture() {
        let backend = MockBackend::new().with_camera(0, MockBehavior::Hang(Duration::from_secs(30)));
        let device: Arc<dyn CameraDevice> = Arc::from(backend.open(0).unwrap());

        let capture = {
            let device = Arc::clone(&device);
            tokio::spawn(async move { device.capture().await })
        };
        while backend.captures_in_flight() == 0 {
            tokio::task::yield_now().await;
        }

        device.close();
        assert_eq!(backend.open_handles(), 0);
        let result = tokio::time::timeout(Duration::from_secs(5), capture).await.unwrap().unwrap();
        assert!(matches!(result, Err(CameraError::Capture(_))));
        assert_eq!(backend.captures_in_flight(), 0);
    }

    #[tokio::test]
    async fn test_close_all_releases_handles() {
        let backend = MockBackend::new()
            .with_camera(0, MockBehavior::Frame { width: 8, height: 8 })
            .with_camera(1, MockBehavior::Frame { width: 8, height: 8 });

        let mut pool = CameraPool::probe(&backend, &[]).unwrap();
        assert_eq!(backend.open_handles(), 2);

        pool.close_all();
        assert!(pool.is_empty());
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn test_drop_releases_handles() {
        let backend = MockBackend::new().with_camera(0, MockBehavior::Frame { width: 8, height: 8 });
        {
            let _pool = CameraPool::probe(&backend, &[]).unwrap();
            assert_eq!(backend.open_handles(), 1);
        }
        assert_eq!(backend.open_handles(), 0);
    }
}
