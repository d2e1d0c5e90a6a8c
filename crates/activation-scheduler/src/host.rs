//! What the scheduler switches on and off

use async_trait::async_trait;
use detection::{CameraOrchestrator, DetectionError, DetectorSlot};
use std::sync::Arc;
use tracing::{info, warn};

#[async_trait]
pub trait DetectionHost: Send + Sync {
    /// Bring camera detection up. On error detection stays down.
    async fn start_detection(&self) -> Result<(), DetectionError>;

    /// Tear camera detection down and release the hardware
    async fn stop_detection(&self);
}

type OrchestratorFactory = Box<dyn Fn() -> CameraOrchestrator + Send + Sync>;

/// Builds a fresh camera orchestrator per activation and publishes it in
/// the shared [`DetectorSlot`]
pub struct OrchestratorHost {
    factory: OrchestratorFactory,
    slot: Arc<DetectorSlot>,
}

impl OrchestratorHost {
    pub fn new<F>(factory: F, slot: Arc<DetectorSlot>) -> Self
    where
        F: Fn() -> CameraOrchestrator + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            slot,
        }
    }

    pub fn slot(&self) -> &Arc<DetectorSlot> {
        &self.slot
    }
}

#[async_trait]
impl DetectionHost for OrchestratorHost {
    async fn start_detection(&self) -> Result<(), DetectionError> {
        let orchestrator = Arc::new((self.factory)());
        if let Err(e) = orchestrator.initialize().await {
            orchestrator.shutdown().await;
            return Err(e);
        }

        if let Some(previous) = self.slot.publish(orchestrator) {
            warn!("Replacing a camera detector that was still published");
            previous.shutdown().await;
        }
        info!("Camera detection published");
        Ok(())
    }

    async fn stop_detection(&self) {
        if let Some(orchestrator) = self.slot.take() {
            orchestrator.shutdown().await;
            info!("Camera detection withdrawn");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accessibility::ModeSwitch;
    use axum::routing::get;
    use axum::Router;
    use camera_capture::mock::{MockBackend, MockBehavior};
    use camera_capture::CameraConfig;
    use inference_client::{InferenceClient, InferenceConfig};

    struct NoopSwitch;

    #[async_trait]
    impl ModeSwitch for NoopSwitch {
        async fn enable(&self) {}
        async fn disable(&self) {}
    }

    async fn healthy_service() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/health", get(|| async { "ok" }));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn host(backend: MockBackend, base_url: String) -> OrchestratorHost {
        let factory = move || {
            let inference = InferenceClient::new(InferenceConfig {
                base_url: base_url.clone(),
                ..Default::default()
            })
            .unwrap();
            CameraOrchestrator::new(
                Arc::new(backend.clone()),
                inference,
                Arc::new(NoopSwitch),
                CameraConfig::default(),
            )
        };
        OrchestratorHost::new(factory, Arc::new(DetectorSlot::new()))
    }

    #[tokio::test]
    async fn test_start_publishes_and_stop_releases() {
        let backend = MockBackend::new().with_camera(0, MockBehavior::Frame { width: 8, height: 8 });
        let handles = backend.clone();
        let host = host(backend, healthy_service().await);

        host.start_detection().await.unwrap();
        assert!(host.slot().is_published());
        assert!(host.slot().current().unwrap().is_ready());
        assert_eq!(handles.open_handles(), 1);

        host.stop_detection().await;
        assert!(!host.slot().is_published());
        assert_eq!(handles.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_failed_start_publishes_nothing() {
        let backend = MockBackend::new().with_camera(0, MockBehavior::Frame { width: 8, height: 8 });
        let handles = backend.clone();
        let host = host(backend, "http://127.0.0.1:9".into());

        assert!(host.start_detection().await.is_err());
        assert!(!host.slot().is_published());
        assert_eq!(handles.open_handles(), 0);
    }
}
