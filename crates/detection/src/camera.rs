//! Camera detection orchestrator
//!
//! One cycle: capture from every open camera, encode, submit to the
//! inference service, derive a verdict, flip the accessibility mode.

use crate::readiness::ReadinessGate;
use crate::DetectionError;
use accessibility::ModeSwitch;
use camera_capture::{CameraBackend, CameraConfig, CameraError, CameraPool, CapturedImage};
use inference_client::{DetectionVerdict, InferenceClient};
use metrics::counter;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct CameraOrchestrator {
    backend: Arc<dyn CameraBackend>,
    inference: InferenceClient,
    mode: Arc<dyn ModeSwitch>,
    config: CameraConfig,
    pool: RwLock<Option<CameraPool>>,
    gate: ReadinessGate,
    last_verdict: Mutex<Option<DetectionVerdict>>,
}

impl CameraOrchestrator {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        inference: InferenceClient,
        mode: Arc<dyn ModeSwitch>,
        config: CameraConfig,
    ) -> Self {
        Self {
            backend,
            inference,
            mode,
            config,
            pool: RwLock::new(None),
            gate: ReadinessGate::new(),
            last_verdict: Mutex::new(None),
        }
    }

    /// Probe cameras and check the inference service; both must succeed
    /// before the orchestrator becomes ready.
    pub async fn initialize(&self) -> Result<(), DetectionError> {
        if self.gate.is_ready() {
            return Ok(());
        }

        info!("Initializing camera detection against {}", self.inference.base_url());
        let backend = Arc::clone(&self.backend);
        let wanted = self.config.indices.clone();
        let mut pool = tokio::task::spawn_blocking(move || CameraPool::probe(backend.as_ref(), &wanted))
            .await
            .map_err(|e| CameraError::Open(format!("probe task failed: {}", e)))??;
        info!("Cameras open: {:?}", pool.indices());

        if let Err(e) = self.inference.health_check().await {
            pool.close_all();
            return Err(DetectionError::InferenceUnavailable(e.to_string()));
        }

        *self.pool.write().await = Some(pool);
        self.gate.mark_as_ready();
        info!("Camera detection ready");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    pub fn readiness(&self) -> &ReadinessGate {
        &self.gate
    }

    /// Number of cameras currently open
    pub async fn camera_count(&self) -> usize {
        self.pool.read().await.as_ref().map(CameraPool::len).unwrap_or(0)
    }

    /// Run one capture and inference cycle
    pub async fn detect(&self) -> Result<DetectionVerdict, DetectionError> {
        if !self.gate.is_ready() {
            return Err(DetectionError::NotReady);
        }

        let cycle = Uuid::new_v4();
        let started = Instant::now();
        counter!("detection_cycles_total").increment(1);

        let images = {
            let pool = self.pool.read().await;
            let pool = pool.as_ref().ok_or(DetectionError::NotReady)?;
            pool.capture_all(self.config.capture_timeout).await
        };
        debug!("Cycle {}: {} frames captured", cycle, images.len());
        if images.is_empty() {
            return Err(DetectionError::NoFramesCaptured);
        }

        let jpegs = self.encode(images).await?;
        let response = self.inference.verify_images(&jpegs).await?;

        let verdict = DetectionVerdict::from_response(&response, started.elapsed().as_millis() as u64);
        info!(
            "Cycle {}: category {} in {} ms",
            cycle,
            verdict.assistance_category().as_str(),
            verdict.elapsed_millis()
        );
        Ok(verdict)
    }

    /// Run a cycle and flip the mode. Any failure counts as "no assistance".
    pub async fn detect_and_activate(&self) -> bool {
        let started = Instant::now();
        let verdict = match self.detect().await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("Detection cycle failed, staying in normal mode: {}", e);
                counter!("detection_failures_total").increment(1);
                DetectionVerdict::failure(e.to_string(), started.elapsed().as_millis() as u64)
            }
        };

        let needs_assistance = verdict.person_needs_assistance();
        self.record(verdict);

        if needs_assistance {
            counter!("detection_assistance_total").increment(1);
            self.mode.enable().await;
        } else {
            self.mode.disable().await;
        }
        needs_assistance
    }

    /// Verdict of the most recent `detect_and_activate` call
    pub fn last_verdict(&self) -> Option<DetectionVerdict> {
        self.last_verdict.lock().ok().and_then(|v| v.clone())
    }

    /// Release every camera. The orchestrator answers `NotReady` afterwards.
    pub async fn shutdown(&self) {
        if let Some(mut pool) = self.pool.write().await.take() {
            info!("Shutting down camera detection ({} cameras)", pool.len());
            pool.close_all();
        }
    }

    async fn encode(&self, images: Vec<CapturedImage>) -> Result<Vec<Vec<u8>>, DetectionError> {
        let max_width = self.config.max_width;
        let quality = self.config.jpeg_quality;

        let jpegs = tokio::task::spawn_blocking(move || {
            images
                .into_iter()
                .filter_map(|image| {
                    let index = image.camera_index;
                    match image.frame.fit_within(max_width).and_then(|f| f.to_jpeg(quality)) {
                        Ok(jpeg) => Some(jpeg),
                        Err(e) => {
                            warn!("Dropping frame from camera {}: {}", index, e);
                            None
                        }
                    }
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| DetectionError::Encode(e.to_string()))?;

        if jpegs.is_empty() {
            return Err(DetectionError::Encode("no frame could be encoded".into()));
        }
        Ok(jpegs)
    }

    fn record(&self, verdict: DetectionVerdict) {
        if let Ok(mut last) = self.last_verdict.lock() {
            *last = Some(verdict);
        }
    }
}
