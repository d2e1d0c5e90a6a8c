//! Composition root
//!
//! Every service is built here once and handed to its collaborators.

use crate::config::{CameraBackendKind, KioskConfig};
use crate::{create_router, AppState};
use accessibility::{AccessibilityConfig, AccessibilityModeController, VoiceSessionFactory};
use activation_scheduler::{
    ActivationScheduler, HttpScheduleSource, LocalClock, OrchestratorHost, ScheduleSource, ScheduleWindow,
    SchedulerConfig, StaticScheduleSource,
};
use anyhow::Context;
use camera_capture::mock::{MockBackend, MockBehavior};
use camera_capture::snapshot::SnapshotBackend;
use camera_capture::{CameraBackend, CameraConfig};
use detection::{CameraOrchestrator, DetectorSlot, PresenceOrchestrator};
use inference_client::{InferenceClient, InferenceConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use voice_engine::backends::{CommandSynthesizer, ConsoleRecognizer, DisabledRecognizer, SilentSynthesizer};
use voice_engine::{RecognitionEngine, SynthesisEngine, VoiceSession};

pub struct Kiosk {
    config: KioskConfig,
    state: Arc<AppState>,
}

impl Kiosk {
    /// Build every service from `config`. Only invalid configuration fails;
    /// missing hardware degrades instead.
    pub async fn build(config: KioskConfig, metrics: Option<PrometheusHandle>) -> anyhow::Result<Self> {
        let controller = Arc::new(AccessibilityModeController::new(
            voice_factory(&config),
            AccessibilityConfig {
                welcome_phrase: config.voice.welcome_phrase.clone(),
                speech_rate: config.voice.rate,
                speech_volume: config.voice.volume,
            },
        ));

        let inference = InferenceClient::new(InferenceConfig {
            base_url: config.inference.base_url.clone(),
            confidence_threshold: config.inference.confidence_threshold,
            request_timeout: Duration::from_millis(config.inference.request_timeout_ms),
        })
        .context("invalid inference settings")?;

        let backend = camera_backend(&config);
        let camera_config = CameraConfig {
            indices: config.cameras.indices.clone(),
            capture_timeout: Duration::from_millis(config.inference.capture_timeout_ms),
            max_width: config.cameras.max_width,
            jpeg_quality: config.cameras.jpeg_quality,
        };

        let detectors = Arc::new(DetectorSlot::new());
        let host = {
            let controller = Arc::clone(&controller);
            OrchestratorHost::new(
                move || {
                    CameraOrchestrator::new(
                        Arc::clone(&backend),
                        inference.clone(),
                        controller.clone(),
                        camera_config.clone(),
                    )
                },
                Arc::clone(&detectors),
            )
        };

        let scheduler = Arc::new(ActivationScheduler::new(
            schedule_source(&config)?,
            Arc::new(host),
            Arc::new(LocalClock),
            SchedulerConfig {
                evaluate_every: Duration::from_secs(config.schedule.evaluate_every_secs.max(1)),
                reload_every: Duration::from_secs(config.schedule.reload_every_secs.max(1)),
            },
        ));

        let presence = if config.presence.enabled {
            let orchestrator = Arc::new(PresenceOrchestrator::new(controller.clone()));
            match orchestrator
                .initialize(&config.presence.port, config.presence.baud_rate)
                .await
            {
                Ok(()) => Some(orchestrator),
                Err(e) => {
                    warn!("Presence sensor unavailable, continuing without it: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let state = Arc::new(AppState {
            controller,
            scheduler,
            detectors,
            presence,
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
        });

        Ok(Self { config, state })
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Run until `shutdown` resolves, then tear everything down
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        self.state.scheduler.start().await;

        let presence_task = self.state.presence.clone().map(|presence| {
            let rearm = Duration::from_millis(self.config.presence.rearm_ms);
            tokio::spawn(presence_loop(presence, rearm))
        });

        let (stop, stop_rx) = watch::channel(false);
        let server = if self.config.status.enabled {
            Some(self.serve_status(stop_rx).await?)
        } else {
            None
        };

        info!("Kiosk accessibility core running");
        shutdown.await;
        info!("Shutdown requested");

        let _ = stop.send(true);
        if let Some(task) = presence_task {
            task.abort();
        }
        if let Some(presence) = &self.state.presence {
            presence.shutdown().await;
        }
        self.state.scheduler.shutdown().await;
        self.state.controller.reset().await;

        if let Some(server) = server {
            match server.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Status server ended with error: {}", e),
                Err(e) => warn!("Status server task failed: {}", e),
            }
        }

        info!("Kiosk accessibility core stopped");
        Ok(())
    }

    async fn serve_status(&self, mut stop: watch::Receiver<bool>) -> anyhow::Result<JoinHandle<std::io::Result<()>>> {
        let listener = tokio::net::TcpListener::bind(&self.config.status.bind)
            .await
            .with_context(|| format!("binding status server to {}", self.config.status.bind))?;
        info!("Status server listening on {}", self.config.status.bind);

        let app = create_router(Arc::clone(&self.state));
        Ok(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop.changed().await;
                })
                .await
        }))
    }
}

/// Keep one presence detection armed while the sensor is connected
async fn presence_loop(presence: Arc<PresenceOrchestrator>, rearm: Duration) {
    presence.readiness().ready().await;
    loop {
        presence.detect_and_activate_async().await;
        if !presence.is_connected() {
            error!("Presence sensor lost, presence detection stays off");
            return;
        }
        tokio::time::sleep(rearm).await;
    }
}

fn voice_factory(config: &KioskConfig) -> Arc<dyn VoiceSessionFactory> {
    // One recognizer for the whole process: the console one owns stdin
    let recognizer: Arc<dyn RecognitionEngine> = if config.voice.console_recognizer {
        Arc::new(ConsoleRecognizer::new())
    } else {
        Arc::new(DisabledRecognizer)
    };

    let program = config.voice.synthesizer_program.trim().to_string();
    let voice = config.voice.synthesizer_voice.clone();

    Arc::new(move || {
        let synthesizer: Arc<dyn SynthesisEngine> = if program.is_empty() {
            Arc::new(SilentSynthesizer)
        } else {
            Arc::new(CommandSynthesizer::new(program.clone(), voice.clone()))
        };
        VoiceSession::new(Arc::clone(&recognizer), synthesizer)
    })
}

fn camera_backend(config: &KioskConfig) -> Arc<dyn CameraBackend> {
    match config.cameras.backend {
        CameraBackendKind::Snapshot => {
            let backend = if config.cameras.snapshot_args.is_empty() {
                SnapshotBackend::default()
            } else {
                SnapshotBackend::new(config.cameras.snapshot_program.clone(), config.cameras.snapshot_args.clone())
            };
            Arc::new(backend)
        }
        CameraBackendKind::Mock => {
            let indices = if config.cameras.indices.is_empty() {
                vec![0]
            } else {
                config.cameras.indices.clone()
            };
            let backend = indices.into_iter().fold(MockBackend::new(), |backend, index| {
                backend.with_camera(index, MockBehavior::Frame { width: 640, height: 480 })
            });
            Arc::new(backend)
        }
    }
}

fn schedule_source(config: &KioskConfig) -> anyhow::Result<Arc<dyn ScheduleSource>> {
    if config.backend.team_id.trim().is_empty() {
        let window = ScheduleWindow::new(config.schedule.start_hour, config.schedule.end_hour)
            .context("invalid fixed schedule window")?;
        info!("No team id configured, using fixed window {}", window);
        return Ok(Arc::new(StaticScheduleSource(window)));
    }

    let source = HttpScheduleSource::new(
        &config.backend.base_url,
        &config.backend.schedule_path,
        config.backend.team_id.trim(),
        Duration::from_millis(config.backend.request_timeout_ms),
    )
    .context("invalid backend settings")?;
    info!("Schedule from {}", source.url());
    Ok(Arc::new(source))
}
