//! Evaluate-and-flip scheduler

use crate::clock::Clock;
use crate::host::DetectionHost;
use crate::source::ScheduleSource;
use crate::window::ScheduleWindow;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// How long `shutdown` waits for a timer task before aborting it
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Scheduler timing
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Evaluate-and-flip period (default: 1 h)
    pub evaluate_every: Duration,
    /// Window reload period (default: 6 h)
    pub reload_every: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            evaluate_every: Duration::from_secs(60 * 60),
            reload_every: Duration::from_secs(6 * 60 * 60),
        }
    }
}

/// Point-in-time view of the scheduler
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub detection_active: bool,
    pub window: ScheduleWindow,
    pub last_evaluated_hour: Option<u32>,
}

struct CoreState {
    window: ScheduleWindow,
    detection_active: bool,
    last_evaluated_hour: Option<u32>,
}

/// Everything the timer tasks share. Every read-act-write of
/// `detection_active` happens under `state`.
struct Core {
    source: Arc<dyn ScheduleSource>,
    host: Arc<dyn DetectionHost>,
    clock: Arc<dyn Clock>,
    state: Mutex<CoreState>,
}

impl Core {
    async fn evaluate(&self) {
        let mut state = self.state.lock().await;
        self.evaluate_locked(&mut state).await;
    }

    /// Re-fetch the window. Re-evaluates when it changed, or always with `force`.
    async fn reload(&self, force: bool) {
        let mut state = self.state.lock().await;

        let changed = match self.source.fetch().await {
            Ok(window) if window != state.window => {
                info!("Schedule window changed: {} -> {}", state.window, window);
                state.window = window;
                true
            }
            Ok(_) => {
                debug!("Schedule window unchanged ({})", state.window);
                false
            }
            Err(e) => {
                warn!("Schedule reload failed, keeping {}: {}", state.window, e);
                false
            }
        };

        if changed || force {
            self.evaluate_locked(&mut state).await;
        }
    }

    async fn evaluate_locked(&self, state: &mut CoreState) {
        let hour = self.clock.current_hour();
        state.last_evaluated_hour = Some(hour);
        let inside = state.window.is_active_hour(hour);

        match (inside, state.detection_active) {
            (true, false) => match self.host.start_detection().await {
                Ok(()) => {
                    info!("Hour {} inside {}: camera detection on", hour, state.window);
                    state.detection_active = true;
                }
                Err(e) => warn!("Camera detection failed to start, retrying next tick: {}", e),
            },
            (false, true) => {
                info!("Hour {} outside {}: camera detection off", hour, state.window);
                self.host.stop_detection().await;
                state.detection_active = false;
            }
            _ => debug!("Hour {}: detection active = {}, nothing to do", hour, state.detection_active),
        }
    }

    async fn flip_off(&self) {
        let mut state = self.state.lock().await;
        if state.detection_active {
            info!("Final flip-off of camera detection");
            self.host.stop_detection().await;
            state.detection_active = false;
        }
    }
}

struct Timers {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

/// Clock-driven switch for camera detection
pub struct ActivationScheduler {
    core: Arc<Core>,
    config: SchedulerConfig,
    timers: Mutex<Option<Timers>>,
}

impl ActivationScheduler {
    pub fn new(
        source: Arc<dyn ScheduleSource>,
        host: Arc<dyn DetectionHost>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            core: Arc::new(Core {
                source,
                host,
                clock,
                state: Mutex::new(CoreState {
                    window: ScheduleWindow::default(),
                    detection_active: false,
                    last_evaluated_hour: None,
                }),
            }),
            config,
            timers: Mutex::new(None),
        }
    }

    /// Load the window, evaluate now and arm both timers. No-op when running.
    pub async fn start(&self) {
        let mut timers = self.timers.lock().await;
        if timers.is_some() {
            debug!("Activation scheduler already running");
            return;
        }

        info!(
            "Starting activation scheduler (evaluate every {:?}, reload every {:?})",
            self.config.evaluate_every, self.config.reload_every
        );
        self.core.reload(true).await;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let evaluate = {
            let core = Arc::clone(&self.core);
            spawn_timer("evaluate", self.config.evaluate_every, shutdown_rx.clone(), move || {
                let core = Arc::clone(&core);
                async move { core.evaluate().await }
            })
        };
        let reload = {
            let core = Arc::clone(&self.core);
            spawn_timer("reload", self.config.reload_every, shutdown_rx, move || {
                let core = Arc::clone(&core);
                async move { core.reload(false).await }
            })
        };

        *timers = Some(Timers {
            shutdown,
            tasks: vec![evaluate, reload],
        });
    }

    /// Cancel both timers and switch detection off. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        if let Some(timers) = self.timers.lock().await.take() {
            info!("Stopping activation scheduler");
            let _ = timers.shutdown.send(true);
            for mut task in timers.tasks {
                if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                    warn!("Scheduler timer did not stop within {:?}, aborting", SHUTDOWN_GRACE);
                    task.abort();
                }
            }
        }
        self.core.flip_off().await;
    }

    /// Evaluate the current hour right away
    pub async fn evaluate_now(&self) {
        self.core.evaluate().await;
    }

    /// Reload the window right away
    pub async fn reload_now(&self) {
        self.core.reload(false).await;
    }

    pub async fn status(&self) -> SchedulerStatus {
        let running = self.timers.lock().await.is_some();
        let state = self.core.state.lock().await;
        SchedulerStatus {
            running,
            detection_active: state.detection_active,
            window: state.window,
            last_evaluated_hour: state.last_evaluated_hour,
        }
    }
}

fn spawn_timer<F, Fut>(name: &'static str, period: Duration, mut shutdown: watch::Receiver<bool>, tick: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {
                    debug!("Scheduler {} tick", name);
                    tick().await;
                }
            }
        }
        debug!("Scheduler {} timer stopped", name);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::ScheduleError;
    use async_trait::async_trait;
    use detection::DetectionError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeHost {
        starts: AtomicUsize,
        stops: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl DetectionHost for FakeHost {
        async fn start_detection(&self) -> Result<(), DetectionError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DetectionError::InferenceUnavailable("down".into()));
            }
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn stop_detection(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FakeSource {
        window: std::sync::Mutex<Option<ScheduleWindow>>,
        fetches: AtomicUsize,
    }

    impl FakeSource {
        fn new(window: Option<ScheduleWindow>) -> Self {
            Self {
                window: std::sync::Mutex::new(window),
                fetches: AtomicUsize::new(0),
            }
        }

        fn set(&self, window: Option<ScheduleWindow>) {
            *self.window.lock().unwrap() = window;
        }
    }

    #[async_trait]
    impl ScheduleSource for FakeSource {
        async fn fetch(&self) -> Result<ScheduleWindow, ScheduleError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.window
                .lock()
                .unwrap()
                .ok_or_else(|| ScheduleError::ConfigurationUnavailable("offline".into()))
        }
    }

    struct Harness {
        scheduler: ActivationScheduler,
        host: Arc<FakeHost>,
        source: Arc<FakeSource>,
        clock: Arc<ManualClock>,
    }

    fn harness(hour: u32, window: Option<ScheduleWindow>) -> Harness {
        let host = Arc::new(FakeHost::default());
        let source = Arc::new(FakeSource::new(window));
        let clock = Arc::new(ManualClock::new(hour));
        let scheduler = ActivationScheduler::new(
            source.clone(),
            host.clone(),
            clock.clone(),
            SchedulerConfig::default(),
        );
        Harness {
            scheduler,
            host,
            source,
            clock,
        }
    }

    const HOUR: Duration = Duration::from_secs(60 * 60);

    #[tokio::test(start_paused = true)]
    async fn test_start_inside_window_turns_detection_on() {
        let h = harness(10, Some(ScheduleWindow::new(8, 18).unwrap()));
        h.scheduler.start().await;
        h.scheduler.start().await;

        assert_eq!(h.host.starts.load(Ordering::SeqCst), 1);
        assert_eq!(h.source.fetches.load(Ordering::SeqCst), 1);
        let status = h.scheduler.status().await;
        assert!(status.running);
        assert!(status.detection_active);
        assert_eq!(status.last_evaluated_hour, Some(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hourly_tick_flips_off_outside_window() {
        let h = harness(17, Some(ScheduleWindow::new(8, 18).unwrap()));
        h.scheduler.start().await;
        assert!(h.scheduler.status().await.detection_active);

        h.clock.set_hour(18);
        tokio::time::sleep(HOUR + Duration::from_secs(1)).await;

        assert_eq!(h.host.stops.load(Ordering::SeqCst), 1);
        assert!(!h.scheduler.status().await.detection_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_start_retried_next_tick() {
        let h = harness(9, None);
        h.host.fail.store(true, Ordering::SeqCst);
        h.scheduler.start().await;
        assert!(!h.scheduler.status().await.detection_active);

        h.host.fail.store(false, Ordering::SeqCst);
        tokio::time::sleep(HOUR + Duration::from_secs(1)).await;

        assert_eq!(h.host.starts.load(Ordering::SeqCst), 1);
        assert!(h.scheduler.status().await.detection_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_keeps_default_window() {
        let h = harness(12, None);
        h.scheduler.start().await;

        let status = h.scheduler.status().await;
        assert_eq!(status.window, ScheduleWindow::default());
        assert!(status.detection_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_applies_changed_window_immediately() {
        let h = harness(20, Some(ScheduleWindow::new(6, 22).unwrap()));
        h.scheduler.start().await;
        assert!(h.scheduler.status().await.detection_active);

        h.source.set(Some(ScheduleWindow::new(6, 19).unwrap()));
        tokio::time::sleep(6 * HOUR - Duration::from_secs(1)).await;
        // hourly ticks saw no change; the reload has not happened yet
        assert_eq!(h.host.stops.load(Ordering::SeqCst), 0);

        // the reload tick re-evaluates right away with the new window
        h.scheduler.reload_now().await;
        assert_eq!(h.host.stops.load(Ordering::SeqCst), 1);
        assert_eq!(h.scheduler.status().await.window, ScheduleWindow::new(6, 19).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_tick_fires_after_six_hours() {
        let h = harness(10, Some(ScheduleWindow::new(6, 22).unwrap()));
        h.scheduler.start().await;

        h.source.set(Some(ScheduleWindow::new(11, 22).unwrap()));
        tokio::time::sleep(6 * HOUR + Duration::from_secs(1)).await;

        assert!(h.source.fetches.load(Ordering::SeqCst) >= 2);
        assert_eq!(h.host.stops.load(Ordering::SeqCst), 1);
        assert!(!h.scheduler.status().await.detection_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_failure_keeps_last_window() {
        let window = ScheduleWindow::new(7, 20).unwrap();
        let h = harness(10, Some(window));
        h.scheduler.start().await;

        h.source.set(None);
        h.scheduler.reload_now().await;
        assert_eq!(h.scheduler.status().await.window, window);
        assert!(h.scheduler.status().await.detection_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flips_off_once() {
        let h = harness(10, None);
        h.scheduler.start().await;

        h.scheduler.shutdown().await;
        h.scheduler.shutdown().await;

        assert_eq!(h.host.stops.load(Ordering::SeqCst), 1);
        let status = h.scheduler.status().await;
        assert!(!status.running);
        assert!(!status.detection_active);

        // timers are gone: nothing happens after another hour
        h.clock.set_hour(23);
        tokio::time::sleep(HOUR * 2).await;
        assert_eq!(h.host.starts.load(Ordering::SeqCst), 1);
    }

    mod end_to_end {
        use super::*;
        use crate::host::OrchestratorHost;
        use accessibility::ModeSwitch;
        use axum::routing::get;
        use axum::Router;
        use camera_capture::mock::{MockBackend, MockBehavior};
        use camera_capture::CameraConfig;
        use detection::{CameraOrchestrator, DetectorSlot};
        use inference_client::{InferenceClient, InferenceConfig};

        struct IgnoreMode;

        #[async_trait]
        impl ModeSwitch for IgnoreMode {
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

        #[tokio::test]
        async fn test_leaving_window_releases_every_camera() {
            let backend = MockBackend::new()
                .with_camera(0, MockBehavior::Frame { width: 8, height: 8 })
                .with_camera(1, MockBehavior::Frame { width: 8, height: 8 });
            let handles = backend.clone();
            let base_url = healthy_service().await;
            let slot = Arc::new(DetectorSlot::new());

            let host = OrchestratorHost::new(
                move || {
                    let inference = InferenceClient::new(InferenceConfig {
                        base_url: base_url.clone(),
                        ..Default::default()
                    })
                    .unwrap();
                    CameraOrchestrator::new(
                        Arc::new(backend.clone()),
                        inference,
                        Arc::new(IgnoreMode),
                        CameraConfig::default(),
                    )
                },
                Arc::clone(&slot),
            );
            let clock = Arc::new(ManualClock::new(21));
            let scheduler = ActivationScheduler::new(
                Arc::new(FakeSource::new(Some(ScheduleWindow::new(6, 22).unwrap()))),
                Arc::new(host),
                clock.clone(),
                SchedulerConfig::default(),
            );

            // Real I/O for the health check, then a virtual clock for the tick
            scheduler.start().await;
            assert!(slot.is_published());
            assert_eq!(handles.open_handles(), 2);

            tokio::time::pause();
            clock.set_hour(23);
            tokio::time::sleep(HOUR + Duration::from_secs(1)).await;

            assert!(!slot.is_published());
            assert_eq!(handles.open_handles(), 0);
            assert!(!scheduler.status().await.detection_active);
            scheduler.shutdown().await;
        }
    }
}
