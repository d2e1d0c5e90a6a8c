//! Presence detection orchestrator
//!
//! The microcontroller decides on its own when someone stood long enough in
//! front of the kiosk; this side only waits for its `COMPLETE`/`CANCELLED`.

use crate::readiness::ReadinessGate;
use crate::DetectionError;
use accessibility::ModeSwitch;
use presence_protocol::{PresenceClient, PresenceMessage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Clears the in-flight flag however a detection ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct PresenceOrchestrator {
    client: tokio::sync::Mutex<Option<PresenceClient>>,
    mode: Arc<dyn ModeSwitch>,
    gate: Arc<ReadinessGate>,
    /// Cleared once the sensor stream ends
    linked: Arc<AtomicBool>,
    in_flight: AtomicBool,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl PresenceOrchestrator {
    pub fn new(mode: Arc<dyn ModeSwitch>) -> Self {
        Self {
            client: tokio::sync::Mutex::new(None),
            mode,
            gate: Arc::new(ReadinessGate::new()),
            linked: Arc::new(AtomicBool::new(false)),
            in_flight: AtomicBool::new(false),
            watcher: Mutex::new(None),
        }
    }

    /// Open the sensor port (empty `port` auto-discovers) and start watching it
    pub async fn initialize(&self, port: &str, baud_rate: u32) -> Result<(), DetectionError> {
        let client = PresenceClient::connect(port, baud_rate).await?;
        self.attach(client).await;
        Ok(())
    }

    /// Watch an already connected session. Replaces any previous one.
    pub async fn attach(&self, client: PresenceClient) {
        info!("Presence detection attached to {}", client.port_name());
        let messages = client.subscribe();

        let previous_watcher = self.watcher.lock().ok().and_then(|mut w| w.take());
        if let Some(previous) = previous_watcher {
            previous.abort();
        }
        self.linked.store(true, Ordering::SeqCst);
        let watcher = tokio::spawn(watch_sensor(messages, Arc::clone(&self.gate), Arc::clone(&self.linked)));
        if let Ok(mut slot) = self.watcher.lock() {
            *slot = Some(watcher);
        }
        if let Some(mut previous) = self.client.lock().await.replace(client) {
            previous.disconnect().await;
        }
    }

    /// Sensor announced `READY` and its stream is still open
    pub fn is_ready(&self) -> bool {
        self.gate.is_ready() && self.is_connected()
    }

    /// False once the sensor stream has ended or the port was closed
    pub fn is_connected(&self) -> bool {
        self.linked.load(Ordering::SeqCst)
    }

    pub fn readiness(&self) -> &ReadinessGate {
        &self.gate
    }

    pub fn is_detecting(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait for the sensor's verdict.
    ///
    /// False right away when the sensor is not ready or another detection is
    /// already waiting. Otherwise resolves once: true on `COMPLETE`, false on
    /// `CANCELLED` or when the stream ends.
    pub async fn detect_async(&self) -> bool {
        self.detect_outcome().await.unwrap_or(false)
    }

    /// Detect and flip the mode accordingly. A lost sensor leaves the mode alone.
    pub async fn detect_and_activate_async(&self) -> bool {
        match self.detect_outcome().await {
            Some(true) => {
                self.mode.enable().await;
                true
            }
            Some(false) => {
                self.mode.disable().await;
                false
            }
            None => false,
        }
    }

    /// `None` when the sensor is unavailable and has no verdict to give
    async fn detect_outcome(&self) -> Option<bool> {
        if !self.is_connected() {
            debug!("Presence detection skipped: sensor disconnected");
            return None;
        }
        if !self.gate.is_ready() {
            debug!("Presence detection skipped: sensor not ready");
            return Some(false);
        }

        // Subscribe before claiming the slot so nothing sent after the claim is missed
        let mut messages = match self.client.lock().await.as_ref() {
            Some(client) => client.subscribe(),
            None => return None,
        };

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Presence detection skipped: already in flight");
            return Some(false);
        }
        let _guard = InFlight(&self.in_flight);

        loop {
            match messages.recv().await {
                Ok(PresenceMessage::Complete) => {
                    info!("Presence sensor: detection complete");
                    return Some(true);
                }
                Ok(PresenceMessage::Cancelled) => {
                    info!("Presence sensor: detection cancelled");
                    return Some(false);
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Presence detection skipped {} messages", skipped);
                }
                Err(RecvError::Closed) => {
                    error!("Presence stream closed during detection");
                    self.linked.store(false, Ordering::SeqCst);
                    return None;
                }
            }
        }
    }

    /// Stop watching and close the port
    pub async fn shutdown(&self) {
        self.linked.store(false, Ordering::SeqCst);
        let watcher = self.watcher.lock().ok().and_then(|mut w| w.take());
        if let Some(watcher) = watcher {
            watcher.abort();
        }
        if let Some(mut client) = self.client.lock().await.take() {
            client.disconnect().await;
        }
    }
}

async fn watch_sensor(mut messages: Receiver<PresenceMessage>, gate: Arc<ReadinessGate>, linked: Arc<AtomicBool>) {
    loop {
        match messages.recv().await {
            Ok(PresenceMessage::Ready) => {
                if gate.mark_as_ready() {
                    info!("Presence sensor ready");
                }
            }
            Ok(PresenceMessage::Distance(event)) => {
                debug!("Presence at {:.1} cm for {} s", event.distance_cm, event.elapsed_seconds);
            }
            Ok(PresenceMessage::Reset) => info!("Presence sensor reset"),
            Ok(PresenceMessage::Complete) | Ok(PresenceMessage::Cancelled) => {}
            Err(RecvError::Lagged(skipped)) => warn!("Presence watcher skipped {} messages", skipped),
            Err(RecvError::Closed) => {
                error!("Presence stream ended, sensor unavailable");
                linked.store(false, Ordering::SeqCst);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, DuplexStream};

    #[derive(Default)]
    struct CountingSwitch {
        enables: AtomicUsize,
        disables: AtomicUsize,
    }

    #[async_trait]
    impl ModeSwitch for CountingSwitch {
        async fn enable(&self) {
            self.enables.fetch_add(1, Ordering::SeqCst);
        }

        async fn disable(&self) {
            self.disables.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn attached() -> (Arc<PresenceOrchestrator>, DuplexStream, Arc<CountingSwitch>) {
        let (sensor, host) = tokio::io::duplex(256);
        let switch = Arc::new(CountingSwitch::default());
        let orchestrator = Arc::new(PresenceOrchestrator::new(switch.clone()));
        orchestrator.attach(PresenceClient::from_reader("duplex", host)).await;
        (orchestrator, sensor, switch)
    }

    async fn send(sensor: &mut DuplexStream, line: &str) {
        sensor.write_all(format!("{}\n", line).as_bytes()).await.unwrap();
    }

    async fn until<F: Fn() -> bool>(condition: F) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_not_ready_resolves_false() {
        let (orchestrator, _sensor, _) = attached().await;
        assert!(!orchestrator.detect_async().await);
    }

    #[tokio::test]
    async fn test_complete_enables_mode() {
        let (orchestrator, mut sensor, switch) = attached().await;
        send(&mut sensor, "READY").await;
        until(|| orchestrator.is_ready()).await;

        let task = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.detect_and_activate_async().await })
        };
        until(|| orchestrator.is_detecting()).await;

        send(&mut sensor, "DISTANCE:42.5,TIME:3").await;
        send(&mut sensor, "garbage").await;
        send(&mut sensor, "COMPLETE").await;

        assert!(task.await.unwrap());
        assert_eq!(switch.enables.load(Ordering::SeqCst), 1);
        assert!(!orchestrator.is_detecting());
    }

    #[tokio::test]
    async fn test_cancelled_disables_mode() {
        let (orchestrator, mut sensor, switch) = attached().await;
        send(&mut sensor, "ready").await;
        until(|| orchestrator.is_ready()).await;

        let task = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.detect_and_activate_async().await })
        };
        until(|| orchestrator.is_detecting()).await;
        send(&mut sensor, "CANCELLED").await;

        assert!(!task.await.unwrap());
        assert_eq!(switch.disables.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_detection_rejected_while_in_flight() {
        let (orchestrator, mut sensor, _) = attached().await;
        send(&mut sensor, "READY").await;
        until(|| orchestrator.is_ready()).await;

        let first = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.detect_async().await })
        };
        until(|| orchestrator.is_detecting()).await;

        assert!(!orchestrator.detect_async().await);

        send(&mut sensor, "COMPLETE").await;
        assert!(first.await.unwrap());
    }

    #[tokio::test]
    async fn test_closed_stream_resolves_false() {
        let (orchestrator, mut sensor, _) = attached().await;
        send(&mut sensor, "READY").await;
        until(|| orchestrator.is_ready()).await;

        let task = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.detect_async().await })
        };
        until(|| orchestrator.is_detecting()).await;
        drop(sensor);

        assert!(!task.await.unwrap());
    }

    #[tokio::test]
    async fn test_lost_sensor_leaves_mode_alone() {
        let (orchestrator, mut sensor, switch) = attached().await;
        send(&mut sensor, "READY").await;
        until(|| orchestrator.is_ready()).await;

        drop(sensor);
        until(|| !orchestrator.is_connected()).await;

        for _ in 0..5 {
            assert!(!orchestrator.detect_and_activate_async().await);
        }
        assert!(!orchestrator.is_ready());
        assert_eq!(switch.disables.load(Ordering::SeqCst), 0);
        assert_eq!(switch.enables.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stream_lost_mid_detection_leaves_mode_alone() {
        let (orchestrator, mut sensor, switch) = attached().await;
        send(&mut sensor, "READY").await;
        until(|| orchestrator.is_ready()).await;

        let task = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.detect_and_activate_async().await })
        };
        until(|| orchestrator.is_detecting()).await;
        drop(sensor);

        assert!(!task.await.unwrap());
        assert!(!orchestrator.is_connected());
        assert_eq!(switch.disables.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shutdown_disconnects() {
        let (orchestrator, _sensor, _) = attached().await;
        orchestrator.shutdown().await;
        assert!(!orchestrator.detect_async().await);
    }
}
