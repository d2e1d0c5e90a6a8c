//! Mode controller

use crate::{AccessibilityConfig, ModeSwitch};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use voice_engine::VoiceSession;

/// Builds a fresh voice session each time voice operation starts
pub trait VoiceSessionFactory: Send + Sync {
    fn create(&self) -> VoiceSession;
}

impl<F> VoiceSessionFactory for F
where
    F: Fn() -> VoiceSession + Send + Sync,
{
    fn create(&self) -> VoiceSession {
        self()
    }
}

#[derive(Default)]
struct ModeState {
    enabled: bool,
    session: Option<Arc<VoiceSession>>,
}

/// Owner of the single shared voice session
pub struct AccessibilityModeController {
    factory: Arc<dyn VoiceSessionFactory>,
    config: AccessibilityConfig,
    state: Mutex<ModeState>,
    mode: watch::Sender<bool>,
}

impl AccessibilityModeController {
    pub fn new(factory: Arc<dyn VoiceSessionFactory>, config: AccessibilityConfig) -> Self {
        let (mode, _) = watch::channel(false);
        Self {
            factory,
            config,
            state: Mutex::new(ModeState::default()),
            mode,
        }
    }

    /// Start voice operation. No-op when already enabled.
    pub async fn enable(&self) {
        let mut state = self.state.lock().await;
        if state.enabled {
            debug!("Accessibility mode already enabled");
            return;
        }

        info!("Enabling accessibility mode");
        let session = Arc::new(self.factory.create());
        let readiness = session.initialize().await;
        if !readiness.recognition {
            warn!("Voice recognition unavailable, accessibility mode runs speech-only");
        }
        if !readiness.speech {
            warn!("Speech synthesis unavailable, prompts will be silent");
        }

        session.set_speech_rate(self.config.speech_rate);
        session.set_speech_volume(self.config.speech_volume);
        session.activate();
        session.speak(&self.config.welcome_phrase);

        state.session = Some(session);
        state.enabled = true;
        self.mode.send_replace(true);
    }

    /// Return to touch operation. No-op when already disabled.
    pub async fn disable(&self) {
        let mut state = self.state.lock().await;
        if !state.enabled {
            debug!("Accessibility mode already disabled");
            return;
        }

        info!("Disabling accessibility mode");
        Self::teardown(&mut state).await;
        self.mode.send_replace(false);
    }

    /// Tear down any session and clear state regardless of the current mode
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        info!("Resetting accessibility mode");
        Self::teardown(&mut state).await;
        self.mode.send_replace(false);
    }

    /// The live session while enabled
    pub async fn session(&self) -> Option<Arc<VoiceSession>> {
        self.state.lock().await.session.clone()
    }

    pub fn is_enabled(&self) -> bool {
        *self.mode.borrow()
    }

    /// Observe mode changes
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.mode.subscribe()
    }

    async fn teardown(state: &mut ModeState) {
        state.enabled = false;
        if let Some(session) = state.session.take() {
            session.deactivate();
            session.shutdown().await;
        }
    }
}

#[async_trait]
impl ModeSwitch for AccessibilityModeController {
    async fn enable(&self) {
        AccessibilityModeController::enable(self).await
    }

    async fn disable(&self) {
        AccessibilityModeController::disable(self).await
    }
}
