//! Speech through an external text-to-speech program

use crate::engine::SynthesisEngine;
use crate::VoiceError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::process::Command;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// espeak words per minute at rate 1.0
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

#[derive(Debug, Clone, Copy)]
struct Settings {
    rate: f32,
    volume: f32,
}

struct Utterance {
    generation: u64,
    text: String,
}

/// Synthesizer that runs one program invocation per utterance,
/// espeak-ng style: `<program> -v <voice> -s <wpm> -a <amplitude> <text>`
pub struct CommandSynthesizer {
    program: String,
    voice: String,
    settings: Arc<Mutex<Settings>>,
    generation: Arc<AtomicU64>,
    interrupt: Arc<Notify>,
    queue: Mutex<Option<mpsc::UnboundedSender<Utterance>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CommandSynthesizer {
    pub fn new(program: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            voice: voice.into(),
            settings: Arc::new(Mutex::new(Settings { rate: 1.0, volume: 1.0 })),
            generation: Arc::new(AtomicU64::new(0)),
            interrupt: Arc::new(Notify::new()),
            queue: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    fn enqueue(&self, text: &str) -> Result<(), VoiceError> {
        let queue = self
            .queue
            .lock()
            .map_err(|_| VoiceError::Synthesis("queue poisoned".into()))?;
        let sender = queue.as_ref().ok_or(VoiceError::NotReady)?;
        sender
            .send(Utterance {
                generation: self.generation.load(Ordering::SeqCst),
                text: text.to_string(),
            })
            .map_err(|_| VoiceError::Synthesis("speech worker stopped".into()))
    }
}

fn arguments(voice: &str, settings: Settings, text: &str) -> Vec<String> {
    let words_per_minute = (BASE_WORDS_PER_MINUTE * settings.rate).round().max(80.0) as u32;
    let amplitude = (settings.volume.clamp(0.0, 1.0) * 100.0).round() as u32;
    vec![
        "-v".into(),
        voice.into(),
        "-s".into(),
        words_per_minute.to_string(),
        "-a".into(),
        amplitude.to_string(),
        text.into(),
    ]
}

async fn speech_worker(
    program: String,
    voice: String,
    settings: Arc<Mutex<Settings>>,
    generation: Arc<AtomicU64>,
    interrupt: Arc<Notify>,
    mut queue: mpsc::UnboundedReceiver<Utterance>,
) {
    while let Some(utterance) = queue.recv().await {
        if utterance.generation < generation.load(Ordering::SeqCst) {
            debug!("Dropping interrupted utterance '{}'", utterance.text);
            continue;
        }

        let current = match settings.lock() {
            Ok(s) => *s,
            Err(_) => Settings { rate: 1.0, volume: 1.0 },
        };

        let mut child = match Command::new(&program)
            .args(arguments(&voice, current, &utterance.text))
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to run {}: {}", program, e);
                continue;
            }
        };

        tokio::select! {
            status = child.wait() => {
                if let Ok(status) = status {
                    if !status.success() {
                        warn!("{} exited with {}", program, status);
                    }
                }
            }
            _ = interrupt.notified() => {
                debug!("Speech interrupted");
                let _ = child.kill().await;
            }
        }
    }
}

#[async_trait]
impl SynthesisEngine for CommandSynthesizer {
    fn name(&self) -> &str {
        &self.program
    }

    async fn init(&self) -> Result<(), VoiceError> {
        let probe = Command::new(&self.program)
            .arg("--version")
            .output()
            .await
            .map_err(|e| VoiceError::EngineInit(format!("{}: {}", self.program, e)))?;
        if !probe.status.success() {
            return Err(VoiceError::EngineInit(format!("{} --version failed", self.program)));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(speech_worker(
            self.program.clone(),
            self.voice.clone(),
            Arc::clone(&self.settings),
            Arc::clone(&self.generation),
            Arc::clone(&self.interrupt),
            rx,
        ));

        if let Ok(mut queue) = self.queue.lock() {
            *queue = Some(tx);
        }
        if let Ok(mut worker) = self.worker.lock() {
            if let Some(previous) = worker.replace(handle) {
                previous.abort();
            }
        }

        info!("Speech through {} ({})", self.program, self.voice);
        Ok(())
    }

    fn speak(&self, text: &str) -> Result<(), VoiceError> {
        self.enqueue(text)
    }

    fn speak_urgent(&self, text: &str) -> Result<(), VoiceError> {
        self.stop();
        self.enqueue(text)
    }

    fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.interrupt.notify_waiters();
    }

    fn set_rate(&self, rate: f32) {
        if let Ok(mut settings) = self.settings.lock() {
            settings.rate = rate.max(0.1);
        }
    }

    fn set_volume(&self, volume: f32) {
        if let Ok(mut settings) = self.settings.lock() {
            settings.volume = volume.clamp(0.0, 1.0);
        }
    }

    async fn shutdown(&self) {
        self.stop();
        if let Ok(mut queue) = self.queue.lock() {
            queue.take();
        }
        let worker = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(worker) = worker {
            worker.abort();
        }
    }
}

/// Synthesizer that only logs what it would say
#[derive(Debug, Default)]
pub struct SilentSynthesizer;

#[async_trait]
impl SynthesisEngine for SilentSynthesizer {
    fn name(&self) -> &str {
        "silent"
    }

    async fn init(&self) -> Result<(), VoiceError> {
        Ok(())
    }

    fn speak(&self, text: &str) -> Result<(), VoiceError> {
        info!("[speech] {}", text);
        Ok(())
    }

    fn speak_urgent(&self, text: &str) -> Result<(), VoiceError> {
        info!("[speech!] {}", text);
        Ok(())
    }

    fn stop(&self) {}

    fn set_rate(&self, _rate: f32) {}

    fn set_volume(&self, _volume: f32) {}

    async fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments() {
        let args = arguments("es", Settings { rate: 1.0, volume: 0.8 }, "hola");
        assert_eq!(args, vec!["-v", "es", "-s", "175", "-a", "80", "hola"]);

        let slow = arguments("es", Settings { rate: 0.2, volume: 3.0 }, "x");
        assert_eq!(slow[3], "80");
        assert_eq!(slow[5], "100");
    }

    #[tokio::test]
    async fn test_missing_program_fails_init() {
        let synthesizer = CommandSynthesizer::new("definitely-not-a-tts-program", "es");
        assert!(matches!(synthesizer.init().await, Err(VoiceError::EngineInit(_))));
        assert!(matches!(synthesizer.speak("hola"), Err(VoiceError::NotReady)));
    }

    #[tokio::test]
    async fn test_silent_synthesizer_accepts_everything() {
        let synthesizer = SilentSynthesizer;
        synthesizer.init().await.unwrap();
        synthesizer.speak("hola").unwrap();
        synthesizer.speak_urgent("ya").unwrap();
    }
}
