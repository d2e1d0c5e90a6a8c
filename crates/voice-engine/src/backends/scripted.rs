//! In-memory engines driven by the caller
//!
//! Used by tests and demos to inject utterances and observe speech without
//! audio hardware.

use crate::engine::{RecognitionEngine, SynthesisEngine, UtteranceSink};
use crate::VoiceError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Recognizer whose utterances come from [`ScriptedRecognizer::say`]
#[derive(Default)]
pub struct ScriptedRecognizer {
    fail_init: bool,
    sink: Mutex<Option<UtteranceSink>>,
    vocabulary: Mutex<Option<Vec<String>>>,
    starts: AtomicUsize,
    shut_down: AtomicBool,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recognizer whose `init` always fails
    pub fn failing() -> Self {
        Self {
            fail_init: true,
            ..Self::default()
        }
    }

    /// Deliver `text` as a final utterance. False when not listening.
    pub fn say(&self, text: &str) -> bool {
        match self.sink.lock() {
            Ok(sink) => sink.as_ref().map(|s| s.send(text.to_string()).is_ok()).unwrap_or(false),
            Err(_) => false,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.sink.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Times `start_listening` succeeded
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Current vocabulary constraint
    pub fn vocabulary(&self) -> Option<Vec<String>> {
        self.vocabulary.lock().ok().and_then(|v| v.clone())
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecognitionEngine for ScriptedRecognizer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn init(&self) -> Result<(), VoiceError> {
        if self.fail_init {
            return Err(VoiceError::EngineInit("scripted failure".into()));
        }
        Ok(())
    }

    fn start_listening(&self, sink: UtteranceSink) -> Result<(), VoiceError> {
        let mut slot = self
            .sink
            .lock()
            .map_err(|_| VoiceError::Recognition("sink poisoned".into()))?;
        *slot = Some(sink);
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop_listening(&self) {
        if let Ok(mut slot) = self.sink.lock() {
            slot.take();
        }
    }

    fn set_vocabulary(&self, words: Option<&[String]>) -> Result<(), VoiceError> {
        let mut vocabulary = self
            .vocabulary
            .lock()
            .map_err(|_| VoiceError::Recognition("vocabulary poisoned".into()))?;
        *vocabulary = words.map(<[String]>::to_vec);
        Ok(())
    }

    async fn shutdown(&self) {
        self.stop_listening();
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

/// Synthesizer that records every request.
/// Urgent speech is recorded with a leading `!`.
#[derive(Default)]
pub struct RecordingSynthesizer {
    fail_init: bool,
    spoken: Mutex<Vec<String>>,
    shut_down: AtomicBool,
}

impl RecordingSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_init: true,
            ..Self::default()
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn record(&self, entry: String) {
        if let Ok(mut spoken) = self.spoken.lock() {
            spoken.push(entry);
        }
    }
}

#[async_trait]
impl SynthesisEngine for RecordingSynthesizer {
    fn name(&self) -> &str {
        "recording"
    }

    async fn init(&self) -> Result<(), VoiceError> {
        if self.fail_init {
            return Err(VoiceError::EngineInit("recording failure".into()));
        }
        Ok(())
    }

    fn speak(&self, text: &str) -> Result<(), VoiceError> {
        self.record(text.to_string());
        Ok(())
    }

    fn speak_urgent(&self, text: &str) -> Result<(), VoiceError> {
        self.record(format!("!{}", text));
        Ok(())
    }

    fn stop(&self) {}

    fn set_rate(&self, _rate: f32) {}

    fn set_volume(&self, _volume: f32) {}

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}
